//! WebSocket chat: wire envelopes, connection registry and the
//! per-connection orchestration loop.

mod handler;
mod registry;
mod types;

pub use handler::{ChatConnectParams, chat_ws_handler};
pub use registry::{ConnectionRegistry, ConnectionSender};
pub use types::{ClientEnvelope, InboundContent, ServerEnvelope};
