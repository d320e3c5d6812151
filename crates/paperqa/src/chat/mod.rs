//! Chat sessions: message model and the in-memory session store.

mod models;
mod store;

pub use models::{Message, MessageContent, Role};
pub use store::{CONTEXT_WINDOW, SessionError, SessionStore};
