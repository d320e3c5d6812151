//! Response generation against an OpenAI-compatible chat-completions API.

mod client;
mod error;
mod types;

pub use client::{DeepSeekClient, DeepSeekConfig};
pub use error::GeneratorError;
pub use types::ModelInfo;

use async_trait::async_trait;

use crate::chat::Message;
use crate::document::Document;

/// The external assistant this backend talks to.
///
/// `context` carries lexically retrieved documents to fold into the prompt,
/// `history` the prior turns of the session (oldest first, excluding the
/// prompt itself). Implementations must bound their own transport; callers
/// additionally time the whole call out.
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        context: &[Document],
        history: &[Message],
        model: &str,
    ) -> Result<String, GeneratorError>;
}
