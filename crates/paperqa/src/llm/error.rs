//! Generator error types.

use thiserror::Error;

/// Errors from the response generator. All of them are recoverable at the
/// connection level: the user is told, the transcript keeps its user turn
/// and the connection stays open.
#[derive(Debug, Error)]
pub enum GeneratorError {
    /// HTTP transport failure.
    #[error("request to the model API failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("model API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The API answered 200 but the payload had no usable completion.
    #[error("model API returned an unexpected payload: {0}")]
    Payload(String),

    /// The round trip exceeded the orchestrator's deadline.
    #[error("response generation timed out")]
    Timeout,
}
