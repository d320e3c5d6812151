//! WebSocket envelope types.
//!
//! One JSON envelope per frame, discriminated by `type`, in both directions.

use serde::{Deserialize, Serialize};

use crate::blocks::{ContentBlock, InboundBlock};
use crate::chat::Message;

/// Envelopes sent from client to server.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEnvelope {
    /// A chat message. Content arrives either as plain text or as a block
    /// array that the orchestrator flattens before storage.
    Message {
        content: InboundContent,
        #[serde(default)]
        model: Option<String>,
    },
}

/// Inbound message content, plain or structured.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum InboundContent {
    Text(String),
    Blocks(Vec<InboundBlock>),
}

/// Envelopes sent from server to client.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerEnvelope {
    /// Transcript replay, sent once and only when a connection resumed a
    /// prior session.
    ChatHistory { history: Vec<Message> },

    /// The freshly minted credential for this connection, sent once after
    /// any history.
    ReconnectToken { token: String },

    /// A structured assistant reply.
    Message {
        content: Vec<ContentBlock>,
        model: String,
        /// Titles of the documents used as generation context.
        #[serde(skip_serializing_if = "Vec::is_empty")]
        sources: Vec<String>,
    },

    /// A recoverable, per-message error.
    Error { content: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_envelope_with_plain_text() {
        let envelope: ClientEnvelope =
            serde_json::from_str(r#"{"type":"message","content":"hi","model":"deepseek-chat"}"#)
                .unwrap();
        let ClientEnvelope::Message { content, model } = envelope;
        assert!(matches!(content, InboundContent::Text(t) if t == "hi"));
        assert_eq!(model.as_deref(), Some("deepseek-chat"));
    }

    #[test]
    fn message_envelope_with_block_array() {
        let envelope: ClientEnvelope = serde_json::from_str(
            r#"{"type":"message","content":[{"type":"code","language":"py","content":"x"}]}"#,
        )
        .unwrap();
        let ClientEnvelope::Message { content, model } = envelope;
        assert!(model.is_none());
        match content {
            InboundContent::Blocks(blocks) => {
                assert_eq!(blocks.len(), 1);
                assert_eq!(blocks[0].kind, "code");
            }
            InboundContent::Text(_) => panic!("expected block content"),
        }
    }

    #[test]
    fn server_envelopes_use_snake_case_tags() {
        let json = serde_json::to_value(ServerEnvelope::ReconnectToken {
            token: "t".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "reconnect_token");
        assert_eq!(json["token"], "t");

        let json = serde_json::to_value(ServerEnvelope::ChatHistory { history: vec![] }).unwrap();
        assert_eq!(json["type"], "chat_history");

        let json = serde_json::to_value(ServerEnvelope::Error {
            content: "bad".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "error");
    }

    #[test]
    fn empty_sources_are_omitted_from_replies() {
        let json = serde_json::to_value(ServerEnvelope::Message {
            content: vec![],
            model: "deepseek-chat".to_string(),
            sources: vec![],
        })
        .unwrap();
        assert_eq!(json["type"], "message");
        assert!(json.get("sources").is_none());
    }
}
