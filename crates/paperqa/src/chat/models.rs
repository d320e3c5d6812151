//! Chat message model.

use serde::{Deserialize, Serialize};

use crate::blocks::{self, ContentBlock};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// Message content: user turns are stored flattened to plain text,
/// assistant turns keep their parsed block sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

/// One entry of a session transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
    /// Model that produced the turn. Only set on assistant messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Message {
    /// A user turn with already-flattened text content.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
            model: None,
        }
    }

    /// An assistant turn carrying its parsed block sequence.
    pub fn assistant(content: Vec<ContentBlock>, model: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Blocks(content),
            model: Some(model.into()),
        }
    }

    /// Plain-text view of the content, used when building prompt history.
    pub fn text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(content) => blocks::render(content),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_content_serializes_as_plain_string() {
        let json = serde_json::to_value(Message::user("hi there")).unwrap();
        assert_eq!(json["role"], "user");
        assert_eq!(json["content"], "hi there");
        assert!(json.get("model").is_none());
    }

    #[test]
    fn assistant_content_serializes_as_block_array() {
        let message = Message::assistant(
            vec![ContentBlock::Text {
                content: "answer".to_string(),
            }],
            "deepseek-chat",
        );
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["model"], "deepseek-chat");
    }

    #[test]
    fn text_view_flattens_assistant_blocks() {
        let message = Message::assistant(
            vec![
                ContentBlock::Text {
                    content: "see".to_string(),
                },
                ContentBlock::Math {
                    display: false,
                    content: "x".to_string(),
                },
            ],
            "deepseek-chat",
        );
        assert_eq!(message.text(), "see $x$");
    }
}
