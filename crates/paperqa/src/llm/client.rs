//! DeepSeek chat-completions client.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::Client;

use crate::chat::{Message, Role};
use crate::document::Document;

use super::ResponseGenerator;
use super::error::GeneratorError;
use super::types::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage};

/// Transport timeout for one completion request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const SYSTEM_PROMPT: &str = "You are the AI assistant of a paper Q&A system. \
    Answer questions accurately and clearly, based on the provided documents \
    when they are relevant.";

/// Configuration for [`DeepSeekClient`].
#[derive(Debug, Clone)]
pub struct DeepSeekConfig {
    pub api_key: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for DeepSeekConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.deepseek.com/v1".to_string(),
            max_tokens: 1000,
            temperature: 0.7,
        }
    }
}

/// Client for the DeepSeek chat-completions API.
#[derive(Debug, Clone)]
pub struct DeepSeekClient {
    client: Client,
    config: DeepSeekConfig,
}

impl DeepSeekClient {
    pub fn new(config: DeepSeekConfig) -> Result<Self, GeneratorError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }
}

#[async_trait]
impl ResponseGenerator for DeepSeekClient {
    async fn generate(
        &self,
        prompt: &str,
        context: &[Document],
        history: &[Message],
        model: &str,
    ) -> Result<String, GeneratorError> {
        let mut messages = vec![ChatMessage {
            role: "system",
            content: SYSTEM_PROMPT.to_string(),
        }];
        messages.extend(history.iter().map(|message| ChatMessage {
            role: match message.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            content: message.text(),
        }));
        messages.push(ChatMessage {
            role: "user",
            content: build_prompt(prompt, context),
        });

        let request = ChatCompletionRequest {
            model: model.to_string(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!(
            "requesting completion from {} with model {model}",
            self.config.base_url
        );
        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(GeneratorError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| GeneratorError::Payload(err.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| GeneratorError::Payload("no choices in completion".to_string()))
    }
}

/// Fold retrieved documents into the user prompt. Without context the
/// prompt passes through untouched.
fn build_prompt(prompt: &str, context: &[Document]) -> String {
    if context.is_empty() {
        return prompt.to_string();
    }

    let sections: Vec<String> = context
        .iter()
        .map(|doc| format!("Document: {}\n{}", doc.display_title(), doc.content))
        .collect();

    format!(
        "Answer the question using the following documents:\n\n{}\n\nQuestion: {}\n\nAnswer:",
        sections.join("\n\n"),
        prompt
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str, content: &str) -> Document {
        Document {
            title: Some(title.to_string()),
            content: content.to_string(),
            ..Document::default()
        }
    }

    #[test]
    fn prompt_without_context_passes_through() {
        assert_eq!(build_prompt("what is x?", &[]), "what is x?");
    }

    #[test]
    fn prompt_with_context_folds_documents_in() {
        let folded = build_prompt("what is x?", &[doc("Paper A", "x is one")]);
        assert!(folded.contains("Document: Paper A"));
        assert!(folded.contains("x is one"));
        assert!(folded.ends_with("Question: what is x?\n\nAnswer:"));
    }

    #[test]
    fn untitled_documents_get_a_placeholder() {
        let mut document = doc("ignored", "body");
        document.title = None;
        let folded = build_prompt("q", &[document]);
        assert!(folded.contains("Document: Untitled"));
    }
}
