//! Local language-model client (Ollama-style chat API)
//!
//! One request per conversation turn: an ordered message list in, a single
//! text blob out. Tool calling is plain text — the model embeds directives
//! that the parser recovers afterwards.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One chat message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system`, `user`, or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// System-role message
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self {
            role: "system".to_string(),
            content: content.to_string(),
        }
    }

    /// User-role message
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }

    /// Assistant-role message
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

/// Client for the local chat endpoint
pub struct LanguageModel {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl LanguageModel {
    /// Create a client for `base_url` (e.g. `http://localhost:11434`).
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Llm(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        })
    }

    /// Model identifier in use
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one chat turn and return the model's text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Llm`] for unreachable server, timeout, bad status,
    /// or an unparseable response
    pub async fn chat(&self, messages: &[ChatMessage]) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
        };

        tracing::debug!(model = %self.model, messages = messages.len(), "chat request");

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    Error::Llm("cannot connect to the language model server".to_string())
                } else if e.is_timeout() {
                    Error::Llm("the language model timed out".to_string())
                } else {
                    Error::Llm(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Llm(format!("server error {status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Llm(format!("bad response: {e}")))?;

        tracing::debug!(chars = parsed.message.content.len(), "chat response");
        Ok(parsed.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_constructors_set_roles() {
        assert_eq!(ChatMessage::system("s").role, "system");
        assert_eq!(ChatMessage::user("u").role, "user");
        assert_eq!(ChatMessage::assistant("a").role, "assistant");
    }

    #[test]
    fn request_serializes_for_the_chat_endpoint() {
        let messages = [ChatMessage::user("hi")];
        let request = ChatRequest {
            model: "mistral",
            messages: &messages,
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "mistral");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"][0]["role"], "user");
    }
}
