//! Chat-completion HTTP provider.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::RelayConfig;
use crate::error::{Error, Result};
use crate::types::{Message, MessageRole};

use super::{Provider, ProviderReply};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_TEMPERATURE: f64 = 0.7;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Answers turns via a chat-completion API.
#[derive(Debug, Clone)]
pub struct HttpChatProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
}

impl HttpChatProvider {
    /// Creates a provider from configuration. Fails when no API key is set.
    pub fn new(config: &RelayConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::configuration("OPENAI_API_KEY is not set"))?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }
}

#[async_trait]
impl Provider for HttpChatProvider {
    async fn send(
        &self,
        messages: &[Message],
        model_hint: Option<&str>,
    ) -> Result<ProviderReply> {
        let model = model_hint.unwrap_or(&self.model);
        let body = ChatRequest {
            model,
            messages: messages
                .iter()
                .map(|m| ChatMessage {
                    role: match m.role {
                        MessageRole::User => "user",
                        MessageRole::Assistant => "assistant",
                    },
                    content: &m.content,
                })
                .collect(),
            temperature: DEFAULT_TEMPERATURE,
        };
        let response = self
            .client
            .post(DEFAULT_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::http_client("chat request failed", Some(Box::new(e))))?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(Error::http_client(
                format!("chat request returned {status}: {detail}"),
                None,
            ));
        }
        let parsed: ChatResponse = response.json().await.map_err(|e| {
            Error::serialization("failed to parse chat response", Some(Box::new(e)))
        })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        Ok(ProviderReply {
            content,
            model: Some(model.to_string()),
        })
    }
}
