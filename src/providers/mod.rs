//! Non-streaming backend providers.
//!
//! Each provider turns a conversation into one complete answer via the
//! uniform [`Provider`] contract. The streaming agent backend does not live
//! here; it speaks the duplex channel protocol through the relay.

mod http;
mod shell;
mod warehouse;

use async_trait::async_trait;

pub use http::HttpChatProvider;
pub use shell::ShellProvider;
pub use warehouse::WarehouseCliProvider;

use crate::config::{ProviderKind, RelayConfig};
use crate::error::{Error, Result};
use crate::types::{Message, MessageRole};

/// One complete answer from a non-streaming backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderReply {
    /// The answer text.
    pub content: String,
    /// The model that produced it, when known.
    pub model: Option<String>,
}

impl ProviderReply {
    /// Creates a reply with no model attribution.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
        }
    }
}

/// The uniform non-streaming send contract.
#[async_trait]
pub trait Provider: Send + Sync + std::fmt::Debug {
    /// Produces one complete answer for the conversation.
    async fn send(
        &self,
        messages: &[Message],
        model_hint: Option<&str>,
    ) -> Result<ProviderReply>;
}

/// Returns the latest user message text, if any.
pub(crate) fn latest_user_text(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == MessageRole::User)
        .map(|m| m.content.as_str())
}

/// Builds the provider selected by the configuration.
///
/// The streaming agent backend is not constructible here; it is driven by
/// the relay's channel machinery instead.
pub fn for_config(config: &RelayConfig) -> Result<Box<dyn Provider>> {
    match config.provider {
        ProviderKind::Shell => Ok(Box::new(ShellProvider::new(config))),
        ProviderKind::Http => Ok(Box::new(HttpChatProvider::new(config)?)),
        ProviderKind::Warehouse => Ok(Box::new(WarehouseCliProvider::new(config))),
        ProviderKind::Agent => Err(Error::configuration(
            "the agent backend streams over a channel and has no oneshot provider",
        )),
    }
}
