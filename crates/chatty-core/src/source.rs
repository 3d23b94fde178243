//! Seams between the relay engine and the network.

use anyhow::Result;
use async_trait::async_trait;

use crate::{Channel, ChatMessage};

/// Where chat messages come from.
#[async_trait]
pub trait ChatSource: Send + Sync {
    /// Fetch every message the API currently holds for `channel`.
    ///
    /// An error is a transient failure; the engine treats it as an empty round.
    async fn fetch(&self, channel: Channel, api_key: &str) -> Result<Vec<ChatMessage>>;
}

/// Where formatted messages go.
#[async_trait]
pub trait WebhookSink: Send + Sync {
    /// Deliver `content` to the webhook at `url`.
    async fn post(&self, url: &str, content: &str) -> Result<()>;
}
