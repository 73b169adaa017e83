pub mod telegram;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

/// An inbound update reduced to what the bot reads from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingUpdate {
    pub id: i64,
    /// Message text, empty for updates that carry none.
    pub text: String,
}

/// Chat side of the bridge: long-poll for updates and reply to the configured chat.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Updates with `id >= offset`, or every pending update when `offset` is `None`.
    async fn fetch_updates(&self, offset: Option<i64>) -> Result<Vec<IncomingUpdate>>;

    async fn send_text(&self, text: &str) -> Result<()>;

    async fn send_image(&self, path: &Path) -> Result<()>;
}
