//! Outbound notification abstractions

use async_trait::async_trait;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Text using Telegram's HTML markup subset.
    Html(String),
    /// An image file already rendered on disk.
    Photo {
        path: PathBuf,
        caption: Option<String>,
    },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Sends `message` to every configured recipient and returns how many
    /// received it. Failures are handled and logged by the implementation.
    async fn deliver(&self, message: &Message) -> usize;
}
