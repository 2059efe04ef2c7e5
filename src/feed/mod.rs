pub mod direct_download;
pub mod extractor;
pub mod parser;
pub mod types;
pub mod watcher;

use anyhow::Result;
use async_trait::async_trait;

pub use extractor::{new_extractor, FeedExtractor};
pub use parser::{parse_feed, HttpFeedParser};
pub use types::{FeedItem, RemoteFeed};
pub use watcher::{FeedErrors, FeedWatcher, WatcherError};

/// Fetches a feed and returns its items.
#[async_trait]
pub trait FeedParser: Send + Sync {
    async fn parse(&self, url: &str) -> Result<Vec<FeedItem>>;
}
