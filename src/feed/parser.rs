use super::types::FeedItem;
use super::FeedParser;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
const USER_AGENT: &str = concat!("debrid-relay/", env!("CARGO_PKG_VERSION"));

/// Fetches RSS/Atom feeds over HTTP.
pub struct HttpFeedParser {
    client: reqwest::Client,
}

impl HttpFeedParser {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .expect("Failed to build feed HTTP client");
        Self { client }
    }
}

impl Default for HttpFeedParser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl FeedParser for HttpFeedParser {
    async fn parse(&self, url: &str) -> Result<Vec<FeedItem>> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("feed fetch failed")?;

        let status = resp.status();
        if !status.is_success() {
            anyhow::bail!("feed fetch failed ({})", status);
        }

        let bytes = resp.bytes().await.context("Failed to read feed body")?;
        let items = parse_feed(&bytes)?;
        tracing::debug!(url, items = items.len(), "feed parsed");
        Ok(items)
    }
}

/// Parse an RSS or Atom document. Entries without any date are dropped.
pub fn parse_feed(bytes: &[u8]) -> Result<Vec<FeedItem>> {
    let feed = feed_rs::parser::parse(bytes).context("Failed to parse RSS/Atom feed")?;

    let items = feed
        .entries
        .into_iter()
        .filter_map(|entry| {
            let published_at = entry.published.or(entry.updated)?;
            let description = entry
                .summary
                .map(|s| s.content)
                .or_else(|| entry.content.and_then(|c| c.body))
                .unwrap_or_default();

            Some(FeedItem {
                title: entry.title.map(|t| t.content).unwrap_or_default(),
                link: entry.links.first().map(|l| l.href.clone()).unwrap_or_default(),
                description,
                published_at,
            })
        })
        .collect();

    Ok(items)
}
