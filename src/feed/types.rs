use super::extractor::new_extractor;
use super::FeedParser;
use crate::config::ProviderOptions;
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Normalized feed entry, whatever the feed format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
}

/// A subscribed feed and how to pull download links out of it.
#[derive(Debug, Clone, Default)]
pub struct RemoteFeed {
    pub title: String,
    pub url: String,
    /// Extractor name, see [`new_extractor`].
    pub provider: String,
    pub provider_options: ProviderOptions,
}

/// Items published strictly after `since`, in feed order.
pub fn items_since(items: Vec<FeedItem>, since: DateTime<Utc>) -> Vec<FeedItem> {
    items.into_iter().filter(|item| item.published_at > since).collect()
}

impl RemoteFeed {
    pub async fn new_items(&self, since: DateTime<Utc>, parser: &dyn FeedParser) -> Result<Vec<FeedItem>> {
        let items = parser.parse(&self.url).await?;
        Ok(items_since(items, since))
    }

    /// Download links of the items published after `since`. Items the
    /// extractor finds nothing in are left out.
    pub async fn new_links(&self, since: DateTime<Utc>, parser: &dyn FeedParser) -> Result<Vec<String>> {
        let items = self.new_items(since, parser).await?;
        let extractor = new_extractor(&self.provider, &self.provider_options)?;

        let mut links = Vec::with_capacity(items.len());
        for item in &items {
            match extractor.extract(item) {
                Some(link) => links.push(link),
                None => tracing::debug!(
                    feed = %self.title,
                    item = %item.title,
                    source = extractor.source_url(),
                    "no download link in item"
                ),
            }
        }
        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn item(title: &str, day: u32) -> FeedItem {
        FeedItem {
            title: title.to_string(),
            link: format!("http://example.com/{}", title),
            description: String::new(),
            published_at: Utc.with_ymd_and_hms(2017, 2, day, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_items_since_is_strict() {
        let items = vec![item("a", 20), item("b", 26), item("c", 27)];
        let cutoff = Utc.with_ymd_and_hms(2017, 2, 26, 12, 0, 0).unwrap();

        let kept = items_since(items, cutoff);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].title, "c");
    }

    #[test]
    fn test_items_since_keeps_order() {
        let items = vec![item("c", 27), item("a", 20), item("b", 26)];
        let cutoff = Utc.with_ymd_and_hms(2017, 2, 21, 0, 0, 0).unwrap();

        let titles: Vec<_> = items_since(items, cutoff).into_iter().map(|i| i.title).collect();
        assert_eq!(titles, vec!["c", "b"]);
    }
}
