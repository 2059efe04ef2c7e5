use super::extractor::FeedExtractor;
use super::types::FeedItem;
use crate::config::ProviderOptions;
use anyhow::{Context, Result};
use regex::Regex;
use std::sync::LazyLock;

pub(crate) static URL_MATCHER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)https?://[\da-z.-]+\.[a-z.]{2,6}[/\w.-]*/?").expect("invalid URL pattern")
});

/// Extractor for directdownload.tv feeds, whose item descriptions list the
/// hoster links of a release.
pub struct DirectDownload {
    favorite_hosts: Vec<Regex>,
}

impl DirectDownload {
    pub fn new(options: &ProviderOptions) -> Result<Self> {
        let favorite_hosts = options
            .favorite_hosts
            .iter()
            .map(|host| {
                let pattern = format!(r#"(?i)https?://([\w-]+\.)*{}[^\s"'<>]*"#, regex::escape(host));
                Regex::new(&pattern).with_context(|| format!("invalid favorite host `{}`", host))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { favorite_hosts })
    }
}

impl FeedExtractor for DirectDownload {
    fn source_url(&self) -> &str {
        "directdownload.tv"
    }

    /// With favorite hosts, the first link on the first host that has one;
    /// otherwise the first link of the description.
    fn extract(&self, item: &FeedItem) -> Option<String> {
        let description = &item.description;
        if self.favorite_hosts.is_empty() {
            return URL_MATCHER.find(description).map(|m| m.as_str().to_string());
        }
        self.favorite_hosts
            .iter()
            .find_map(|matcher| matcher.find(description))
            .map(|m| m.as_str().to_string())
    }
}
