use super::direct_download::DirectDownload;
use super::types::FeedItem;
use crate::config::ProviderOptions;
use anyhow::Result;

/// Pulls a download link out of a feed item.
pub trait FeedExtractor: Send + Sync {
    /// Site whose feeds this extractor understands.
    fn source_url(&self) -> &str;

    fn extract(&self, item: &FeedItem) -> Option<String>;
}

pub fn new_extractor(name: &str, options: &ProviderOptions) -> Result<Box<dyn FeedExtractor>> {
    match name.to_ascii_lowercase().as_str() {
        "directdownload" | "dd" | "directdownload.tv" => Ok(Box::new(DirectDownload::new(options)?)),
        _ => anyhow::bail!("invalid feed extractor `{}`", name),
    }
}
