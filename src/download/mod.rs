pub mod aria2;

use anyhow::Result;
use async_trait::async_trait;

pub use aria2::Aria2;

/// Free-form JSON object used for downloader auth infos, options and status.
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Accepts URIs and fetches them in the background.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn authenticate(&mut self, infos: &JsonMap) -> Result<()>;

    /// Submit `uri`, returning the agent's job id.
    async fn download(&self, uri: &str, options: &JsonMap) -> Result<String>;

    async fn download_status(&self, id: &str) -> Result<JsonMap>;
}

/// Build a downloader by name, authenticating it when `auth` is given.
pub async fn new_downloader(name: &str, auth: Option<&JsonMap>) -> Result<Box<dyn Downloader>> {
    let mut downloader: Box<dyn Downloader> = match name.to_ascii_lowercase().as_str() {
        "aria2" | "aria" => Box::new(Aria2::default()),
        _ => anyhow::bail!("invalid downloader given: {}", name),
    };

    if let Some(infos) = auth {
        downloader.authenticate(infos).await?;
    }

    Ok(downloader)
}
