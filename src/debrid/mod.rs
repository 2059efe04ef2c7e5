pub mod alldebrid;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

pub use alldebrid::AllDebrid;

pub type AuthInfos = HashMap<String, String>;

/// Turns a hoster link into a direct download link.
#[async_trait]
pub trait Debrider: Send + Sync {
    async fn authenticate(&mut self, infos: &AuthInfos) -> Result<()>;

    async fn debrid(&self, uri: &str) -> Result<String>;

    /// Whether `uri` points at a host this service can handle. Works without
    /// authentication.
    fn is_debridable(&self, uri: &str) -> bool;
}

/// Build a debrider by name, authenticating it when `auth` is given.
pub async fn new_debrider(name: &str, auth: Option<&AuthInfos>) -> Result<Box<dyn Debrider>> {
    let mut debrider: Box<dyn Debrider> = match name.to_ascii_lowercase().as_str() {
        "alldebrid" | "ad" => Box::new(AllDebrid::new()?),
        _ => anyhow::bail!("invalid debrider given: {}", name),
    };

    if let Some(infos) = auth {
        debrider.authenticate(infos).await?;
    }

    Ok(debrider)
}
