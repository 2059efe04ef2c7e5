use crate::debrid::{self, AuthInfos, Debrider};
use crate::download::{self, Downloader, JsonMap};
use anyhow::Result;
use async_trait::async_trait;

/// Builds the debrid and download clients a story needs.
///
/// Stories go through this instead of the module constructors so tests can
/// swap in in-process stubs.
#[async_trait]
pub trait Backends: Send + Sync {
    async fn debrider(&self, name: &str, auth: Option<&AuthInfos>) -> Result<Box<dyn Debrider>>;

    async fn downloader(&self, name: &str, auth: Option<&JsonMap>) -> Result<Box<dyn Downloader>>;
}

/// Real HTTP clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpBackends;

#[async_trait]
impl Backends for HttpBackends {
    async fn debrider(&self, name: &str, auth: Option<&AuthInfos>) -> Result<Box<dyn Debrider>> {
        debrid::new_debrider(name, auth).await
    }

    async fn downloader(&self, name: &str, auth: Option<&JsonMap>) -> Result<Box<dyn Downloader>> {
        download::new_downloader(name, auth).await
    }
}
