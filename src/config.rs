use crate::debrid::AuthInfos;
use crate::download::JsonMap;
use crate::feed::RemoteFeed;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "debrid-relay";
const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub feed_watcher: FeedWatcherConfig,
    pub downloader: Option<DownloaderConfig>,
    pub debrider: Option<DebriderConfig>,
    /// Per-provider extraction options, keyed by provider name.
    #[serde(default)]
    pub providers: HashMap<String, ProviderOptions>,
    #[serde(default)]
    pub webserver: WebServerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedWatcherConfig {
    /// Minutes between two scans.
    #[serde(default = "default_watch_interval")]
    pub watch_interval: u64,
    #[serde(default)]
    pub feeds: Vec<FeedConfig>,
}

fn default_watch_interval() -> u64 { 30 }

impl Default for FeedWatcherConfig {
    fn default() -> Self {
        Self {
            watch_interval: default_watch_interval(),
            feeds: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FeedConfig {
    pub title: String,
    pub url: String,
    pub provider: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DownloaderConfig {
    pub name: String,
    #[serde(default)]
    pub auth_infos: JsonMap,
    #[serde(default)]
    pub download_options: JsonMap,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DebriderConfig {
    pub name: String,
    #[serde(default)]
    pub auth_infos: AuthInfos,
}

#[derive(Debug, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct ProviderOptions {
    /// Hosts to prefer when an item carries several links, in order.
    #[serde(default)]
    pub favorite_hosts: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_auth_realm")]
    pub auth_realm: String,
    /// Without users the server accepts anonymous requests.
    #[serde(default)]
    pub users: Vec<WebUser>,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8000 }
fn default_auth_realm() -> String { "debrid-relay.local".to_string() }

impl Default for WebServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            auth_realm: default_auth_realm(),
            users: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct WebUser {
    pub name: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// `text` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String { "info".to_string() }
fn default_log_format() -> String { "text".to_string() }

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::parse(&content)?;
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .with_context(|| "Failed to parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// `$HOME/.config/debrid-relay/config.toml`
    pub fn default_path() -> Result<PathBuf> {
        let home = std::env::var_os("HOME").context("HOME is not set")?;
        Ok(PathBuf::from(home).join(".config").join(APP_DIR).join(CONFIG_FILE))
    }

    fn validate(&self) -> Result<()> {
        if self.feed_watcher.watch_interval == 0 {
            anyhow::bail!("feed_watcher.watch_interval must be greater than zero");
        }
        if self.webserver.users.iter().any(|user| user.name.is_empty() || user.name.contains(':')) {
            anyhow::bail!("webserver user names must be non-empty and must not contain `:`");
        }
        if !matches!(self.log.format.as_str(), "text" | "json") {
            anyhow::bail!("invalid log format `{}` (expected text or json)", self.log.format);
        }
        Ok(())
    }

    pub fn provider_options(&self, provider: &str) -> ProviderOptions {
        self.providers
            .get(provider)
            .or_else(|| self.providers.get(&provider.to_ascii_lowercase()))
            .cloned()
            .unwrap_or_default()
    }

    /// Configured feeds with their provider options attached.
    pub fn remote_feeds(&self) -> Vec<RemoteFeed> {
        self.feed_watcher
            .feeds
            .iter()
            .map(|feed| RemoteFeed {
                title: feed.title.clone(),
                url: feed.url.clone(),
                provider: feed.provider.clone(),
                provider_options: self.provider_options(&feed.provider),
            })
            .collect()
    }
}
