use super::{AuthInfos, Debrider};
use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://alldebrid.com";
const AUTH_PATH: &str = "register/";
const RETURN_PATH: &str = "account/";
const DEBRID_PATH: &str = "service.php";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Hosts handled by the service, as URI patterns.
const SUPPORTED_HOSTS: &[&str] = &[
    r"^https?://(www\.)?1fichier\.com/",
    r"^https?://(www\.)?4shared\.com/",
    r"^https?://(www\.)?depositfiles\.com/",
    r"^https?://(www\.)?filefactory\.com/file/",
    r"^https?://(www\.)?hitfile\.net/",
    r"^https?://(www\.)?keep2share\.cc/file/",
    r"^https?://(www\.)?k2s\.cc/file/",
    r"^https?://(www\.)?mediafire\.com/(download|file)/",
    r"^https?://(www\.)?mega\.(co\.)?nz/",
    r"^https?://(www\.)?nitroflare\.com/view/",
    r"^https?://(www\.)?rapidgator\.net/file/",
    r"^https?://(www\.)?turbobit\.net/",
    r"^https?://(www\.)?uploaded\.(net|to)/file/",
    r"^https?://(www\.)?ul\.to/",
    r"^https?://(www\.)?uptobox\.com/",
];

static SUPPORTED_HOSTS_REGEX: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    SUPPORTED_HOSTS
        .iter()
        .map(|pattern| Regex::new(pattern).expect("invalid supported host pattern"))
        .collect()
});

#[derive(Debug, Default, Deserialize)]
struct DebridResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    link: String,
}

/// Client for alldebrid.com. Login is cookie based.
pub struct AllDebrid {
    client: Client,
    base_url: String,
    authenticated: bool,
}

impl AllDebrid {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .cookie_store(true)
            .build()
            .context("failed to build AllDebrid HTTP client")?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            authenticated: false,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Debrider for AllDebrid {
    async fn authenticate(&mut self, infos: &AuthInfos) -> Result<()> {
        let username = infos
            .get("username")
            .filter(|u| !u.is_empty())
            .context("invalid username")?;
        let password = infos
            .get("password")
            .filter(|p| !p.is_empty())
            .context("invalid password")?;

        self.base_url = match infos.get("base_url") {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ => DEFAULT_BASE_URL.to_string(),
        };

        let url = format!("{}/{}", self.base_url, AUTH_PATH);
        let resp = self
            .client
            .get(&url)
            .query(&[
                ("action", "login"),
                ("returnpage", RETURN_PATH),
                ("login_login", username.as_str()),
                ("login_password", password.as_str()),
            ])
            .send()
            .await
            .context("AllDebrid login request failed")?;

        // A successful login redirects to the account page.
        let landing = format!("{}/{}", self.base_url, RETURN_PATH);
        if resp.url().as_str() != landing {
            anyhow::bail!("invalid credentials");
        }

        self.authenticated = true;
        Ok(())
    }

    async fn debrid(&self, uri: &str) -> Result<String> {
        if !self.authenticated {
            anyhow::bail!("AllDebrid client is not authenticated");
        }

        let url = format!("{}/{}", self.base_url, DEBRID_PATH);
        let resp = self
            .client
            .get(&url)
            .query(&[("link", uri), ("json", "true")])
            .send()
            .await
            .context("AllDebrid debrid request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("AllDebrid debrid failed ({}): {}", status, body);
        }

        let parsed: DebridResponse = resp
            .json()
            .await
            .context("failed to parse AllDebrid response")?;
        parse_debrid_response(parsed)
    }

    fn is_debridable(&self, uri: &str) -> bool {
        SUPPORTED_HOSTS_REGEX.iter().any(|re| re.is_match(uri))
    }
}

fn parse_debrid_response(resp: DebridResponse) -> Result<String> {
    if !resp.error.is_empty() {
        anyhow::bail!(resp.error);
    }
    if resp.link.is_empty() {
        anyhow::bail!("AllDebrid returned an empty link");
    }
    Ok(resp.link)
}
