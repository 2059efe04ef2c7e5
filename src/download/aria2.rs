use super::{Downloader, JsonMap};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// aria2 JSON-RPC client.
/// See https://aria2.github.io/manual/en/html/aria2c.html#methods
#[derive(Default)]
pub struct Aria2 {
    client: Option<Client>,
    rpc_url: String,
    token: Option<String>,
}

impl Aria2 {
    /// JSON-RPC 2.0 request body, with the secret token prepended to `params`.
    fn request_body(&self, method: &str, params: Vec<Value>) -> Value {
        let mut all = Vec::with_capacity(params.len() + 1);
        if let Some(token) = &self.token {
            all.push(Value::String(format!("token:{}", token)));
        }
        all.extend(params);
        json!({
            "jsonrpc": "2.0",
            "id": "debrid-relay",
            "method": method,
            "params": all,
        })
    }

    async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value> {
        let client = self
            .client
            .as_ref()
            .context("aria2 client is not authenticated")?;

        let body = self.request_body(method, params);
        let resp = client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("{} request failed", method))?;

        // aria2 reports RPC errors with a non-2xx status and a JSON body.
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<RpcResponse>(&text) {
            Ok(parsed) => parse_response(method, parsed),
            Err(_) if !status.is_success() => {
                anyhow::bail!("{} failed ({}): {}", method, status, text)
            }
            Err(e) => Err(e).with_context(|| format!("failed to parse {} response", method)),
        }
    }
}

fn parse_response(method: &str, resp: RpcResponse) -> Result<Value> {
    if let Some(err) = resp.error {
        tracing::debug!(method, code = err.code, "aria2 RPC error");
        anyhow::bail!(err.message);
    }
    resp.result
        .with_context(|| format!("{} response has no result", method))
}

#[async_trait]
impl Downloader for Aria2 {
    async fn authenticate(&mut self, infos: &JsonMap) -> Result<()> {
        let rpc_url = infos
            .get("rpc_url")
            .or_else(|| infos.get("rpcURL"))
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .context("invalid RPC url")?;

        let token = match infos.get("token") {
            None | Some(Value::Null) => None,
            Some(Value::String(t)) if t.is_empty() => None,
            Some(Value::String(t)) => Some(t.clone()),
            Some(_) => anyhow::bail!("invalid token"),
        };

        let timeout = infos
            .get("timeout")
            .and_then(Value::as_u64)
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout))
            .build()
            .context("failed to build aria2 HTTP client")?;

        self.client = Some(client);
        self.rpc_url = rpc_url.to_string();
        self.token = token;
        Ok(())
    }

    async fn download(&self, uri: &str, options: &JsonMap) -> Result<String> {
        let mut params = vec![json!([uri])];
        if !options.is_empty() {
            params.push(Value::Object(options.clone()));
        }

        let result = self.call("aria2.addUri", params).await?;
        result
            .as_str()
            .map(str::to_string)
            .context("aria2.addUri returned a non-string GID")
    }

    async fn download_status(&self, id: &str) -> Result<JsonMap> {
        let result = self.call("aria2.tellStatus", vec![json!(id)]).await?;
        match result {
            Value::Object(status) => Ok(status),
            other => anyhow::bail!("unexpected aria2.tellStatus result: {}", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn authenticated(infos: Value) -> Result<Aria2> {
        let mut aria = Aria2::default();
        aria.authenticate(infos.as_object().unwrap()).await?;
        Ok(aria)
    }

    #[tokio::test]
    async fn test_authenticate_requires_rpc_url() {
        let err = authenticated(json!({})).await.err().unwrap();
        assert_eq!(err.to_string(), "invalid RPC url");

        let err = authenticated(json!({ "rpc_url": "" })).await.err().unwrap();
        assert_eq!(err.to_string(), "invalid RPC url");
    }

    #[tokio::test]
    async fn test_authenticate_accepts_legacy_key() {
        let aria = authenticated(json!({ "rpcURL": "http://localhost:6800/jsonrpc" }))
            .await
            .unwrap();
        assert_eq!(aria.rpc_url, "http://localhost:6800/jsonrpc");
        assert!(aria.token.is_none());
    }

    #[tokio::test]
    async fn test_authenticate_rejects_non_string_token() {
        let err = authenticated(json!({ "rpc_url": "http://localhost:6800/jsonrpc", "token": 42 }))
            .await
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "invalid token");
    }

    #[tokio::test]
    async fn test_request_body_prepends_token() {
        let aria = authenticated(json!({
            "rpc_url": "http://localhost:6800/jsonrpc",
            "token": "s3cr3t",
        }))
        .await
        .unwrap();

        let body = aria.request_body(
            "aria2.addUri",
            vec![json!(["http://example.com/file.mkv"]), json!({ "dir": "/tmp" })],
        );
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["method"], "aria2.addUri");
        assert_eq!(
            body["params"],
            json!(["token:s3cr3t", ["http://example.com/file.mkv"], { "dir": "/tmp" }])
        );
    }

    #[test]
    fn test_request_body_without_token() {
        let aria = Aria2::default();
        let body = aria.request_body("aria2.tellStatus", vec![json!("2089b05ecca3d829")]);
        assert_eq!(body["params"], json!(["2089b05ecca3d829"]));
    }

    #[test]
    fn test_parse_response_result() {
        let resp: RpcResponse =
            serde_json::from_str(r#"{"id":"debrid-relay","jsonrpc":"2.0","result":"2089b05ecca3d829"}"#)
                .unwrap();
        assert_eq!(parse_response("aria2.addUri", resp).unwrap(), json!("2089b05ecca3d829"));
    }

    #[test]
    fn test_parse_response_error() {
        let resp: RpcResponse = serde_json::from_str(
            r#"{"id":"debrid-relay","jsonrpc":"2.0","error":{"code":1,"message":"Unauthorized"}}"#,
        )
        .unwrap();
        let err = parse_response("aria2.addUri", resp).unwrap_err();
        assert_eq!(err.to_string(), "Unauthorized");
    }

    #[tokio::test]
    async fn test_download_requires_authentication() {
        let aria = Aria2::default();
        let err = aria.download("http://example.com/a", &JsonMap::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "aria2 client is not authenticated");
    }
}
