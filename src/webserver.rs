//! HTTP front-end: a page to paste links into and a JSON endpoint that
//! debrids and downloads every link found in the submitted text.

use crate::backend::{Backends, HttpBackends};
use crate::config::{Config, WebUser};
use crate::dispatch::story::ENTRY_STEP;
use crate::dispatch::{DispatchStory, Event, Story};
use crate::feed::direct_download::URL_MATCHER;
use anyhow::{Context, Result};
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinSet;
use tower_http::trace::TraceLayer;

/// Submitted links are dispatched like links given on the command line.
const SUBMIT_ORIGIN: &str = "cli";

const HOME_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>debrid-relay</title>
</head>
<body>
  <h1>debrid-relay</h1>
  <form id="download-form">
    <label for="download-urls">Submit links</label><br>
    <textarea id="download-urls" rows="10" cols="80"></textarea><br>
    <button type="submit">Submit links</button>
  </form>
  <p id="result"></p>
  <script>
    document.getElementById('download-form').addEventListener('submit', async (e) => {
      e.preventDefault();
      const urls = document.getElementById('download-urls');
      const result = document.getElementById('result');
      const resp = await fetch('/submit', {
        method: 'POST',
        headers: { 'Content-Type': 'application/json' },
        body: JSON.stringify({ urls: urls.value }),
      });
      if (!resp.ok) {
        result.textContent = 'Error while processing given links: ' + await resp.text();
        return;
      }
      const body = await resp.json();
      result.textContent = body.count + (body.count > 1 ? ' links' : ' link') + ' processed.';
      if (body.errors.length) {
        result.textContent += ' ' + body.errors.join(', ');
      }
      urls.value = '';
    });
  </script>
</body>
</html>
"#;

#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// Free text; every URL in it is dispatched.
    #[serde(alias = "Urls")]
    pub urls: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SubmitResponse {
    pub count: usize,
    pub errors: Vec<String>,
}

struct ServerState {
    config: Config,
    backends: Arc<dyn Backends>,
}

impl ServerState {
    /// A fresh debrid + download scenario. Walks never share one.
    fn story(&self) -> DispatchStory {
        DispatchStory::new(&self.config)
            .enable_debrider()
            .enable_downloader()
            .with_backends(self.backends.clone())
            .with_notifier(|event| {
                tracing::info!(id = %event.value, "download started");
                Ok(())
            })
    }
}

pub fn make_app(config: &Config, backends: Arc<dyn Backends>) -> Router {
    let state = Arc::new(ServerState {
        config: config.clone(),
        backends,
    });

    Router::new()
        .route("/", get(home))
        .route("/submit", post(submit))
        .layer(middleware::from_fn_with_state(state.clone(), require_user))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run_server(config: &Config) -> Result<()> {
    let app = make_app(config, Arc::new(HttpBackends));

    let addr = format!("{}:{}", config.webserver.host, config.webserver.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("cannot listen on {}", addr))?;
    tracing::info!(%addr, users = config.webserver.users.len(), "web server listening");

    axum::serve(listener, app).await.context("web server failed")?;
    Ok(())
}

async fn home() -> Html<&'static str> {
    Html(HOME_PAGE)
}

async fn submit(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<SubmitRequest>,
) -> Json<SubmitResponse> {
    let uris: Vec<String> = URL_MATCHER
        .find_iter(&request.urls)
        .map(|m| m.as_str().to_string())
        .collect();
    tracing::info!(count = uris.len(), "links submitted");

    let mut walks = JoinSet::new();
    for uri in &uris {
        let mut scenario = state.story().scenario();
        let uri = uri.clone();
        walks.spawn(async move {
            scenario.set_initial_step(ENTRY_STEP).map_err(|e| format!("{}: {}", uri, e))?;
            let mut event = Event::new(SUBMIT_ORIGIN, uri.as_str());
            scenario.play(&mut event).await;
            match scenario.run_error() {
                Some(err) => Err(format!("{}: {}", uri, err)),
                None => Ok(()),
            }
        });
    }

    let mut errors = Vec::new();
    while let Some(joined) = walks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(error)) => {
                tracing::warn!(%error, "submitted link failed");
                errors.push(error);
            }
            Err(e) => errors.push(format!("dispatch task failed: {}", e)),
        }
    }

    Json(SubmitResponse {
        count: uris.len(),
        errors,
    })
}

async fn require_user(State(state): State<Arc<ServerState>>, request: Request, next: Next) -> Response {
    let users = &state.config.webserver.users;
    if users.is_empty() || is_authorized(users, request.headers()) {
        return next.run(request).await;
    }

    let challenge = format!("Basic realm=\"{}\"", state.config.webserver.auth_realm);
    (StatusCode::UNAUTHORIZED, [(header::WWW_AUTHENTICATE, challenge)], "Unauthorized").into_response()
}

fn is_authorized(users: &[WebUser], headers: &HeaderMap) -> bool {
    let Some(encoded) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Basic "))
    else {
        return false;
    };
    let Some(credentials) = STANDARD
        .decode(encoded.trim())
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
    else {
        return false;
    };
    let Some((name, password)) = credentials.split_once(':') else {
        return false;
    };
    users.iter().any(|user| user.name == name && user.password == password)
}
