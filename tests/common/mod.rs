//! Common test utilities for seogate integration tests.
//!
//! Provides `TestEnv` for CLI runs that never read the user's
//! `~/.config/seogate/config.kdl`, a portal shell on disk, and a mock
//! article service speaking the PostgREST query dialect.

#![allow(dead_code)]

use assert_cmd::Command;
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
pub use tempfile::TempDir;

/// Vite-style portal shell with existing head tags.
pub const SHELL: &str = r#"<!doctype html>
<html lang="hr">
  <head>
    <meta charset="UTF-8" />
    <title>Brzi.info</title>
    <meta name="description" content="Portal" />
    <link rel="canonical" href="https://brzi.info/" />
  </head>
  <body><div id="root"></div><script type="module" src="/assets/index.js"></script></body>
</html>"#;

/// A test environment with an isolated config directory and site root.
pub struct TestEnv {
    pub config_dir: TempDir,
    pub site_dir: TempDir,
}

impl TestEnv {
    /// Create a new environment with the portal shell written to `dist`.
    pub fn new() -> Self {
        let env = Self {
            config_dir: TempDir::new().unwrap(),
            site_dir: TempDir::new().unwrap(),
        };
        std::fs::write(env.site_dir.path().join("index.html"), SHELL).unwrap();
        env
    }

    /// Get a Command for the seogate binary.
    ///
    /// Points the config directory at a temp dir and clears the env vars the
    /// resolver reads, so host settings never leak into a test.
    pub fn seogate(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_seogate"));
        cmd.current_dir(self.site_dir.path());
        cmd.env("XDG_CONFIG_HOME", self.config_dir.path());
        cmd.env("HOME", self.config_dir.path());
        cmd.env_remove("SEOGATE_BASE_URL");
        cmd.env_remove("SUPABASE_URL");
        cmd.env_remove("SUPABASE_KEY");
        cmd.env("RUST_LOG", "off");
        cmd
    }

    /// Write `~/.config/seogate/config.kdl` and return its path.
    pub fn write_config(&self, content: &str) -> PathBuf {
        let dir = self.config_dir.path().join("seogate");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.kdl");
        std::fs::write(&path, content).unwrap();
        path
    }

    pub fn site_path(&self) -> &Path {
        self.site_dir.path()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Behaviour of the mock article service.
#[derive(Clone)]
struct MockState {
    rows: Arc<Vec<serde_json::Value>>,
    status: StatusCode,
    seen: Arc<Mutex<Vec<String>>>,
}

/// Handle to a running mock article service.
pub struct MockArticles {
    /// Endpoint to configure as the data source
    pub endpoint: String,
    seen: Arc<Mutex<Vec<String>>>,
}

impl MockArticles {
    /// Start a service answering `GET /rest/v1/articles` from `rows`.
    pub async fn start(rows: Vec<serde_json::Value>) -> Self {
        Self::start_with_status(rows, StatusCode::OK).await
    }

    /// Start a service that answers every lookup with `status`.
    pub async fn failing(status: StatusCode) -> Self {
        Self::start_with_status(Vec::new(), status).await
    }

    async fn start_with_status(rows: Vec<serde_json::Value>, status: StatusCode) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = MockState {
            rows: Arc::new(rows),
            status,
            seen: seen.clone(),
        };
        let app = Router::new()
            .route("/rest/v1/articles", get(lookup))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            endpoint: format!("http://{}", addr),
            seen,
        }
    }

    /// Filters received so far, as `column=value` strings.
    pub fn requests(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

async fn lookup(
    State(state): State<MockState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let mut filters: Vec<String> = params
        .iter()
        .filter(|(column, _)| column.as_str() != "limit")
        .map(|(column, value)| format!("{}={}", column, value))
        .collect();
    filters.sort();
    if headers.contains_key("apikey") {
        filters.push("apikey".to_string());
    }
    state.seen.lock().unwrap().extend(filters);

    if !state.status.is_success() {
        return (state.status, "boom").into_response();
    }

    let matches: Vec<serde_json::Value> = state
        .rows
        .iter()
        .filter(|row| {
            params.iter().all(|(column, filter)| {
                if column == "limit" {
                    return true;
                }
                let Some(wanted) = filter.strip_prefix("eq.") else {
                    return false;
                };
                match row.get(column) {
                    Some(serde_json::Value::String(s)) => s == wanted,
                    Some(serde_json::Value::Number(n)) => n.to_string() == wanted,
                    _ => false,
                }
            })
        })
        .cloned()
        .collect();

    axum::Json(matches).into_response()
}
