//! The underlying application behind the gate.
//!
//! Humans (and bots whose document could not be rendered) are served by the
//! portal itself: either its built assets from disk or a proxied origin.
//! Response bodies are relayed as-is; upstream bodies are streamed, never
//! buffered.

use axum::body::{Body, to_bytes};
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::{Request, Response, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use tracing::warn;

use crate::Result;

/// Largest request body forwarded upstream.
const MAX_FORWARD_BODY: usize = 10 * 1024 * 1024;

/// Hop-by-hop headers are connection-scoped and never forwarded.
fn is_hop_by_hop(name: &HeaderName) -> bool {
    matches!(
        name.as_str(),
        "connection"
            | "keep-alive"
            | "proxy-authenticate"
            | "proxy-authorization"
            | "te"
            | "trailer"
            | "transfer-encoding"
            | "upgrade"
    )
}

fn end_to_end(headers: &HeaderMap) -> HeaderMap {
    let mut out = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        if !is_hop_by_hop(name) && name != header::HOST {
            out.append(name.clone(), value.clone());
        }
    }
    out
}

/// Built portal assets served from a directory, SPA style.
#[derive(Debug, Clone)]
pub struct StaticSite {
    root: PathBuf,
    service: ServeDir<ServeFile>,
}

impl StaticSite {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let service = ServeDir::new(&root).fallback(ServeFile::new(root.join("index.html")));
        Self { root, service }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn respond(&self, request: Request<Body>) -> Response<Body> {
        match self.service.clone().oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        }
    }
}

/// Reverse proxy to the portal's origin server.
#[derive(Debug, Clone)]
pub struct UpstreamOrigin {
    origin: String,
    client: reqwest::Client,
}

impl UpstreamOrigin {
    pub fn new(origin: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            origin: origin.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    async fn respond(&self, request: Request<Body>) -> Response<Body> {
        match self.forward(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(origin = %self.origin, error = %e, "upstream request failed");
                let mut response = Response::new(Body::from("Bad Gateway"));
                *response.status_mut() = StatusCode::BAD_GATEWAY;
                response
            }
        }
    }

    async fn forward(&self, request: Request<Body>) -> Result<Response<Body>> {
        let (parts, body) = request.into_parts();
        let path = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", self.origin, path);
        let body = to_bytes(body, MAX_FORWARD_BODY)
            .await
            .map_err(|e| crate::Error::Other(format!("reading request body: {}", e)))?;

        let upstream = self
            .client
            .request(parts.method, url)
            .headers(end_to_end(&parts.headers))
            .body(body)
            .send()
            .await?;

        let status = upstream.status();
        let headers = end_to_end(upstream.headers());

        let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}

/// How requests that are not served a rendered document get answered.
#[derive(Debug, Clone)]
pub enum Passthrough {
    Static(StaticSite),
    Upstream(UpstreamOrigin),
}

impl Passthrough {
    pub async fn respond(&self, request: Request<Body>) -> Response<Body> {
        match self {
            Passthrough::Static(site) => site.respond(request).await,
            Passthrough::Upstream(origin) => origin.respond(request).await,
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Passthrough::Static(site) => format!("static:{}", site.root().display()),
            Passthrough::Upstream(origin) => format!("upstream:{}", origin.origin()),
        }
    }
}
