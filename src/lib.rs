//! seogate - a bot-aware SEO rendering gate for client-rendered news portals.
//!
//! Crawlers and link-preview fetchers cannot execute the portal's client-side
//! rendering, so the gate classifies each request by `User-Agent`, resolves
//! page metadata for the requested path and serves a pre-rendered document
//! with the right `<title>`, Open Graph and Twitter tags. Everyone else gets
//! the ordinary client-rendered shell via passthrough.

pub mod cli;
pub mod commands;
pub mod config;
pub mod gate;
pub mod logging;
pub mod models;

/// Version string reported by `seogate --version`: package version plus commit.
pub const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("SEOGATE_GIT_COMMIT"),
    ")"
);

/// Library-level error type for gate operations.
///
/// Every variant is recoverable from the gate's point of view: the request
/// pipeline logs these and falls back instead of surfacing them to clients.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("KDL parse error: {0}")]
    Kdl(#[from] kdl::KdlError),

    #[error("Timed out after {0} ms")]
    Timeout(u64),

    #[error("Upstream returned status {0}")]
    UpstreamStatus(u16),

    #[error("Template unavailable: {0}")]
    TemplateMissing(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for gate operations.
pub type Result<T> = std::result::Result<T, Error>;
