//! Request, classification and metadata types.

use axum::http::{HeaderMap, Uri, header};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the gate knows about an incoming request.
///
/// Built once per request and only ever borrowed by later stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    /// Path plus query, as received
    pub url: String,
    /// Path component only
    pub path: String,
    /// Raw `User-Agent` header, empty when absent or not valid UTF-8
    pub user_agent: String,
}

impl RequestContext {
    /// Build a context from the pieces of an inbound HTTP request.
    pub fn from_request(uri: &Uri, headers: &HeaderMap) -> Self {
        let user_agent = headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        let url = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string());

        Self {
            url,
            path: uri.path().to_string(),
            user_agent,
        }
    }
}

/// Classification of the requesting agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentClass {
    /// Crawler, indexer or link-preview fetcher
    Bot,
    /// Anything else; gets the client-rendered shell
    Human,
}

impl AgentClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentClass::Bot => "bot",
            AgentClass::Human => "human",
        }
    }
}

impl fmt::Display for AgentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Open Graph content type of a page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    #[default]
    Website,
    Article,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Website => "website",
            ContentType::Article => "article",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The canonical SEO payload for one path.
///
/// Every field is always populated; the resolver guarantees this even when
/// the article lookup fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMetadata {
    pub title: String,
    pub description: String,
    /// Absolute URL of the share image
    pub image: String,
    pub content_type: ContentType,
    /// Absolute canonical URL
    pub canonical_url: String,
    /// Ordered, de-duplicated keyword list
    pub keywords: Vec<String>,
}

impl PageMetadata {
    /// Keywords in the `a, b, c` form used by `<meta name="keywords">`.
    pub fn keywords_joined(&self) -> String {
        self.keywords.join(", ")
    }
}

/// Pre-rendered HTML for a bot request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub html: String,
    /// Canonical URL advertised in the `Link` response header
    pub canonical_url: String,
}
