//! External article lookup.
//!
//! [`ArticleSource`] is the seam between metadata resolution and the data
//! service. `Ok(None)` means "no such article"; errors cover transport
//! failures, non-2xx statuses and malformed payloads. The resolver treats both
//! the same way, so implementations never need to recover on their own.

use reqwest::header::{ACCEPT, AUTHORIZATION};
use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use super::template::http_client;
use crate::models::{ArticleKey, ArticleRecord};
use crate::{Error, Result};

/// A read-only lookup of article records by key.
pub trait ArticleSource: Send + Sync {
    fn fetch(
        &self,
        key: &ArticleKey,
    ) -> impl Future<Output = Result<Option<ArticleRecord>>> + Send;
}

/// No data source configured: every lookup is "not found".
impl<S: ArticleSource> ArticleSource for Option<S> {
    async fn fetch(&self, key: &ArticleKey) -> Result<Option<ArticleRecord>> {
        match self {
            Some(source) => source.fetch(key).await,
            None => Ok(None),
        }
    }
}

/// PostgREST-style REST endpoint (the portal's Supabase project).
///
/// Issues `GET {endpoint}/rest/v1/{table}?{column}=eq.{value}&limit=1` and
/// takes the first element of the returned JSON array.
#[derive(Debug, Clone)]
pub struct RestArticleSource {
    client: reqwest::Client,
    endpoint: String,
    table: String,
    api_key: Option<String>,
}

impl RestArticleSource {
    /// Default table holding article rows.
    pub const DEFAULT_TABLE: &'static str = "articles";

    /// Create a source with its own HTTP client bounded by `timeout`.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        table: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self::with_client(http_client(timeout)?, endpoint, api_key, table))
    }

    /// Create a source sharing an existing client.
    pub fn with_client(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            table: table.into(),
            api_key,
        }
    }

    /// URL of the table resource, without filters.
    pub fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.endpoint, self.table)
    }
}

impl ArticleSource for RestArticleSource {
    async fn fetch(&self, key: &ArticleKey) -> Result<Option<ArticleRecord>> {
        let mut request = self
            .client
            .get(self.table_url())
            .query(&[(key.column(), key.filter()), ("limit", "1".to_string())])
            .header(ACCEPT, "application/json");

        if let Some(ref api_key) = self.api_key {
            request = request
                .header("apikey", api_key)
                .header(AUTHORIZATION, format!("Bearer {}", api_key));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamStatus(status.as_u16()));
        }

        let body = response.bytes().await?;
        let records: Vec<ArticleRecord> = serde_json::from_slice(&body)?;
        Ok(records.into_iter().next())
    }
}

/// In-memory source, for tests and offline rendering.
#[derive(Debug, Clone, Default)]
pub struct MemoryArticleSource {
    records: HashMap<ArticleKey, ArticleRecord>,
    failure: Option<u16>,
}

impl MemoryArticleSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record under `key`.
    pub fn with_record(mut self, key: ArticleKey, record: ArticleRecord) -> Self {
        self.records.insert(key, record);
        self
    }

    /// Make every lookup fail as if the service answered with `status`.
    pub fn failing(status: u16) -> Self {
        Self {
            records: HashMap::new(),
            failure: Some(status),
        }
    }
}

impl ArticleSource for MemoryArticleSource {
    async fn fetch(&self, key: &ArticleKey) -> Result<Option<ArticleRecord>> {
        if let Some(status) = self.failure {
            return Err(Error::UpstreamStatus(status));
        }
        Ok(self.records.get(key).cloned())
    }
}
