//! Loading the base HTML template.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

use crate::{Error, Result};

/// Where the base template comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSource {
    /// Local static asset, e.g. `dist/index.html`
    File(PathBuf),
    /// Fetched over HTTP, e.g. `https://origin/index.html`
    Http(String),
}

impl TemplateSource {
    pub fn describe(&self) -> String {
        match self {
            TemplateSource::File(path) => path.display().to_string(),
            TemplateSource::Http(url) => url.clone(),
        }
    }
}

#[derive(Debug)]
struct CachedTemplate {
    html: Arc<str>,
    loaded_at: Instant,
}

/// Template cache with a fixed time-to-live.
///
/// A zero TTL never stores anything. Failed loads are not cached.
#[derive(Debug)]
pub struct TemplateCache {
    ttl: Duration,
    entry: Mutex<Option<CachedTemplate>>,
}

impl TemplateCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    async fn get(&self) -> Option<Arc<str>> {
        let entry = self.entry.lock().await;
        entry
            .as_ref()
            .filter(|cached| cached.loaded_at.elapsed() < self.ttl)
            .map(|cached| cached.html.clone())
    }

    async fn put(&self, html: Arc<str>) {
        if self.ttl.is_zero() {
            return;
        }
        *self.entry.lock().await = Some(CachedTemplate {
            html,
            loaded_at: Instant::now(),
        });
    }
}

/// Loads the template from its source, optionally through a [`TemplateCache`].
#[derive(Debug, Clone)]
pub struct TemplateLoader {
    source: TemplateSource,
    client: reqwest::Client,
    cache: Option<Arc<TemplateCache>>,
}

impl TemplateLoader {
    pub fn new(source: TemplateSource, client: reqwest::Client) -> Self {
        Self {
            source,
            client,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: Arc<TemplateCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn source(&self) -> &TemplateSource {
        &self.source
    }

    /// Current template HTML.
    pub async fn load(&self) -> Result<Arc<str>> {
        if let Some(ref cache) = self.cache {
            if let Some(html) = cache.get().await {
                return Ok(html);
            }
        }

        let html: Arc<str> = self.read_source().await?.into();
        if let Some(ref cache) = self.cache {
            cache.put(html.clone()).await;
        }
        Ok(html)
    }

    async fn read_source(&self) -> Result<String> {
        match &self.source {
            TemplateSource::File(path) => {
                debug!(path = %path.display(), "reading template");
                tokio::fs::read_to_string(path).await.map_err(|e| {
                    Error::TemplateMissing(format!("{}: {}", path.display(), e))
                })
            }
            TemplateSource::Http(url) => {
                debug!(%url, "fetching template");
                let response = self.client.get(url).send().await?;
                let status = response.status();
                if !status.is_success() {
                    return Err(Error::TemplateMissing(format!("{} returned {}", url, status)));
                }
                Ok(response.text().await?)
            }
        }
    }
}

/// Client for template and upstream fetches bounded by `timeout`.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("seogate/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn file_loader(dir: &TempDir) -> (PathBuf, TemplateLoader) {
        let path = dir.path().join("index.html");
        fs::write(&path, "<html><head></head>v1</html>").unwrap();
        let loader = TemplateLoader::new(TemplateSource::File(path.clone()), reqwest::Client::new());
        (path, loader)
    }

    #[tokio::test]
    async fn test_read_through_sees_changes() {
        let dir = TempDir::new().unwrap();
        let (path, loader) = file_loader(&dir);

        assert!(loader.load().await.unwrap().contains("v1"));
        fs::write(&path, "<html><head></head>v2</html>").unwrap();
        assert!(loader.load().await.unwrap().contains("v2"));
    }

    #[tokio::test]
    async fn test_missing_file_is_template_missing() {
        let dir = TempDir::new().unwrap();
        let loader = TemplateLoader::new(
            TemplateSource::File(dir.path().join("nope.html")),
            reqwest::Client::new(),
        );
        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, Error::TemplateMissing(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_serves_until_ttl_expires() {
        let dir = TempDir::new().unwrap();
        let (path, loader) = file_loader(&dir);
        let loader = loader.with_cache(Arc::new(TemplateCache::new(Duration::from_secs(60))));

        assert!(loader.load().await.unwrap().contains("v1"));
        fs::write(&path, "<html><head></head>v2</html>").unwrap();
        assert!(loader.load().await.unwrap().contains("v1"));

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(loader.load().await.unwrap().contains("v2"));
    }

    #[tokio::test]
    async fn test_zero_ttl_is_read_through() {
        let dir = TempDir::new().unwrap();
        let (path, loader) = file_loader(&dir);
        let loader = loader.with_cache(Arc::new(TemplateCache::new(Duration::ZERO)));

        assert!(loader.load().await.unwrap().contains("v1"));
        fs::write(&path, "<html><head></head>v2</html>").unwrap();
        assert!(loader.load().await.unwrap().contains("v2"));
    }

    #[tokio::test]
    async fn test_failed_load_not_cached() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index.html");
        let loader = TemplateLoader::new(TemplateSource::File(path.clone()), reqwest::Client::new())
            .with_cache(Arc::new(TemplateCache::new(Duration::from_secs(60))));

        assert!(loader.load().await.is_err());
        fs::write(&path, "<html><head></head>late</html>").unwrap();
        assert!(loader.load().await.unwrap().contains("late"));
    }

    #[test]
    fn test_describe_source() {
        assert_eq!(
            TemplateSource::Http("https://origin/index.html".to_string()).describe(),
            "https://origin/index.html"
        );
    }
}
