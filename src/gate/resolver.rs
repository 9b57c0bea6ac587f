//! Metadata resolution.
//!
//! The shape of the request path picks the strategy, in this order:
//!
//! 1. `/` - home defaults
//! 2. `/{category}` - category metadata derived from the segment
//! 3. `/{category}/{slug}` - article metadata from the external source
//! 4. anything else - home defaults
//!
//! Resolution is total: every input path yields a fully populated
//! [`PageMetadata`]. Lookup failures (transport, status, payload, timeout)
//! are logged and the category-level metadata is returned instead.

use std::time::Duration;
use tracing::{debug, warn};

use super::slug::{capitalize, meta_description, normalize_category};
use super::source::ArticleSource;
use crate::models::{ArticleKey, ArticleRecord, ContentType, LookupKey, PageMetadata};
use crate::{Error, Result};

/// Maximum length of an article description.
pub const MAX_DESCRIPTION_CHARS: usize = 160;

/// Keyword added to every article.
pub const ARTICLE_KEYWORD: &str = "vijesti";

/// Default timeout for the article lookup.
pub const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(3);

/// Site-wide branding and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    /// Absolute base URL without trailing slash
    pub base_url: String,
    pub site_name: String,
    pub default_title: String,
    pub default_description: String,
    /// Share image, absolute or relative to `base_url`
    pub default_image: String,
    pub default_keywords: Vec<String>,
    /// Open Graph locale
    pub locale: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            base_url: "https://brzi.info".to_string(),
            site_name: "Brzi.info".to_string(),
            default_title: "Brzi.info - Najnovije vijesti".to_string(),
            default_description: "Pratite najnovije vijesti i događanja uživo na Brzi.info - \
                vaš izvor za najnovije vijesti iz Hrvatske i svijeta."
                .to_string(),
            default_image: "/static/images/default-share.jpg".to_string(),
            default_keywords: ["vijesti", "hrvatska", "sport", "svijet"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            locale: "hr_HR".to_string(),
        }
    }
}

impl SiteProfile {
    fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Canonical URL for a request path (no query, no trailing slash).
    pub fn canonical_url(&self, path: &str) -> String {
        let path = path.split(['?', '#']).next().unwrap_or("");
        let path = path.trim_end_matches('/');
        if path.is_empty() {
            format!("{}/", self.base())
        } else if path.starts_with('/') {
            format!("{}{}", self.base(), path)
        } else {
            format!("{}/{}", self.base(), path)
        }
    }

    /// Turn an image reference into an absolute URL.
    pub fn absolute_image(&self, image: &str) -> String {
        let image = image.trim();
        if image.starts_with("http://") || image.starts_with("https://") {
            image.to_string()
        } else if let Some(rest) = image.strip_prefix("//") {
            format!("https://{}", rest)
        } else {
            format!("{}/{}", self.base(), image.trim_start_matches('/'))
        }
    }

    /// Home page metadata for the given canonical URL.
    pub fn home(&self, canonical_url: String) -> PageMetadata {
        PageMetadata {
            title: self.default_title.clone(),
            description: self.default_description.clone(),
            image: self.absolute_image(&self.default_image),
            content_type: ContentType::Website,
            canonical_url,
            keywords: self.default_keywords.clone(),
        }
    }

    /// Category page metadata layered over `base`.
    pub fn category(&self, base: PageMetadata, category: &str) -> PageMetadata {
        PageMetadata {
            title: format!("{} vijesti - {}", capitalize(category), self.site_name),
            description: format!(
                "Pratite najnovije {} vijesti i događanja uživo na {}",
                category, self.site_name
            ),
            keywords: dedup_keywords([category, "vijesti", "hrvatska"]),
            ..base
        }
    }
}

/// How a request path is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathShape<'a> {
    Home,
    Category(&'a str),
    Article { category: &'a str, slug: &'a str },
    Other,
}

impl<'a> PathShape<'a> {
    /// Classify a request path. One trailing `/` is ignored.
    pub fn of(path: &'a str) -> Self {
        if path == "/" {
            return PathShape::Home;
        }
        let Some(rest) = path.strip_prefix('/') else {
            return PathShape::Other;
        };
        let rest = rest.strip_suffix('/').unwrap_or(rest);

        let segments: Vec<&str> = rest.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return PathShape::Other;
        }
        match *segments.as_slice() {
            [category] => PathShape::Category(category),
            [category, slug] => PathShape::Article { category, slug },
            _ => PathShape::Other,
        }
    }
}

/// First candidate that is present and not blank.
fn first_present<'a, I>(candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    candidates
        .into_iter()
        .flatten()
        .find(|value| !value.trim().is_empty())
}

/// Trim, drop blanks and keep the first occurrence of each keyword.
fn dedup_keywords<I, S>(keywords: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for keyword in keywords {
        let keyword = keyword.as_ref().trim();
        if !keyword.is_empty() && !out.iter().any(|k| k == keyword) {
            out.push(keyword.to_string());
        }
    }
    out
}

/// Resolves [`PageMetadata`] for request paths.
#[derive(Debug, Clone)]
pub struct MetadataResolver {
    site: SiteProfile,
    lookup_key: LookupKey,
    timeout: Duration,
}

impl Default for MetadataResolver {
    fn default() -> Self {
        Self::new(SiteProfile::default())
    }
}

impl MetadataResolver {
    pub fn new(site: SiteProfile) -> Self {
        Self {
            site,
            lookup_key: LookupKey::default(),
            timeout: DEFAULT_LOOKUP_TIMEOUT,
        }
    }

    pub fn with_lookup_key(mut self, lookup_key: LookupKey) -> Self {
        self.lookup_key = lookup_key;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn site(&self) -> &SiteProfile {
        &self.site
    }

    /// Metadata that needs no lookup: home, category, or the category level
    /// of an article path.
    pub fn resolve_static(&self, path: &str) -> PageMetadata {
        let home = self.site.home(self.site.canonical_url(path));
        match PathShape::of(path) {
            PathShape::Home | PathShape::Other => home,
            PathShape::Category(category) | PathShape::Article { category, .. } => {
                self.site.category(home, category)
            }
        }
    }

    /// Resolve metadata for `path`, consulting `source` for article paths.
    ///
    /// Never fails; see the module docs for the fallback rules.
    pub async fn resolve<S: ArticleSource>(&self, path: &str, source: &S) -> PageMetadata {
        let base = self.resolve_static(path);
        let PathShape::Article { category, slug } = PathShape::of(path) else {
            return base;
        };

        let Some(key) = ArticleKey::from_slug(slug, self.lookup_key) else {
            debug!(path, "no article key in slug, using category metadata");
            return base;
        };

        match self.lookup(source, &key).await {
            Ok(Some(record)) => self.article(base, category, &record),
            Ok(None) => {
                debug!(%key, "article not found, using category metadata");
                base
            }
            Err(e) => {
                warn!(%key, error = %e, "article lookup failed, using category metadata");
                base
            }
        }
    }

    async fn lookup<S: ArticleSource>(
        &self,
        source: &S,
        key: &ArticleKey,
    ) -> Result<Option<ArticleRecord>> {
        tokio::time::timeout(self.timeout, source.fetch(key))
            .await
            .map_err(|_| Error::Timeout(self.timeout.as_millis() as u64))?
    }

    /// Layer an article record over the category-level metadata.
    fn article(&self, base: PageMetadata, category: &str, record: &ArticleRecord) -> PageMetadata {
        let summary = record.clean_summary();

        let title = first_present([record.title.as_deref(), Some(base.title.as_str())])
            .unwrap_or(&self.site.default_title)
            .to_string();

        let description = first_present([
            record.explicit_description(),
            summary.as_deref(),
            Some(self.site.default_description.as_str()),
        ])
        .map(|d| meta_description(d, MAX_DESCRIPTION_CHARS))
        .unwrap_or_else(|| self.site.default_description.clone());

        let image = match first_present([record.image_ref()]) {
            Some(image) => self.site.absolute_image(image),
            None => self.site.absolute_image(&self.site.default_image),
        };

        let category_keyword = match first_present([record.category_name.as_deref()]) {
            Some(name) => name.trim().to_lowercase(),
            None => normalize_category(category),
        };
        let keywords = dedup_keywords(
            record
                .keywords
                .iter()
                .map(String::as_str)
                .chain([category_keyword.as_str(), ARTICLE_KEYWORD]),
        );

        PageMetadata {
            title,
            description,
            image,
            content_type: ContentType::Article,
            canonical_url: base.canonical_url,
            keywords,
        }
    }
}
