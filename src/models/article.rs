//! Article rows consumed from the external data source.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// One row of the portal's `articles` table.
///
/// The gate only reads these. Every field is optional because rows in the
/// wild are sparse, and a record with nothing usable still resolves to
/// sensible metadata through the fallback chains.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleRecord {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub meta_description: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_keywords")]
    pub keywords: Vec<String>,
    #[serde(default, alias = "categoryName")]
    pub category_name: Option<String>,
}

impl ArticleRecord {
    /// Explicit description, preferring `description` over `meta_description`.
    pub fn explicit_description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .or(self.meta_description.as_deref())
    }

    /// Image reference, preferring `image` over `image_url`.
    pub fn image_ref(&self) -> Option<&str> {
        self.image.as_deref().or(self.image_url.as_deref())
    }

    /// Summary text with fenced JSON payloads unwrapped.
    ///
    /// Some rows store the summary as a ```` ```json {"summary": "..."} ``` ````
    /// block produced by the ingestion pipeline; the inner `summary` field is
    /// returned in that case. Anything unparseable is returned verbatim.
    pub fn clean_summary(&self) -> Option<String> {
        let summary = self.summary.as_deref()?;
        Some(unwrap_fenced_summary(summary))
    }
}

fn unwrap_fenced_summary(summary: &str) -> String {
    let Some(start) = summary.find("```json") else {
        return summary.to_string();
    };
    let body = &summary[start + "```json".len()..];
    let body = match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    };

    match serde_json::from_str::<serde_json::Value>(body.trim()) {
        Ok(value) => value
            .get("summary")
            .and_then(|s| s.as_str())
            .unwrap_or("")
            .to_string(),
        Err(_) => summary.to_string(),
    }
}

/// Accepts a string array, `null`, or anything else (treated as empty).
fn lenient_keywords<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .filter_map(|item| item.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    })
}

/// Which part of the final path segment identifies an article.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LookupKey {
    /// Trailing numeric id, e.g. `utakmica-123` -> `123`
    #[default]
    Id,
    /// The whole slug
    Slug,
}

impl LookupKey {
    /// Parse from string, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "id" => Some(LookupKey::Id),
            "slug" => Some(LookupKey::Slug),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LookupKey::Id => "id",
            LookupKey::Slug => "slug",
        }
    }
}

impl fmt::Display for LookupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Key used to look an article up in the data source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ArticleKey {
    Id(u64),
    Slug(String),
}

impl ArticleKey {
    /// Derive the key for `slug` under the given lookup strategy.
    ///
    /// Returns `None` when the strategy is `Id` and the slug carries no
    /// trailing numeric id, or when the slug is empty.
    pub fn from_slug(slug: &str, strategy: LookupKey) -> Option<Self> {
        if slug.is_empty() {
            return None;
        }
        match strategy {
            LookupKey::Id => crate::gate::slug::extract_id(slug).map(ArticleKey::Id),
            LookupKey::Slug => Some(ArticleKey::Slug(slug.to_string())),
        }
    }

    /// Column name this key filters on.
    pub fn column(&self) -> &'static str {
        match self {
            ArticleKey::Id(_) => "id",
            ArticleKey::Slug(_) => "slug",
        }
    }

    /// Value in PostgREST `eq.` filter form.
    pub fn filter(&self) -> String {
        match self {
            ArticleKey::Id(id) => format!("eq.{}", id),
            ArticleKey::Slug(slug) => format!("eq.{}", slug),
        }
    }
}

impl fmt::Display for ArticleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArticleKey::Id(id) => write!(f, "id:{}", id),
            ArticleKey::Slug(slug) => write!(f, "slug:{}", slug),
        }
    }
}
