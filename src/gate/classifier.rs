//! User-agent classification.
//!
//! Classification is a pure function of the `User-Agent` string: the value is
//! lower-cased and tested for substring membership against a catalog of
//! crawler signatures, plus a small set of prefixes used by automated
//! fetchers. Matching is deliberately permissive. A false positive still
//! yields valid, crawlable HTML; a false negative hands a bot the normal
//! client-rendered shell.

use crate::models::AgentClass;
use std::sync::LazyLock;

/// Built-in crawler signatures, lower-case.
pub const DEFAULT_SIGNATURES: &[&str] = &[
    // Generic
    "bot",
    "crawler",
    "spider",
    "prerender",
    "preview",
    // Search engines
    "googlebot",
    "bingbot",
    "yandex",
    "duckduckbot",
    "baiduspider",
    "applebot",
    // Social link unfurlers
    "facebookexternalhit",
    "facebookcatalog",
    "twitterbot",
    "linkedinbot",
    "whatsapp",
    "telegram",
    "discord",
    "slack",
    "skype",
    "viber",
    "pinterest",
    "vkshare",
    "embedly",
    // Validators
    "w3c_validator",
];

/// Prefixes used by many automated fetchers that do not name themselves.
pub const DEFAULT_PREFIXES: &[&str] = &["mozilla/5.0 (compatible;"];

static DEFAULT_CATALOG: LazyLock<BotCatalog> = LazyLock::new(BotCatalog::default);

/// An updatable catalog of bot signatures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotCatalog {
    signatures: Vec<String>,
    prefixes: Vec<String>,
}

impl Default for BotCatalog {
    fn default() -> Self {
        Self::new(
            DEFAULT_SIGNATURES.iter().copied(),
            DEFAULT_PREFIXES.iter().copied(),
        )
    }
}

impl BotCatalog {
    /// Build a catalog; entries are lower-cased, trimmed and de-duplicated.
    pub fn new<S, P>(signatures: S, prefixes: P) -> Self
    where
        S: IntoIterator,
        S::Item: AsRef<str>,
        P: IntoIterator,
        P::Item: AsRef<str>,
    {
        let mut catalog = Self {
            signatures: Vec::new(),
            prefixes: Vec::new(),
        };
        catalog.extend(signatures);
        for prefix in prefixes {
            push_unique(&mut catalog.prefixes, prefix.as_ref());
        }
        catalog
    }

    /// Catalog with the given signatures and the default prefixes.
    pub fn with_signatures<S>(signatures: S) -> Self
    where
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        Self::new(signatures, DEFAULT_PREFIXES.iter().copied())
    }

    /// Append signatures, skipping blanks and duplicates.
    pub fn extend<S>(&mut self, signatures: S)
    where
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        for signature in signatures {
            push_unique(&mut self.signatures, signature.as_ref());
        }
    }

    pub fn signatures(&self) -> &[String] {
        &self.signatures
    }

    /// Classify a raw `User-Agent` value. Empty input is `Human`.
    pub fn classify(&self, user_agent: &str) -> AgentClass {
        let ua = user_agent.to_lowercase();
        let matched = self.signatures.iter().any(|s| ua.contains(s.as_str()))
            || self.prefixes.iter().any(|p| ua.starts_with(p.as_str()));

        if matched {
            AgentClass::Bot
        } else {
            AgentClass::Human
        }
    }
}

fn push_unique(list: &mut Vec<String>, entry: &str) {
    let entry = entry.trim().to_lowercase();
    if !entry.is_empty() && !list.contains(&entry) {
        list.push(entry);
    }
}

/// Classify against the built-in catalog.
pub fn classify(user_agent: &str) -> AgentClass {
    DEFAULT_CATALOG.classify(user_agent)
}
