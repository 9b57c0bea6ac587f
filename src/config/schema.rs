//! KDL schema for config.kdl.
//!
//! This module provides:
//! - Rust structs representing the KDL schema
//! - Serialization/deserialization to/from KDL format
//! - Validation of file-level values
//! - Default values

use kdl::{KdlDocument, KdlEntry, KdlNode, KdlValue};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::gate::dispatch::DEFAULT_CACHE_CONTROL;
use crate::gate::resolver::SiteProfile;
use crate::gate::source::RestArticleSource;
use crate::models::LookupKey;
use crate::{Error, Result};

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:3000";

/// Default base URL of the portal.
pub const DEFAULT_BASE_URL: &str = "https://brzi.info";

/// Default directory with the portal's built assets.
pub const DEFAULT_STATIC_ROOT: &str = "./dist";

/// Default article lookup timeout.
pub const DEFAULT_TIMEOUT_MS: u64 = 3000;

/// Default template cache TTL.
pub const DEFAULT_TEMPLATE_TTL_SECS: u64 = 60;

/// The `data-source` block.
///
/// # KDL Schema
///
/// ```kdl
/// data-source {
///     endpoint "https://project.supabase.co"
///     api-key "eyJ..."
///     table "articles"
///     lookup-key "id"  // "id" | "slug"
///     timeout-ms 3000
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    pub endpoint: Option<String>,
    /// API key sent as `apikey` and bearer token (sensitive)
    pub api_key: Option<String>,
    pub table: Option<String>,
    pub lookup_key: Option<LookupKey>,
    pub timeout_ms: Option<u64>,
}

impl DataSourceConfig {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn from_kdl(node: &KdlNode) -> Self {
        let mut config = Self::default();
        let Some(children) = node.children() else {
            return config;
        };

        for child in children.nodes() {
            match child.name().value() {
                "endpoint" => config.endpoint = get_string_arg(child),
                "api-key" => config.api_key = get_string_arg(child),
                "table" => config.table = get_string_arg(child),
                "lookup-key" => {
                    config.lookup_key = get_string_arg(child).and_then(|s| LookupKey::parse(&s))
                }
                "timeout-ms" => config.timeout_ms = get_u64_arg(child),
                _ => {}
            }
        }

        config
    }

    fn to_kdl(&self) -> KdlNode {
        let mut node = KdlNode::new("data-source");
        let mut children = KdlDocument::new();

        if let Some(ref endpoint) = self.endpoint {
            children.nodes_mut().push(string_node("endpoint", endpoint));
        }
        if let Some(ref api_key) = self.api_key {
            children.nodes_mut().push(string_node("api-key", api_key));
        }
        if let Some(ref table) = self.table {
            children.nodes_mut().push(string_node("table", table));
        }
        if let Some(lookup_key) = self.lookup_key {
            children
                .nodes_mut()
                .push(string_node("lookup-key", lookup_key.as_str()));
        }
        if let Some(timeout_ms) = self.timeout_ms {
            let mut child = KdlNode::new("timeout-ms");
            child.push(KdlEntry::new(KdlValue::Integer(timeout_ms as i128)));
            children.nodes_mut().push(child);
        }

        node.set_children(children);
        node
    }
}

/// Gate settings stored in config.kdl.
///
/// Every value is optional; unset values fall back to environment variables
/// (where supported) and then built-in defaults.
///
/// # KDL Schema
///
/// ```kdl
/// listen "0.0.0.0:8080"
/// base-url "https://brzi.info"
/// site-name "Brzi.info"
/// default-title "Brzi.info - Najnovije vijesti"
/// default-description "Pratite najnovije vijesti..."
/// default-image "/static/images/default-share.jpg"
/// default-keywords "vijesti" "hrvatska" "sport" "svijet"
/// locale "hr_HR"
///
/// data-source { ... }
///
/// static-root "./dist"          // or: upstream "http://127.0.0.1:5173"
/// template "./dist/index.html"  // file path or http(s) URL
/// template-ttl-secs 60
/// cache-control "public, max-age=300, stale-while-revalidate=600"
/// meta-headers #false
/// security-headers #true
///
/// bot-signatures "bot" "crawler" "spider"  // replaces the built-in catalog
/// extra-bot-signatures "newsbreak"         // appended to the catalog
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateConfig {
    pub listen: Option<String>,
    pub base_url: Option<String>,
    pub site_name: Option<String>,
    pub default_title: Option<String>,
    pub default_description: Option<String>,
    pub default_image: Option<String>,
    pub default_keywords: Option<Vec<String>>,
    pub locale: Option<String>,
    pub data_source: DataSourceConfig,
    pub static_root: Option<PathBuf>,
    pub upstream: Option<String>,
    pub template: Option<String>,
    pub template_ttl_secs: Option<u64>,
    pub cache_control: Option<String>,
    pub meta_headers: Option<bool>,
    pub security_headers: Option<bool>,
    pub bot_signatures: Option<Vec<String>>,
    pub extra_bot_signatures: Vec<String>,
}

impl GateConfig {
    /// Create an empty config with no values set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Config written by `seogate config init`: every built-in default spelled out.
    pub fn starter() -> Self {
        let site = SiteProfile::default();
        Self {
            listen: Some(DEFAULT_LISTEN.to_string()),
            base_url: Some(site.base_url),
            site_name: Some(site.site_name),
            default_title: Some(site.default_title),
            default_description: Some(site.default_description),
            default_image: Some(site.default_image),
            default_keywords: Some(site.default_keywords),
            locale: Some(site.locale),
            data_source: DataSourceConfig {
                table: Some(RestArticleSource::DEFAULT_TABLE.to_string()),
                lookup_key: Some(LookupKey::default()),
                timeout_ms: Some(DEFAULT_TIMEOUT_MS),
                ..Default::default()
            },
            static_root: Some(PathBuf::from(DEFAULT_STATIC_ROOT)),
            template_ttl_secs: Some(DEFAULT_TEMPLATE_TTL_SECS),
            cache_control: Some(DEFAULT_CACHE_CONTROL.to_string()),
            meta_headers: Some(false),
            security_headers: Some(true),
            ..Default::default()
        }
    }

    /// Validate the config values.
    ///
    /// Returns an error message if any value is invalid.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.static_root.is_some() && self.upstream.is_some() {
            return Err("static-root and upstream are mutually exclusive".to_string());
        }
        if self.data_source.timeout_ms == Some(0) {
            return Err("data-source timeout-ms must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Parse config from a KDL document.
    pub fn from_kdl(doc: &KdlDocument) -> Self {
        let mut config = Self::new();

        config.listen = doc.get("listen").and_then(get_string_arg);
        config.base_url = doc.get("base-url").and_then(get_string_arg);
        config.site_name = doc.get("site-name").and_then(get_string_arg);
        config.default_title = doc.get("default-title").and_then(get_string_arg);
        config.default_description = doc.get("default-description").and_then(get_string_arg);
        config.default_image = doc.get("default-image").and_then(get_string_arg);
        config.default_keywords = doc.get("default-keywords").map(get_string_args);
        config.locale = doc.get("locale").and_then(get_string_arg);

        if let Some(node) = doc.get("data-source") {
            config.data_source = DataSourceConfig::from_kdl(node);
        }

        config.static_root = doc
            .get("static-root")
            .and_then(get_string_arg)
            .map(PathBuf::from);
        config.upstream = doc.get("upstream").and_then(get_string_arg);
        config.template = doc.get("template").and_then(get_string_arg);
        config.template_ttl_secs = doc.get("template-ttl-secs").and_then(get_u64_arg);
        config.cache_control = doc.get("cache-control").and_then(get_string_arg);
        config.meta_headers = doc.get("meta-headers").and_then(get_bool_arg);
        config.security_headers = doc.get("security-headers").and_then(get_bool_arg);
        config.bot_signatures = doc.get("bot-signatures").map(get_string_args);
        config.extra_bot_signatures = doc
            .get("extra-bot-signatures")
            .map(get_string_args)
            .unwrap_or_default();

        config
    }

    /// Convert config to a KDL document.
    pub fn to_kdl(&self) -> KdlDocument {
        let mut doc = KdlDocument::new();

        let strings = [
            ("listen", &self.listen),
            ("base-url", &self.base_url),
            ("site-name", &self.site_name),
            ("default-title", &self.default_title),
            ("default-description", &self.default_description),
            ("default-image", &self.default_image),
        ];
        for (name, value) in strings {
            if let Some(value) = value {
                doc.nodes_mut().push(string_node(name, value));
            }
        }
        if let Some(ref keywords) = self.default_keywords {
            doc.nodes_mut().push(strings_node("default-keywords", keywords));
        }
        if let Some(ref locale) = self.locale {
            doc.nodes_mut().push(string_node("locale", locale));
        }

        if !self.data_source.is_empty() {
            doc.nodes_mut().push(self.data_source.to_kdl());
        }

        if let Some(ref root) = self.static_root {
            doc.nodes_mut()
                .push(string_node("static-root", &root.display().to_string()));
        }
        if let Some(ref upstream) = self.upstream {
            doc.nodes_mut().push(string_node("upstream", upstream));
        }
        if let Some(ref template) = self.template {
            doc.nodes_mut().push(string_node("template", template));
        }
        if let Some(ttl) = self.template_ttl_secs {
            let mut node = KdlNode::new("template-ttl-secs");
            node.push(KdlEntry::new(KdlValue::Integer(ttl as i128)));
            doc.nodes_mut().push(node);
        }
        if let Some(ref cache_control) = self.cache_control {
            doc.nodes_mut().push(string_node("cache-control", cache_control));
        }
        if let Some(enabled) = self.meta_headers {
            doc.nodes_mut().push(bool_node("meta-headers", enabled));
        }
        if let Some(enabled) = self.security_headers {
            doc.nodes_mut().push(bool_node("security-headers", enabled));
        }
        if let Some(ref signatures) = self.bot_signatures {
            doc.nodes_mut().push(strings_node("bot-signatures", signatures));
        }
        if !self.extra_bot_signatures.is_empty() {
            doc.nodes_mut()
                .push(strings_node("extra-bot-signatures", &self.extra_bot_signatures));
        }

        doc
    }

    /// Load config from a KDL file.
    ///
    /// Returns an empty config if the file doesn't exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Other(format!("Failed to read {}: {}", path.display(), e)))?;
        let doc: KdlDocument = content.parse()?;
        let config = Self::from_kdl(&doc);
        config
            .validate()
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }
}

/// Default config file location: `~/.config/seogate/config.kdl`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("seogate").join("config.kdl"))
}

/// Get a string argument from a node's first entry.
fn get_string_arg(node: &KdlNode) -> Option<String> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_string())
        .map(|s| s.to_string())
}

/// Get every positional string argument of a node.
fn get_string_args(node: &KdlNode) -> Vec<String> {
    node.entries()
        .iter()
        .filter(|e| e.name().is_none())
        .filter_map(|e| e.value().as_string())
        .map(|s| s.to_string())
        .collect()
}

/// Get a boolean argument from a node's first entry.
fn get_bool_arg(node: &KdlNode) -> Option<bool> {
    node.entries().first().and_then(|e| e.value().as_bool())
}

/// Get a non-negative integer argument from a node's first entry.
fn get_u64_arg(node: &KdlNode) -> Option<u64> {
    node.entries()
        .first()
        .and_then(|e| e.value().as_integer())
        .and_then(|i| u64::try_from(i).ok())
}

fn string_node(name: &str, value: &str) -> KdlNode {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(KdlValue::String(value.to_string())));
    node
}

fn strings_node(name: &str, values: &[String]) -> KdlNode {
    let mut node = KdlNode::new(name);
    for value in values {
        node.push(KdlEntry::new(KdlValue::String(value.clone())));
    }
    node
}

fn bool_node(name: &str, value: bool) -> KdlNode {
    let mut node = KdlNode::new(name);
    node.push(KdlEntry::new(KdlValue::Bool(value)));
    node
}
