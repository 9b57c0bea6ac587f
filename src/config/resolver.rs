//! Precedence resolution for gate settings.
//!
//! ## Precedence (highest to lowest)
//!
//! 1. CLI flags (passed at runtime)
//! 2. Environment variables (`SEOGATE_BASE_URL`, `SUPABASE_URL`, `SUPABASE_KEY`)
//! 3. config.kdl (`~/.config/seogate/config.kdl` or `--config`)
//! 4. Built-in defaults
//!
//! Only the base URL and the data source endpoint/key can come from the
//! environment.

use serde::Serialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::config::schema::{
    DEFAULT_BASE_URL, DEFAULT_LISTEN, DEFAULT_STATIC_ROOT, DEFAULT_TEMPLATE_TTL_SECS,
    DEFAULT_TIMEOUT_MS, GateConfig,
};
use crate::gate::dispatch::DEFAULT_CACHE_CONTROL;
use crate::gate::resolver::SiteProfile;
use crate::gate::source::RestArticleSource;
use crate::models::LookupKey;
use crate::{Error, Result};

/// Environment variable overriding the base URL.
pub const BASE_URL_ENV: &str = "SEOGATE_BASE_URL";

/// Environment variable overriding the data source endpoint.
pub const DATA_ENDPOINT_ENV: &str = "SUPABASE_URL";

/// Environment variable overriding the data source API key.
pub const DATA_KEY_ENV: &str = "SUPABASE_KEY";

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Value from environment variable
    EnvVar(String),
    /// Value from config.kdl
    ConfigFile,
    /// Value from CLI flag
    CliFlag,
    /// Built-in default value
    Default,
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::ConfigFile => write!(f, "config"),
            ValueSource::CliFlag => write!(f, "cli"),
            ValueSource::Default => write!(f, "default"),
        }
    }
}

impl Serialize for ValueSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, Serialize)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// What answers requests that are not served a rendered document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "target")]
pub enum PassthroughTarget {
    /// Directory with the portal's built assets
    Static(PathBuf),
    /// Origin server URL
    Upstream(String),
}

impl std::fmt::Display for PassthroughTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassthroughTarget::Static(root) => write!(f, "static:{}", root.display()),
            PassthroughTarget::Upstream(origin) => write!(f, "upstream:{}", origin),
        }
    }
}

/// Data source settings after resolution.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedDataSource {
    pub endpoint: Option<Resolved<String>>,
    #[serde(skip)]
    pub api_key: Option<Resolved<String>>,
    pub table: String,
    pub lookup_key: LookupKey,
    pub timeout_ms: u64,
}

impl ResolvedDataSource {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Build the REST source, or `None` when no endpoint is configured.
    pub fn build(&self) -> Result<Option<RestArticleSource>> {
        let Some(ref endpoint) = self.endpoint else {
            return Ok(None);
        };
        let api_key = self.api_key.as_ref().map(|k| k.value.clone());
        RestArticleSource::new(endpoint.value.clone(), api_key, self.table.clone(), self.timeout())
            .map(Some)
    }

    /// The API key with the middle masked, for display.
    pub fn masked_api_key(&self) -> Option<String> {
        self.api_key.as_ref().map(|r| {
            let chars: Vec<char> = r.value.chars().collect();
            if chars.len() <= 12 {
                "****".to_string()
            } else {
                let head: String = chars[..4].iter().collect();
                let tail: String = chars[chars.len() - 4..].iter().collect();
                format!("{}...{}", head, tail)
            }
        })
    }
}

/// Fully resolved configuration with source tracking.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Config file that was consulted, if any
    pub config_path: Option<PathBuf>,
    pub listen: Resolved<SocketAddr>,
    pub base_url: Resolved<String>,
    #[serde(skip)]
    pub site: SiteProfile,
    pub data_source: ResolvedDataSource,
    pub passthrough: Resolved<PassthroughTarget>,
    /// Explicit template location; derived from the passthrough when unset
    pub template: Option<Resolved<String>>,
    pub template_ttl_secs: u64,
    pub cache_control: String,
    pub meta_headers: Resolved<bool>,
    pub security_headers: bool,
    /// Replacement bot catalog
    pub bot_signatures: Option<Vec<String>>,
    pub extra_bot_signatures: Vec<String>,
}

/// CLI overrides for configuration resolution.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub base_url: Option<String>,
    pub static_root: Option<PathBuf>,
    pub upstream: Option<String>,
    pub template: Option<String>,
    pub meta_headers: Option<bool>,
}

impl ConfigOverrides {
    /// Create empty overrides.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_upstream(mut self, upstream: impl Into<String>) -> Self {
        self.upstream = Some(upstream.into());
        self
    }

    pub fn with_static_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.static_root = Some(root.into());
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Pick the highest-precedence value among CLI flag, env var and config file.
fn pick(
    cli: Option<&String>,
    env_name: Option<&str>,
    file: Option<&String>,
) -> Option<Resolved<String>> {
    if let Some(value) = cli {
        return Some(Resolved::new(value.clone(), ValueSource::CliFlag));
    }
    if let Some(name) = env_name {
        if let Some(value) = env_var(name) {
            return Some(Resolved::new(value, ValueSource::EnvVar(name.to_string())));
        }
    }
    file.map(|value| Resolved::new(value.clone(), ValueSource::ConfigFile))
}

fn is_http_url(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"));
    matches!(rest, Some(host) if !host.is_empty() && !host.starts_with('/'))
}

/// Resolve configuration with full precedence chain.
///
/// Precedence (highest to lowest):
/// 1. CLI flags (from `overrides`)
/// 2. Environment variables
/// 3. config.kdl (`file`)
/// 4. Built-in defaults
pub fn resolve_config(
    file: &GateConfig,
    config_path: Option<PathBuf>,
    overrides: &ConfigOverrides,
) -> Result<ResolvedConfig> {
    // Resolve listen address
    let (listen_str, listen_source) = match file.listen {
        Some(ref listen) => (listen.as_str(), ValueSource::ConfigFile),
        None => (DEFAULT_LISTEN, ValueSource::Default),
    };
    let mut listen: SocketAddr = listen_str
        .parse()
        .map_err(|e| Error::InvalidConfig(format!("invalid listen address '{}': {}", listen_str, e)))?;
    let mut listen_source = listen_source;
    if let Some(ref host) = overrides.host {
        listen.set_ip(
            host.parse()
                .map_err(|e| Error::InvalidConfig(format!("invalid host '{}': {}", host, e)))?,
        );
        listen_source = ValueSource::CliFlag;
    }
    if let Some(port) = overrides.port {
        listen.set_port(port);
        listen_source = ValueSource::CliFlag;
    }

    // Resolve base URL
    let base_url = pick(
        overrides.base_url.as_ref(),
        Some(BASE_URL_ENV),
        file.base_url.as_ref(),
    )
    .unwrap_or_else(|| Resolved::new(DEFAULT_BASE_URL.to_string(), ValueSource::Default));
    if !is_http_url(&base_url.value) {
        return Err(Error::InvalidConfig(format!(
            "base URL must be an absolute http(s) URL, got '{}'",
            base_url.value
        )));
    }
    let base_url = Resolved::new(
        base_url.value.trim_end_matches('/').to_string(),
        base_url.source,
    );

    // Resolve site profile
    let defaults = SiteProfile::default();
    let site = SiteProfile {
        base_url: base_url.value.clone(),
        site_name: file.site_name.clone().unwrap_or(defaults.site_name),
        default_title: file.default_title.clone().unwrap_or(defaults.default_title),
        default_description: file
            .default_description
            .clone()
            .unwrap_or(defaults.default_description),
        default_image: file.default_image.clone().unwrap_or(defaults.default_image),
        default_keywords: file
            .default_keywords
            .clone()
            .unwrap_or(defaults.default_keywords),
        locale: file.locale.clone().unwrap_or(defaults.locale),
    };

    // Resolve data source
    let endpoint = pick(None, Some(DATA_ENDPOINT_ENV), file.data_source.endpoint.as_ref());
    if let Some(ref endpoint) = endpoint {
        if !is_http_url(&endpoint.value) {
            return Err(Error::InvalidConfig(format!(
                "data source endpoint must be an absolute http(s) URL, got '{}'",
                endpoint.value
            )));
        }
    }
    let timeout_ms = file.data_source.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
    if timeout_ms == 0 {
        return Err(Error::InvalidConfig(
            "data-source timeout-ms must be greater than 0".to_string(),
        ));
    }
    let data_source = ResolvedDataSource {
        endpoint,
        api_key: pick(None, Some(DATA_KEY_ENV), file.data_source.api_key.as_ref()),
        table: file
            .data_source
            .table
            .clone()
            .unwrap_or_else(|| RestArticleSource::DEFAULT_TABLE.to_string()),
        lookup_key: file.data_source.lookup_key.unwrap_or_default(),
        timeout_ms,
    };

    // Resolve passthrough: a CLI flag for either kind replaces the file's choice
    let passthrough = if let Some(ref root) = overrides.static_root {
        Resolved::new(PassthroughTarget::Static(root.clone()), ValueSource::CliFlag)
    } else if let Some(ref origin) = overrides.upstream {
        Resolved::new(PassthroughTarget::Upstream(origin.clone()), ValueSource::CliFlag)
    } else if file.static_root.is_some() && file.upstream.is_some() {
        return Err(Error::InvalidConfig(
            "static-root and upstream are mutually exclusive".to_string(),
        ));
    } else if let Some(ref root) = file.static_root {
        Resolved::new(PassthroughTarget::Static(root.clone()), ValueSource::ConfigFile)
    } else if let Some(ref origin) = file.upstream {
        Resolved::new(PassthroughTarget::Upstream(origin.clone()), ValueSource::ConfigFile)
    } else {
        Resolved::new(
            PassthroughTarget::Static(PathBuf::from(DEFAULT_STATIC_ROOT)),
            ValueSource::Default,
        )
    };
    if let PassthroughTarget::Upstream(ref origin) = passthrough.value {
        if !is_http_url(origin) {
            return Err(Error::InvalidConfig(format!(
                "upstream must be an absolute http(s) URL, got '{}'",
                origin
            )));
        }
    }

    // Resolve meta headers
    let meta_headers = match (overrides.meta_headers, file.meta_headers) {
        (Some(enabled), _) => Resolved::new(enabled, ValueSource::CliFlag),
        (None, Some(enabled)) => Resolved::new(enabled, ValueSource::ConfigFile),
        (None, None) => Resolved::new(false, ValueSource::Default),
    };

    Ok(ResolvedConfig {
        config_path,
        listen: Resolved::new(listen, listen_source),
        base_url,
        site,
        data_source,
        passthrough,
        template: pick(overrides.template.as_ref(), None, file.template.as_ref()),
        template_ttl_secs: file.template_ttl_secs.unwrap_or(DEFAULT_TEMPLATE_TTL_SECS),
        cache_control: file
            .cache_control
            .clone()
            .unwrap_or_else(|| DEFAULT_CACHE_CONTROL.to_string()),
        meta_headers,
        security_headers: file.security_headers.unwrap_or(true),
        bot_signatures: file.bot_signatures.clone(),
        extra_bot_signatures: file.extra_bot_signatures.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        unsafe {
            std::env::remove_var(BASE_URL_ENV);
            std::env::remove_var(DATA_ENDPOINT_ENV);
            std::env::remove_var(DATA_KEY_ENV);
        }
    }

    // ==================== ValueSource Tests ====================

    #[test]
    fn test_value_source_display() {
        assert_eq!(
            ValueSource::EnvVar("SUPABASE_URL".to_string()).to_string(),
            "env:SUPABASE_URL"
        );
        assert_eq!(ValueSource::ConfigFile.to_string(), "config");
        assert_eq!(ValueSource::CliFlag.to_string(), "cli");
        assert_eq!(ValueSource::Default.to_string(), "default");
    }

    // ==================== Default Resolution Tests ====================

    #[test]
    #[serial]
    fn test_resolve_defaults() {
        clear_env();
        let config = resolve_config(&GateConfig::new(), None, &ConfigOverrides::new()).unwrap();

        assert_eq!(config.listen.value, "127.0.0.1:3000".parse().unwrap());
        assert_eq!(config.listen.source, ValueSource::Default);
        assert_eq!(config.base_url.value, "https://brzi.info");
        assert_eq!(config.base_url.source, ValueSource::Default);
        assert_eq!(
            config.passthrough.value,
            PassthroughTarget::Static(PathBuf::from("./dist"))
        );
        assert!(config.data_source.endpoint.is_none());
        assert_eq!(config.data_source.timeout(), Duration::from_secs(3));
        assert_eq!(config.data_source.table, "articles");
        assert!(!config.meta_headers.value);
        assert!(config.security_headers);
        assert_eq!(config.cache_control, DEFAULT_CACHE_CONTROL);
        assert_eq!(config.site, SiteProfile::default());
    }

    // ==================== Precedence Tests ====================

    #[test]
    #[serial]
    fn test_env_overrides_file() {
        clear_env();
        unsafe {
            std::env::set_var(BASE_URL_ENV, "https://env.brzi.info/");
            std::env::set_var(DATA_ENDPOINT_ENV, "https://env.supabase.co");
            std::env::set_var(DATA_KEY_ENV, "env-key");
        }

        let file = GateConfig {
            base_url: Some("https://file.brzi.info".to_string()),
            ..Default::default()
        };
        let config = resolve_config(&file, None, &ConfigOverrides::new()).unwrap();

        assert_eq!(config.base_url.value, "https://env.brzi.info");
        assert_eq!(
            config.base_url.source,
            ValueSource::EnvVar(BASE_URL_ENV.to_string())
        );
        assert_eq!(config.site.base_url, "https://env.brzi.info");
        let endpoint = config.data_source.endpoint.as_ref().unwrap();
        assert_eq!(endpoint.value, "https://env.supabase.co");
        assert_eq!(config.data_source.api_key.as_ref().unwrap().value, "env-key");

        clear_env();
    }

    #[test]
    #[serial]
    fn test_cli_overrides_env_and_file() {
        clear_env();
        unsafe { std::env::set_var(BASE_URL_ENV, "https://env.brzi.info") };

        let file = GateConfig {
            listen: Some("0.0.0.0:8080".to_string()),
            upstream: Some("http://127.0.0.1:5173".to_string()),
            ..Default::default()
        };
        let overrides = ConfigOverrides::new()
            .with_base_url("https://cli.brzi.info")
            .with_port(9000)
            .with_static_root("./build");
        let config = resolve_config(&file, None, &overrides).unwrap();

        assert_eq!(config.base_url.value, "https://cli.brzi.info");
        assert_eq!(config.base_url.source, ValueSource::CliFlag);
        assert_eq!(config.listen.value, "0.0.0.0:9000".parse().unwrap());
        assert_eq!(config.listen.source, ValueSource::CliFlag);
        assert_eq!(
            config.passthrough.value,
            PassthroughTarget::Static(PathBuf::from("./build"))
        );

        clear_env();
    }

    #[test]
    #[serial]
    fn test_file_values_used() {
        clear_env();
        let file = GateConfig {
            site_name: Some("Brzi".to_string()),
            upstream: Some("http://127.0.0.1:5173".to_string()),
            meta_headers: Some(true),
            template_ttl_secs: Some(0),
            ..Default::default()
        };
        let config = resolve_config(&file, None, &ConfigOverrides::new()).unwrap();

        assert_eq!(config.site.site_name, "Brzi");
        assert_eq!(config.passthrough.source, ValueSource::ConfigFile);
        assert!(config.meta_headers.value);
        assert_eq!(config.template_ttl_secs, 0);
    }

    // ==================== Validation Tests ====================

    #[test]
    #[serial]
    fn test_relative_base_url_rejected() {
        clear_env();
        let overrides = ConfigOverrides::new().with_base_url("brzi.info");
        let err = resolve_config(&GateConfig::new(), None, &overrides).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    #[serial]
    fn test_exclusive_passthrough_rejected() {
        clear_env();
        let file = GateConfig {
            static_root: Some(PathBuf::from("./dist")),
            upstream: Some("http://127.0.0.1:5173".to_string()),
            ..Default::default()
        };
        assert!(resolve_config(&file, None, &ConfigOverrides::new()).is_err());
    }

    #[test]
    #[serial]
    fn test_bad_listen_rejected() {
        clear_env();
        let file = GateConfig {
            listen: Some("not-an-address".to_string()),
            ..Default::default()
        };
        assert!(resolve_config(&file, None, &ConfigOverrides::new()).is_err());
    }

    #[test]
    fn test_masked_api_key() {
        let source = ResolvedDataSource {
            endpoint: None,
            api_key: Some(Resolved::new(
                "eyJhbGciOiJIUzI1NiJ9.payload.sig".to_string(),
                ValueSource::ConfigFile,
            )),
            table: "articles".to_string(),
            lookup_key: LookupKey::Id,
            timeout_ms: 3000,
        };
        assert_eq!(source.masked_api_key().as_deref(), Some("eyJh....sig"));
    }
}
