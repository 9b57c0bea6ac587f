//! Command implementations for the seogate CLI.
//!
//! Each command returns a result type implementing [`CommandResult`] so the
//! binary can print it as JSON (default) or human-readable text (`-H`).
//! The gate itself is assembled here from a [`ResolvedConfig`].

use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::{GateConfig, PassthroughTarget, ResolvedConfig};
use crate::{Error, Result};
use crate::gate::{
    BotCatalog, DispatchPolicy, Gate, MetadataResolver, Passthrough, RestArticleSource, StaticSite,
    Strategy, TemplateCache, TemplateInjector, TemplateLoader, TemplateSource, UpstreamOrigin,
    start_server,
};
use crate::gate::template::http_client;
use crate::models::{AgentClass, PageMetadata};

/// Timeout for proxied passthrough requests.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(30);

/// Command results that can be serialized to JSON or formatted for humans.
pub trait CommandResult {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

fn json_of<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_else(|e| format!(r#"{{"error": "serialization failed: {}"}}"#, e))
}

// ==================== Gate Assembly ====================

/// Bot catalog: the configured replacement (or the built-in one) plus extras.
pub fn build_catalog(config: &ResolvedConfig) -> BotCatalog {
    let mut catalog = match config.bot_signatures {
        Some(ref signatures) => BotCatalog::with_signatures(signatures.iter().map(String::as_str)),
        None => BotCatalog::default(),
    };
    catalog.extend(config.extra_bot_signatures.iter().map(String::as_str));
    catalog
}

pub fn build_resolver(config: &ResolvedConfig) -> MetadataResolver {
    MetadataResolver::new(config.site.clone())
        .with_lookup_key(config.data_source.lookup_key)
        .with_timeout(config.data_source.timeout())
}

/// Where the template comes from: explicit setting, else next to the passthrough.
pub fn template_source(config: &ResolvedConfig) -> TemplateSource {
    if let Some(ref template) = config.template {
        let value = &template.value;
        if value.starts_with("http://") || value.starts_with("https://") {
            return TemplateSource::Http(value.clone());
        }
        return TemplateSource::File(value.into());
    }
    match config.passthrough.value {
        PassthroughTarget::Static(ref root) => TemplateSource::File(root.join("index.html")),
        PassthroughTarget::Upstream(ref origin) => {
            TemplateSource::Http(format!("{}/index.html", origin.trim_end_matches('/')))
        }
    }
}

pub fn build_template_loader(config: &ResolvedConfig) -> Result<TemplateLoader> {
    let client = http_client(config.data_source.timeout())?;
    let loader = TemplateLoader::new(template_source(config), client);
    Ok(match config.template_ttl_secs {
        0 => loader,
        secs => loader.with_cache(Arc::new(TemplateCache::new(Duration::from_secs(secs)))),
    })
}

pub fn build_passthrough(config: &ResolvedConfig) -> Result<Passthrough> {
    Ok(match config.passthrough.value {
        PassthroughTarget::Static(ref root) => Passthrough::Static(StaticSite::new(root.clone())),
        PassthroughTarget::Upstream(ref origin) => {
            Passthrough::Upstream(UpstreamOrigin::new(origin.clone(), UPSTREAM_TIMEOUT)?)
        }
    })
}

fn build_injector(config: &ResolvedConfig) -> TemplateInjector {
    TemplateInjector::new(config.site.site_name.clone(), config.site.locale.clone())
}

/// Assemble the full gate described by `config`.
pub fn build_gate(config: &ResolvedConfig) -> Result<Gate<Option<RestArticleSource>>> {
    Ok(Gate::new(
        build_resolver(config),
        build_template_loader(config)?,
        build_passthrough(config)?,
        config.data_source.build()?,
    )
    .with_catalog(build_catalog(config))
    .with_policy(DispatchPolicy::new(&config.cache_control)?)
    .with_meta_headers(config.meta_headers.value)
    .with_security_headers(config.security_headers))
}

// ==================== serve ====================

/// Run the gate until Ctrl+C.
pub async fn serve(config: &ResolvedConfig) -> Result<()> {
    let gate = build_gate(config)?;
    info!(
        base_url = %config.base_url.value,
        passthrough = %config.passthrough.value,
        data_source = config.data_source.endpoint.as_ref().map(|e| e.value.as_str()).unwrap_or("none"),
        "starting gate"
    );
    start_server(gate, config.listen.value).await
}

// ==================== classify ====================

#[derive(Debug, Serialize)]
pub struct ClassifyResult {
    pub user_agent: String,
    pub class: AgentClass,
}

impl CommandResult for ClassifyResult {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        self.class.to_string()
    }
}

pub fn classify(config: &ResolvedConfig, user_agent: &str) -> ClassifyResult {
    ClassifyResult {
        user_agent: user_agent.to_string(),
        class: build_catalog(config).classify(user_agent),
    }
}

// ==================== meta ====================

#[derive(Debug, Serialize)]
pub struct MetaResult {
    pub path: String,
    #[serde(flatten)]
    pub metadata: PageMetadata,
}

impl CommandResult for MetaResult {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        let m = &self.metadata;
        let mut lines = vec![
            format!("Path:         {}", self.path),
            format!("Title:        {}", m.title),
            format!("Description:  {}", m.description),
            format!("Image:        {}", m.image),
            format!("Type:         {}", m.content_type),
            format!("Canonical:    {}", m.canonical_url),
        ];
        if !m.keywords.is_empty() {
            lines.push(format!("Keywords:     {}", m.keywords_joined()));
        }
        lines.join("\n")
    }
}

pub async fn meta(config: &ResolvedConfig, path: &str) -> Result<MetaResult> {
    let source = config.data_source.build()?;
    let metadata = build_resolver(config).resolve(path, &source).await;
    Ok(MetaResult {
        path: path.to_string(),
        metadata,
    })
}

// ==================== render ====================

#[derive(Debug, Serialize)]
pub struct RenderResult {
    pub path: String,
    pub template: String,
    pub strategy: &'static str,
    pub canonical_url: String,
    pub html: String,
}

impl CommandResult for RenderResult {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        self.html.clone()
    }
}

pub async fn render(config: &ResolvedConfig, path: &str) -> Result<RenderResult> {
    let loader = TemplateLoader::new(template_source(config), http_client(config.data_source.timeout())?);
    let template = loader.load().await?;

    let source = config.data_source.build()?;
    let metadata = build_resolver(config).resolve(path, &source).await;
    let document = build_injector(config).inject(&template, &metadata);

    let strategy = match Strategy::for_template(&template) {
        Strategy::Placeholder => "placeholder",
        Strategy::Structural => "structural",
    };
    Ok(RenderResult {
        path: path.to_string(),
        template: loader.source().describe(),
        strategy,
        canonical_url: document.canonical_url,
        html: document.html,
    })
}

// ==================== config show ====================

#[derive(Debug, Serialize)]
pub struct ConfigShowResult {
    #[serde(flatten)]
    pub config: ResolvedConfig,
    pub api_key: Option<String>,
    pub template_source: String,
    pub bot_catalog_size: usize,
}

impl CommandResult for ConfigShowResult {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        let c = &self.config;
        let mut lines = Vec::new();
        match c.config_path {
            Some(ref path) => lines.push(format!("Config file:       {}", path.display())),
            None => lines.push("Config file:       (none)".to_string()),
        }
        lines.push(format!("Listen:            {} [{}]", c.listen.value, c.listen.source));
        lines.push(format!("Base URL:          {} [{}]", c.base_url.value, c.base_url.source));
        lines.push(format!("Site name:         {}", c.site.site_name));
        lines.push(format!(
            "Passthrough:       {} [{}]",
            c.passthrough.value, c.passthrough.source
        ));
        lines.push(format!("Template:          {}", self.template_source));
        lines.push(format!("Template TTL:      {}s", c.template_ttl_secs));
        match c.data_source.endpoint {
            Some(ref endpoint) => lines.push(format!(
                "Data source:       {} [{}]",
                endpoint.value, endpoint.source
            )),
            None => lines.push("Data source:       (none, article lookups disabled)".to_string()),
        }
        if let Some(ref key) = self.api_key {
            lines.push(format!("API key:           {}", key));
        }
        lines.push(format!(
            "Lookup:            {} in '{}', timeout {} ms",
            c.data_source.lookup_key, c.data_source.table, c.data_source.timeout_ms
        ));
        lines.push(format!("Cache-Control:     {}", c.cache_control));
        lines.push(format!(
            "Meta headers:      {} [{}]",
            c.meta_headers.value, c.meta_headers.source
        ));
        lines.push(format!("Security headers:  {}", c.security_headers));
        lines.push(format!("Bot signatures:    {}", self.bot_catalog_size));
        lines.join("\n")
    }
}

pub fn config_show(config: &ResolvedConfig) -> ConfigShowResult {
    ConfigShowResult {
        api_key: config.data_source.masked_api_key(),
        template_source: template_source(config).describe(),
        bot_catalog_size: build_catalog(config).signatures().len(),
        config: config.clone(),
    }
}

// ==================== config init ====================

#[derive(Debug, Serialize)]
pub struct ConfigInitResult {
    pub path: PathBuf,
    pub overwritten: bool,
}

impl CommandResult for ConfigInitResult {
    fn to_json(&self) -> String {
        json_of(self)
    }

    fn to_human(&self) -> String {
        if self.overwritten {
            format!("Overwrote {} with the default configuration", self.path.display())
        } else {
            format!("Wrote default configuration to {}", self.path.display())
        }
    }
}

/// Write a starter config.kdl to `path`. An existing file is kept unless `force`.
pub fn config_init(path: &Path, force: bool) -> Result<ConfigInitResult> {
    let exists = path.exists();
    if exists && !force {
        return Err(Error::InvalidConfig(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut doc = GateConfig::starter().to_kdl();
    doc.autoformat();
    std::fs::write(path, doc.to_string())?;

    info!(path = %path.display(), "wrote starter config");
    Ok(ConfigInitResult {
        path: path.to_path_buf(),
        overwritten: exists,
    })
}
