//! Configuration for seogate.
//!
//! ## config.kdl
//!
//! Located at `~/.config/seogate/config.kdl` unless `--config` names another
//! file. A missing file is not an error; every value has a default.
//!
//! Contains:
//! - `listen` - Address the gate binds to
//! - `base-url` - Absolute portal URL used for canonical and image URLs
//! - Site branding (`site-name`, `default-title`, `default-description`,
//!   `default-image`, `default-keywords`, `locale`)
//! - `data-source` block - Article lookup endpoint, key, table and timeout
//! - `static-root` or `upstream` - What serves non-rendered requests
//! - `template`, `template-ttl-secs` - Base HTML shell and its cache TTL
//! - `cache-control`, `meta-headers`, `security-headers` - Response headers
//! - `bot-signatures`, `extra-bot-signatures` - Bot catalog
//!
//! ## Precedence
//!
//! CLI flag > environment variable > config.kdl > defaults
//!
//! Use the [`resolver`] module for precedence resolution.

pub mod resolver;
pub mod schema;

pub use resolver::{
    BASE_URL_ENV, ConfigOverrides, DATA_ENDPOINT_ENV, DATA_KEY_ENV, PassthroughTarget, Resolved,
    ResolvedConfig, ResolvedDataSource, ValueSource, resolve_config,
};
pub use schema::{DataSourceConfig, GateConfig, default_config_path};
