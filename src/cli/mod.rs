//! CLI argument definitions for seogate.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::logging::LogFormat;

/// seogate - serve crawler-ready metadata for a client-rendered news portal.
///
/// Run `seogate serve` in front of the portal; the other commands inspect
/// what a crawler would be served.
#[derive(Parser, Debug)]
#[command(name = "seogate")]
#[command(author, version = crate::VERSION, about = "Bot-aware SEO rendering gate", long_about = None)]
pub struct Cli {
    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    /// Config file (default: ~/.config/seogate/config.kdl)
    #[arg(long = "config", global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log line format (logs go to stderr; verbosity via RUST_LOG)
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the gate in front of the portal until Ctrl+C
    Serve(ServeArgs),

    /// Classify a User-Agent string as bot or human
    Classify {
        /// Raw User-Agent header value (may be empty)
        user_agent: String,
    },

    /// Resolve the metadata a crawler would get for a path
    Meta {
        /// Request path, e.g. /sport/utakmica-123
        path: String,

        /// Override the portal base URL
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Render the document a crawler would get for a path
    Render {
        /// Request path, e.g. /sport/utakmica-123
        path: String,

        /// Template file or URL (default: derived from the passthrough)
        #[arg(long)]
        template: Option<String>,

        /// Override the portal base URL
        #[arg(long)]
        base_url: Option<String>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

/// Arguments for `seogate serve`
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Host address to bind to (default: 127.0.0.1, use 0.0.0.0 for network access)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (default: 3000)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Portal base URL used for canonical and image URLs
    #[arg(long)]
    pub base_url: Option<String>,

    /// Serve the portal's built assets from this directory
    #[arg(long, conflicts_with = "upstream")]
    pub static_root: Option<PathBuf>,

    /// Proxy non-rendered requests to this origin
    #[arg(long)]
    pub upstream: Option<String>,

    /// Template file or URL (default: derived from the passthrough)
    #[arg(long)]
    pub template: Option<String>,

    /// Mirror metadata as X-Meta-* headers on passthrough responses
    #[arg(long)]
    pub meta_headers: bool,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the effective configuration and where each value came from
    Show,

    /// Write a config.kdl with every default spelled out
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}
