//! seogate CLI - bot-aware SEO rendering gate.

use clap::Parser;
use seogate::cli::{Cli, Commands, ConfigCommands, ServeArgs};
use seogate::commands::{self, CommandResult};
use seogate::config::{ConfigOverrides, GateConfig, ResolvedConfig, default_config_path, resolve_config};
use seogate::{Error, Result, logging};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process;

fn main() {
    let cli = Cli::parse();
    let human = cli.human_readable;

    // Logging goes to stderr; keep the guard until exit so buffered lines flush
    let _guard = match logging::init(cli.log_format) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: {}", e);
            None
        }
    };

    if let Err(e) = run_command(cli, human) {
        if human {
            eprintln!("Error: {}", e);
        } else {
            eprintln!("{}", serde_json::json!({ "error": e.to_string() }));
        }
        process::exit(1);
    }
}

fn run_command(cli: Cli, human: bool) -> Result<()> {
    let explicit = cli.config.as_deref();

    match cli.command {
        Commands::Serve(args) => {
            let (file, config_path) = load_config_file(explicit)?;
            let config = resolve_config(&file, config_path, &serve_overrides(args))?;
            block_on(commands::serve(&config))
        }
        Commands::Classify { user_agent } => {
            let config = resolve(explicit, None)?;
            output(&commands::classify(&config, &user_agent), human);
            Ok(())
        }
        Commands::Meta { path, base_url } => {
            let config = resolve(explicit, base_url)?;
            let result = block_on(commands::meta(&config, &path))?;
            output(&result, human);
            Ok(())
        }
        Commands::Render {
            path,
            template,
            base_url,
        } => {
            let (file, config_path) = load_config_file(explicit)?;
            let mut overrides = ConfigOverrides::new();
            overrides.base_url = base_url;
            overrides.template = template;
            let config = resolve_config(&file, config_path, &overrides)?;
            let result = block_on(commands::render(&config, &path))?;
            output(&result, human);
            Ok(())
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => {
                let config = resolve(explicit, None)?;
                output(&commands::config_show(&config), human);
                Ok(())
            }
            // Writes the file the other commands read, so it must not require one
            ConfigCommands::Init { force } => {
                let path = match explicit {
                    Some(path) => path.to_path_buf(),
                    None => default_config_path().ok_or_else(|| {
                        Error::Other("Could not determine config directory".to_string())
                    })?,
                };
                output(&commands::config_init(&path, force)?, human);
                Ok(())
            }
        },
    }
}

/// Load config.kdl: `--config` must exist, the default location may be absent.
fn load_config_file(explicit: Option<&Path>) -> Result<(GateConfig, Option<PathBuf>)> {
    if let Some(path) = explicit {
        if !path.exists() {
            return Err(Error::InvalidConfig(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        return Ok((GateConfig::load(path)?, Some(path.to_path_buf())));
    }

    match default_config_path() {
        Some(path) if path.exists() => Ok((GateConfig::load(&path)?, Some(path))),
        _ => Ok((GateConfig::new(), None)),
    }
}

fn resolve(explicit: Option<&Path>, base_url: Option<String>) -> Result<ResolvedConfig> {
    let (file, config_path) = load_config_file(explicit)?;
    let mut overrides = ConfigOverrides::new();
    overrides.base_url = base_url;
    resolve_config(&file, config_path, &overrides)
}

fn serve_overrides(args: ServeArgs) -> ConfigOverrides {
    ConfigOverrides {
        host: args.host,
        port: args.port,
        base_url: args.base_url,
        static_root: args.static_root,
        upstream: args.upstream,
        template: args.template,
        meta_headers: args.meta_headers.then_some(true),
    }
}

fn block_on<F: Future<Output = Result<T>>, T>(future: F) -> Result<T> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Other(format!("Failed to create runtime: {}", e)))?
        .block_on(future)
}

/// Print a command result as JSON or human-readable text.
fn output<T: CommandResult>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
