//! pkgcache - on-demand package tarball cache
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use pkgcache::cli::{Cli, Commands};
use pkgcache::config::{Config, ConfigManager};
use pkgcache::error::PkgcacheResult;
use pkgcache::{ui, PackageCache};
use std::process::ExitCode;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            if let Some(hint) = e.hint() {
                eprintln!("{} {}", style("Hint:").yellow(), hint);
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> PkgcacheResult<()> {
    let cli = Cli::parse();

    let config_manager = match cli.config {
        Some(ref path) => ConfigManager::with_path(path.clone()),
        None => ConfigManager::new(),
    };
    let config = config_manager.load().await?;

    init_logging(cli.verbose, &config);
    ui::init_theme();
    debug!("Using config file {}", config_manager.path().display());

    if let Commands::Config(args) = cli.command {
        return pkgcache::cli::commands::config(args, &config_manager, &config).await;
    }

    let mut cache = PackageCache::from_config(&config);
    if let Some(dir) = cli.cache_dir {
        cache = cache.with_root(dir);
    }
    debug!("Cache root {}", cache.root().display());

    match cli.command {
        Commands::Fetch(args) => pkgcache::cli::commands::fetch(args, &cache).await,
        Commands::Path(args) => pkgcache::cli::commands::path(args, &cache).await,
        Commands::List(args) => pkgcache::cli::commands::list(args, &cache).await,
        Commands::Config(_) => unreachable!("Config handled above"),
    }
}

/// 0 = warn, 1 = info, 2+ = debug. `RUST_LOG` wins when set.
fn init_logging(verbose: u8, config: &Config) {
    let default = match verbose {
        0 => "pkgcache=warn",
        1 => "pkgcache=info",
        _ => "pkgcache=debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.without_time().init();
    }
}
