//! huginn operator CLI.
//!
//! Inspects configuration and the persisted cache snapshots of a huginn
//! deployment.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use huginn::cache::CacheManager;
use huginn::config::Config;

/// Huginn operator CLI
#[derive(Parser)]
#[command(name = "huginn")]
#[command(version = huginn::PKG_VERSION)]
#[command(about = "Batch analysis coordinator and cache tools")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "HUGINN_CONFIG")]
    config: Option<PathBuf>,

    /// Snapshot directory (overrides configuration).
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the effective configuration and any warnings
    Config,

    /// Show statistics for every persisted cache
    CacheStats,

    /// Remove expired entries from every persisted cache
    Cleanup,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    match args.command {
        Command::Config => {
            println!("# huginn {}", huginn::version_string());
            print!("{}", toml::to_string_pretty(&config)?);
            for warning in config.warnings() {
                eprintln!("warning: {warning}");
            }
        }
        Command::CacheStats => {
            let manager = CacheManager::new(config.cache);
            let names = manager.discover_persisted()?;
            if names.is_empty() {
                println!(
                    "no cache snapshots in {}",
                    manager.settings().resolved_persistence_dir().display()
                );
                return Ok(());
            }
            println!("{}", serde_json::to_string_pretty(&manager.aggregate_stats())?);
        }
        Command::Cleanup => {
            let manager = CacheManager::new(config.cache);
            manager.discover_persisted()?;
            let removed = manager.cleanup_all_expired();
            manager.shutdown();

            let total: usize = removed.values().sum();
            for (name, count) in &removed {
                println!("{name}: {count}");
            }
            println!("removed {total} expired entries across {} caches", removed.len());
        }
    }

    Ok(())
}

/// Explicit file if given, else the standard locations, else defaults; then
/// `HUGINN_*` overrides and `--cache-dir`.
fn load_config(args: &Args) -> huginn::Result<Config> {
    let mut config = Config::load_or_default(args.config.as_deref())?;
    config.apply_env()?;
    if let Some(ref dir) = args.cache_dir {
        config.cache.persistence_dir = Some(dir.clone());
    }
    Ok(config)
}
