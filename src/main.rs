use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ann_news::cache::SnapshotCache;
use ann_news::config::{Config, LoggingConfig};
use ann_news::crawler::build_fetcher;
use ann_news::parser::ListingExtractor;
use ann_news::refresh::{RefreshPolicy, Refresher};
use ann_news::server::NewsServer;

#[derive(Parser)]
#[command(
    name = "ann-news",
    version,
    about = "Anime News Network headline scraper with a cached JSON API",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json); overrides the configured format
    #[arg(long, global = true)]
    log_format: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the news API
    Serve {
        /// Bind address, e.g. 127.0.0.1:3000
        #[arg(short, long)]
        bind: Option<SocketAddr>,
    },

    /// Fetch and extract the listing once, printing JSON
    Scrape,

    /// Print the resolved configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;

    // Initialize tracing/logging
    setup_tracing(&config.logging, cli.log_format.as_deref(), cli.verbose)?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.server.bind_address = bind;
            }
            tracing::info!(bind = %config.server.bind_address, "Starting serve command");
            serve(config).await?;
        }

        Commands::Scrape => {
            tracing::info!(url = %config.listing_url()?, "Starting scrape command");
            scrape(config).await?;
        }

        Commands::Config => {
            let text = toml::to_string_pretty(&config).context("Failed to render config")?;
            println!("{text}");
        }
    }

    Ok(())
}

fn setup_tracing(logging: &LoggingConfig, format: Option<&str>, verbose: bool) -> Result<()> {
    // RUST_LOG wins over both the config level and --verbose
    let env_filter = match std::env::var("RUST_LOG") {
        Ok(directives) => tracing_subscriber::EnvFilter::try_new(directives)?,
        Err(_) if verbose => tracing_subscriber::EnvFilter::new("ann_news=debug,info"),
        Err(_) => tracing_subscriber::EnvFilter::try_new(format!(
            "ann_news={level},tower_http={level},warn",
            level = logging.level
        ))
        .context("Invalid log level")?,
    };

    // Logs go to stderr so `scrape` and `config` output stays machine-readable
    match format.unwrap_or(logging.format.as_str()) {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .init();
        }
    }

    Ok(())
}

async fn serve(config: Config) -> Result<()> {
    if let Err(e) = ann_news::metrics::init_metrics() {
        tracing::warn!(error = %e, "Metrics initialization failed, continuing without metrics");
    }

    let server = NewsServer::new(&config)?;
    println!("{}", server.info().display());
    println!();

    server.start_with_shutdown(shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Shutdown signal received, stopping..."),
        Err(e) => tracing::error!("Failed to wait for Ctrl+C: {}", e),
    }
}

async fn scrape(config: Config) -> Result<()> {
    let fetcher = build_fetcher(&config)?;
    let extractor = ListingExtractor::new(&config.extractor, &config.source.base_url)?;
    let refresher = Refresher::new(
        fetcher,
        Arc::new(extractor),
        Arc::new(SnapshotCache::new()),
        RefreshPolicy::from_config(&config),
    );

    let records = refresher
        .fetch_records()
        .await
        .context("Failed to scrape listing")?;

    tracing::info!(records = records.len(), "Scrape complete");
    println!("{}", serde_json::to_string_pretty(&records)?);
    Ok(())
}
