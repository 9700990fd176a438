use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

use creatorfeed_aggregator::{router, AggregateOptions, Aggregator};
use creatorfeed_common::{Config, FeedError, Source};

#[derive(Parser)]
#[command(name = "creatorfeed", about = "Aggregate recent posts from followed creators")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch every source in a JSON list and print the merged feed
    Aggregate {
        /// JSON array of sources (`id`, `url`, `name`, `platform`, `pinned`, `addedAt`)
        #[arg(long)]
        sources: PathBuf,

        /// Ignore cached results
        #[arg(long)]
        refresh: bool,
    },

    /// Resolve a URL and show its newest post
    Preview {
        url: String,

        /// Display name (defaults to one derived from the URL)
        #[arg(long)]
        name: Option<String>,
    },

    /// Show how a URL is recognized
    Resolve { url: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = match "creatorfeed=info".parse::<Directive>() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => EnvFilter::from_default_env(),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<FeedError>() {
            Some(FeedError::NothingFetched { sources }) => {
                eprintln!("Nothing fetched from {sources} source(s)");
                ExitCode::from(2)
            }
            _ => {
                eprintln!("Error: {e:#}");
                ExitCode::from(1)
            }
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Aggregate { sources, refresh } => cmd_aggregate(sources, refresh).await,
        Commands::Preview { url, name } => cmd_preview(url, name).await,
        Commands::Resolve { url } => cmd_resolve(&url),
    }
}

fn build_aggregator() -> Result<Aggregator> {
    let config = Config::from_env();
    let settings = config.settings()?;
    Ok(Aggregator::from_config_in_memory(&config, settings)?)
}

async fn cmd_aggregate(path: PathBuf, refresh: bool) -> Result<()> {
    let raw = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read sources file: {}", path.display()))?;
    let sources: Vec<Source> = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse sources file: {}", path.display()))?;
    info!(count = sources.len(), path = %path.display(), "Loaded sources");

    let aggregator = build_aggregator()?;
    let snapshot = aggregator
        .aggregate(
            &sources,
            AggregateOptions {
                force_refresh: refresh,
            },
        )
        .await?;

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

async fn cmd_preview(url: String, name: Option<String>) -> Result<()> {
    let resolved = router::resolve(&url)?;
    let name = name.unwrap_or_else(|| router::suggested_name(&resolved));
    let source = Source::new("preview", resolved.normalized_url.clone(), name, resolved.platform);

    let aggregator = build_aggregator()?;
    let item = aggregator.aggregate_one(&source).await?;

    let out = json!({
        "source": source,
        "item": item,
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn cmd_resolve(url: &str) -> Result<()> {
    let resolved = router::resolve(url)?;
    let out = json!({
        "platform": resolved.platform,
        "identity": resolved.identity,
        "normalizedUrl": resolved.normalized_url,
        "suggestedName": router::suggested_name(&resolved),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}
