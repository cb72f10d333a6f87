use allet_scraper::config::Config;
use allet_scraper::constants::{self, get_supported_sources};
use allet_scraper::error::ScraperError;
use allet_scraper::fetch::{FetchClient, ReqwestFetchClient};
use allet_scraper::logging;
use allet_scraper::orchestrator::{Orchestrator, RunSummary};
use allet_scraper::scrapers::Scraper;
use allet_scraper::sqlite::SqliteStorage;
use allet_scraper::storage::{InMemoryStorage, Storage};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "allet_scraper")]
#[command(about = "Opera house and tour schedule scraper")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, default_value = "allet.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scrape sources and upsert what they return
    Run {
        /// Specific sources to run (comma-separated). Defaults to every enabled source
        #[arg(long)]
        sources: Option<String>,
    },
    /// List the supported sources and whether they are enabled
    Sources,
    /// Merge duplicate productions in the SQLite store onto one key
    Reconcile,
}

fn print_summary(summary: &RunSummary) {
    println!("\n📊 Results for {}:", summary.source);
    println!("   Productions: {}", summary.productions);
    println!("   New: {}", summary.new);
    println!("   Updated: {}", summary.updated);
    println!("   Shows: {}", summary.shows);
    println!("   Errors: {}", summary.errors.len());
    if !summary.errors.is_empty() {
        println!("\n⚠️  Errors encountered:");
        for error in &summary.errors {
            println!("   - {}", error);
        }
    }
}

fn open_storage(config: &Config) -> anyhow::Result<Arc<dyn Storage>> {
    match &config.storage.database_path {
        Some(path) => {
            let store = SqliteStorage::open(path)
                .with_context(|| format!("failed to open database {}", path))?;
            Ok(Arc::new(store))
        }
        None => {
            warn!("No database_path configured, results are kept in memory only");
            Ok(Arc::new(InMemoryStorage::new()))
        }
    }
}

async fn run(config: &Config, sources: Option<String>) -> anyhow::Result<()> {
    let storage = open_storage(config)?;
    let client: Arc<dyn FetchClient> = Arc::new(ReqwestFetchClient::from_config(config)?);

    let scrapers = match &sources {
        Some(list) => list
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| Scraper::from_config(&constants::source_alias_to_name(s), config, client.clone()))
            .collect::<Result<Vec<_>, _>>()?,
        None => Scraper::all_from_config(config, client),
    };
    if scrapers.is_empty() {
        warn!("No sources enabled, nothing to do");
        return Ok(());
    }

    let orchestrator = Orchestrator::new(storage.clone(), scrapers);

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current step");
            ctrl_c.cancel();
        }
    });

    println!("🚀 Running sources: {}", orchestrator.source_names().join(", "));
    match orchestrator.run_all(&cancel).await {
        Ok(summaries) => {
            for summary in &summaries {
                print_summary(summary);
            }
            let counts = storage.counts().await?;
            info!(
                "Store holds {} productions, {} venues, {} shows",
                counts.productions, counts.venues, counts.shows
            );
            println!("✅ Run completed");
            Ok(())
        }
        Err(ScraperError::Cancelled) => {
            println!("⏹️  Run cancelled");
            Ok(())
        }
        Err(e) => {
            error!("Run failed: {}", e);
            Err(e.into())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config))?;
    logging::init_logging(&config.logging.directory);

    match cli.command {
        Commands::Run { sources } => run(&config, sources).await?,
        Commands::Sources => {
            let enabled: Vec<&str> = Scraper::all_from_config(
                &config,
                Arc::new(ReqwestFetchClient::from_config(&config)?),
            )
            .iter()
            .map(Scraper::source_name)
            .collect();
            for source in get_supported_sources() {
                let marker = if enabled.contains(&source) { "enabled" } else { "disabled" };
                println!("{:<24} {}", source, marker);
            }
        }
        Commands::Reconcile => {
            let path = config
                .storage
                .database_path
                .as_deref()
                .context("reconcile needs storage.database_path")?;
            let store = SqliteStorage::open(path)?;
            let report = store.opened_with();
            if report.is_noop() {
                println!("✅ Nothing to reconcile");
            } else {
                println!("{}", serde_json::to_string_pretty(report)?);
            }
        }
    }
    Ok(())
}
