use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::info;

use pricewatch::checker::{HttpPriceSource, PriceChecker};
use pricewatch::config::AppConfig;
use pricewatch::dispatcher::Dispatcher;
use pricewatch::fetcher::Fetcher;
use pricewatch::notify::EmailNotifier;
use pricewatch::store::SqliteStore;

/// Run one price check cycle over every tracked listing with verified
/// subscribers.
#[derive(Parser, Debug)]
#[command(name = "pricewatch", version)]
struct Cli {
    /// Listings loaded per database round-trip
    #[arg(long)]
    chunk_size: Option<u32>,

    /// Concurrent checks within the cycle
    #[arg(long)]
    max_concurrent: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pricewatch=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(chunk_size) = cli.chunk_size {
        config.dispatcher.chunk_size = chunk_size;
    }
    if let Some(max_concurrent) = cli.max_concurrent {
        config.dispatcher.max_concurrent_checks = max_concurrent;
    }
    config.validate()?;

    info!("Starting pricewatch...");

    let pool = SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .acquire_timeout(Duration::from_secs(config.database.acquire_timeout))
        .connect(&config.database.url)
        .await?;
    SqliteStore::init_schema(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool));

    let source = Arc::new(HttpPriceSource::new(Fetcher::new(config.fetcher.clone())));
    let notifier = Arc::new(EmailNotifier::new(config.smtp.clone()));
    let checker = Arc::new(PriceChecker::new(
        source,
        store.clone(),
        store.clone(),
        notifier,
    ));
    let dispatcher = Dispatcher::new(checker, store, config.dispatcher.clone());

    let summary = dispatcher.run_cycle().await?;
    info!(
        "Done: {} checked, {} changed, {} failed",
        summary.checked, summary.changed, summary.failed
    );

    Ok(())
}
