use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rss_aggregator::config::Config;
use rss_aggregator::db::Database;
use rss_aggregator::fetcher::Fetcher;
use rss_aggregator::refresh::RefreshWorker;
use rss_aggregator::scheduler::Scheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rss_aggregator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("FEEDS_CONFIG").unwrap_or_else(|_| "feeds.toml".to_string());
    let config = Config::load(&config_path)?;
    info!("Loaded {} feeds from {}", config.feeds.len(), config_path);

    // Initialize database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:rss_aggregator.db?mode=rwc".to_string());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    db.sync_feeds(&config.feeds).await?;
    info!("Database initialized");

    let db = Arc::new(db);

    let fetcher = Fetcher::new(config.fetch_timeout(), &config.user_agent)?;
    let worker = Arc::new(RefreshWorker::new(db.clone(), fetcher));
    let scheduler = Scheduler::new(db, worker, config.concurrency, config.refresh_interval());

    let (stop_tx, stop_rx) = watch::channel(false);
    let scheduler_task = tokio::spawn(scheduler.run(stop_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, waiting for the current batch to finish");
    let _ = stop_tx.send(true);
    scheduler_task.await?;

    Ok(())
}
