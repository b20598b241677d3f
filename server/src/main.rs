//! Torgi Server - procurement record store and auction notifier.
//!
//! Usage: `torgi-server [BATCH.json ...]`. Every batch file given is upserted
//! on startup; the process then keeps notifying about today's auctions until
//! interrupted.

use torgi_server::scheduler::LogNotifier;
use torgi_server::{db, Config, QueryEngine, Scheduler, SyncEngine};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "torgi_server=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // Create database pool
    let pool = db::create_pool(&config.database_url, config.max_connections).await?;

    // Run migrations
    tracing::info!("Running database migrations...");
    db::run_migrations(&pool).await?;

    let mut sync = SyncEngine::new(pool.clone());
    sync.purge_stale(config.retention_months).await?;

    let scheduler = match config.notification_destination {
        Some(destination) => {
            let source = QueryEngine::new(pool.clone());
            let scheduler = Scheduler::new(source, LogNotifier, destination, config.timing);
            Some(scheduler.spawn(config.reload_grace))
        }
        None => {
            tracing::info!("NOTIFICATION_DESTINATION not set, auction notifier disabled");
            None
        }
    };

    for path in std::env::args().skip(1) {
        let payload = tokio::fs::read(&path).await?;
        match sync.upsert(&payload).await {
            Ok(rows) => {
                tracing::info!(path = %path, rows, "batch loaded");
                if let Some(handle) = &scheduler {
                    handle.changes().data_changed();
                }
            }
            Err(e) => tracing::error!(path = %path, "failed to load batch: {}", e),
        }
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    if let Some(handle) = scheduler {
        handle.stop().await?;
    }

    Ok(())
}
