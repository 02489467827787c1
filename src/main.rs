use anyhow::Result;
use tracing::info;
use std::sync::Arc;

use limit_service::clock::SystemClock;
use limit_service::config::{self, StoreConfig};
use limit_service::limits::LimitManager;
use limit_service::metrics::{self, Metrics};
use limit_service::server::{self, AppState};
use limit_service::store::{FirestoreStore, InMemoryStore, TimestampStore};
use limit_service::subscription::StaticSubscriptions;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("limit_service=info".parse()?)
        )
        .init();

    info!("Starting limit service");

    let config = config::load_config()?;
    info!("Configuration loaded");
    info!(
        "Default window: {}h, thresholds: {} free / {} subscribed, {} collection override(s)",
        config.limits.default.duration_in_hours,
        config.limits.default.thresholds.not_subscribed,
        config.limits.default.thresholds.subscribed,
        config.limits.collections.len()
    );

    let store: Arc<dyn TimestampStore> = match &config.store {
        StoreConfig::Memory => {
            info!("Using in-memory store");
            Arc::new(InMemoryStore::new())
        }
        StoreConfig::Firestore(firestore) => {
            info!("Using Firestore project {}", firestore.project_id);
            Arc::new(FirestoreStore::new(firestore)?)
        }
    };

    let metrics = Arc::new(Metrics::new());
    let limit_manager = Arc::new(LimitManager::new(
        config.limits.clone(),
        store,
        Arc::new(SystemClock),
        metrics.clone(),
    ));
    let subscriptions = Arc::new(StaticSubscriptions::new(
        config.subscriptions.subscribed_users.iter().cloned(),
    ));

    tokio::spawn(metrics::run_metrics_server(config.metrics.clone(), metrics));

    server::run(config.server, AppState { limit_manager, subscriptions }).await?;

    Ok(())
}
