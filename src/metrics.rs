use axum::{Router, routing::get};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::MetricsConfig;

#[derive(Default)]
pub struct Metrics {
    pub limit_checks: AtomicU64,
    pub limits_reached: AtomicU64,
    pub admissions_granted: AtomicU64,
    pub admissions_denied: AtomicU64,
    pub timestamps_recorded: AtomicU64,
    pub timestamps_pruned: AtomicU64,
    pub store_errors: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_limit_checks(&self) {
        self.limit_checks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_limits_reached(&self) {
        self.limits_reached.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_admissions(&self, admitted: bool) {
        if admitted {
            self.admissions_granted.fetch_add(1, Ordering::Relaxed);
        } else {
            self.admissions_denied.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn inc_recorded(&self) {
        self.timestamps_recorded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_pruned(&self, count: u64) {
        self.timestamps_pruned.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_store_errors(&self) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn format_prometheus(&self) -> String {
        format!(
            "# HELP limits_checks_total Limit calculations performed\n\
             # TYPE limits_checks_total counter\n\
             limits_checks_total {}\n\
             # HELP limits_reached_total Limit calculations that found the limit reached\n\
             # TYPE limits_reached_total counter\n\
             limits_reached_total {}\n\
             # HELP limits_admissions_granted_total Actions admitted and recorded\n\
             # TYPE limits_admissions_granted_total counter\n\
             limits_admissions_granted_total {}\n\
             # HELP limits_admissions_denied_total Actions denied by a reached limit\n\
             # TYPE limits_admissions_denied_total counter\n\
             limits_admissions_denied_total {}\n\
             # HELP limits_timestamps_recorded_total Timestamp records written\n\
             # TYPE limits_timestamps_recorded_total counter\n\
             limits_timestamps_recorded_total {}\n\
             # HELP limits_timestamps_pruned_total Expired timestamp records deleted\n\
             # TYPE limits_timestamps_pruned_total counter\n\
             limits_timestamps_pruned_total {}\n\
             # HELP limits_store_errors_total Document store failures\n\
             # TYPE limits_store_errors_total counter\n\
             limits_store_errors_total {}\n",
            self.limit_checks.load(Ordering::Relaxed),
            self.limits_reached.load(Ordering::Relaxed),
            self.admissions_granted.load(Ordering::Relaxed),
            self.admissions_denied.load(Ordering::Relaxed),
            self.timestamps_recorded.load(Ordering::Relaxed),
            self.timestamps_pruned.load(Ordering::Relaxed),
            self.store_errors.load(Ordering::Relaxed),
        )
    }
}

pub async fn run_metrics_server(config: MetricsConfig, metrics: Arc<Metrics>) {
    if !config.enable {
        return;
    }

    let path = config.path.clone();
    let app = Router::new()
        .route(&path, get(move || {
            let m = metrics.clone();
            async move { m.format_prometheus() }
        }));

    let addr: std::net::SocketAddr = match config.bind_addr.parse() {
        Ok(a) => a,
        Err(e) => {
            tracing::error!("Invalid metrics bind address: {}", e);
            return;
        }
    };

    info!("Metrics server listening on {}{}", addr, path);

    match TcpListener::bind(addr).await {
        Ok(listener) => {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("Metrics server stopped: {}", e);
            }
        }
        Err(e) => tracing::error!("Failed to bind metrics server: {}", e),
    }
}
