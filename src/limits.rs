use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{LimitManagerConfig, LimitsConfig};
use crate::error::{LimitError, StoreError};
use crate::metrics::Metrics;
use crate::store::{TimestampFilter, TimestampRecord, TimestampStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Limit {
    pub count: u32,
    pub threshold: u32,
    pub reached: bool,
}

impl Limit {
    fn new(count: u32, threshold: u32) -> Self {
        Self {
            count,
            threshold,
            reached: count >= threshold,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.threshold.saturating_sub(self.count)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Admission {
    pub admitted: bool,
    pub limit: Limit,
}

/// Counts a user's timestamp records inside a rolling window and prunes the
/// ones that have fallen out of it.
pub struct LimitManager {
    config: LimitsConfig,
    store: Arc<dyn TimestampStore>,
    clock: Arc<dyn Clock>,
    metrics: Arc<Metrics>,
}

impl LimitManager {
    pub fn new(
        config: LimitsConfig,
        store: Arc<dyn TimestampStore>,
        clock: Arc<dyn Clock>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            config,
            store,
            clock,
            metrics,
        }
    }

    pub fn config_for(&self, collection: &str) -> &LimitManagerConfig {
        self.config
            .collections
            .get(collection)
            .unwrap_or(&self.config.default)
    }

    pub async fn calculate_limit(
        &self,
        user_id: &str,
        collection: &str,
        is_subscribed: bool,
    ) -> Result<Limit, LimitError> {
        validate_key("user_id", user_id)?;
        validate_key("collection", collection)?;

        let config = self.config_for(collection);
        let now = self.clock.now_millis()?;
        let cutoff = now.saturating_sub(config.window_millis());

        let records = self
            .store
            .query(user_id, collection, TimestampFilter::All)
            .await
            .map_err(|e| self.store_failure(e))?;

        // Records exactly at the cutoff are still active.
        let (expired, active): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|r| TimestampFilter::OlderThan(cutoff).matches(r.timestamp_millis));

        if !expired.is_empty() {
            let ids: Vec<String> = expired.into_iter().map(|r| r.id).collect();
            self.store
                .delete_batch(user_id, collection, &ids)
                .await
                .map_err(|e| self.store_failure(e))?;
            self.metrics.add_pruned(ids.len() as u64);
            debug!("Pruned {} expired records for {}/{}", ids.len(), user_id, collection);
        }

        let count = u32::try_from(active.len()).unwrap_or(u32::MAX);
        let limit = Limit::new(count, config.thresholds.for_tier(is_subscribed));

        self.metrics.inc_limit_checks();
        if limit.reached {
            self.metrics.inc_limits_reached();
            info!(
                "Limit reached for {}/{}: {}/{} (subscribed={})",
                user_id, collection, limit.count, limit.threshold, is_subscribed
            );
        }

        Ok(limit)
    }

    pub async fn record_timestamp(
        &self,
        user_id: &str,
        collection: &str,
    ) -> Result<TimestampRecord, LimitError> {
        validate_key("user_id", user_id)?;
        validate_key("collection", collection)?;

        let now = self.clock.now_millis()?;
        let record = self
            .store
            .insert(user_id, collection, now)
            .await
            .map_err(|e| self.store_failure(e))?;

        self.metrics.inc_recorded();
        debug!("Recorded {} at {} for {}/{}", record.id, now, user_id, collection);
        Ok(record)
    }

    /// Records the action only if the limit has not been reached yet.
    ///
    /// The check and the write are separate store calls, so two concurrent
    /// callers for the same user can both be admitted at the threshold.
    pub async fn try_acquire(
        &self,
        user_id: &str,
        collection: &str,
        is_subscribed: bool,
    ) -> Result<Admission, LimitError> {
        let limit = self.calculate_limit(user_id, collection, is_subscribed).await?;
        if limit.reached {
            self.metrics.inc_admissions(false);
            return Ok(Admission {
                admitted: false,
                limit,
            });
        }

        self.record_timestamp(user_id, collection).await?;
        self.metrics.inc_admissions(true);

        Ok(Admission {
            admitted: true,
            limit: Limit::new(limit.count.saturating_add(1), limit.threshold),
        })
    }

    fn store_failure(&self, e: StoreError) -> LimitError {
        self.metrics.inc_store_errors();
        warn!("Store operation failed: {}", e);
        LimitError::Store(e)
    }
}

fn validate_key(kind: &str, value: &str) -> Result<(), LimitError> {
    if value.is_empty() {
        return Err(LimitError::InvalidKey(format!("{} must not be empty", kind)));
    }
    if value.contains('/') {
        return Err(LimitError::InvalidKey(format!("{} must not contain '/': {}", kind, value)));
    }
    Ok(())
}
