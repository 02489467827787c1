use async_trait::async_trait;
use serde::Serialize;

use crate::error::StoreError;

mod firestore;
mod memory;

pub use firestore::FirestoreStore;
pub use memory::InMemoryStore;

/// One recorded occurrence of a rate-limited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimestampRecord {
    pub id: String,
    pub timestamp_millis: i64,
}

/// Inequality filter on the timestamp field.
///
/// The limit manager reads `All` and splits expired from active records in
/// one pass. The inequality variants map onto store-side field filters for
/// callers that only need one side of the cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampFilter {
    All,
    /// `timestamp < cutoff`
    OlderThan(i64),
    /// `timestamp >= cutoff`
    AtOrAfter(i64),
}

impl TimestampFilter {
    pub fn matches(&self, timestamp_millis: i64) -> bool {
        match *self {
            TimestampFilter::All => true,
            TimestampFilter::OlderThan(cutoff) => timestamp_millis < cutoff,
            TimestampFilter::AtOrAfter(cutoff) => timestamp_millis >= cutoff,
        }
    }
}

/// Per-user, per-collection storage of timestamp records.
#[async_trait]
pub trait TimestampStore: Send + Sync {
    async fn query(
        &self,
        user_id: &str,
        collection: &str,
        filter: TimestampFilter,
    ) -> Result<Vec<TimestampRecord>, StoreError>;

    /// Deletes every listed record or none of them.
    async fn delete_batch(
        &self,
        user_id: &str,
        collection: &str,
        ids: &[String],
    ) -> Result<(), StoreError>;

    async fn insert(
        &self,
        user_id: &str,
        collection: &str,
        timestamp_millis: i64,
    ) -> Result<TimestampRecord, StoreError>;
}
