use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::{TimestampFilter, TimestampRecord, TimestampStore};
use crate::error::StoreError;

type Key = (String, String);

/// Process-local store; records vanish with the process.
#[derive(Default)]
pub struct InMemoryStore {
    records: DashMap<Key, Vec<TimestampRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(user_id: &str, collection: &str) -> Key {
        (user_id.to_string(), collection.to_string())
    }

    pub fn len(&self, user_id: &str, collection: &str) -> usize {
        self.records
            .get(&Self::key(user_id, collection))
            .map(|r| r.len())
            .unwrap_or(0)
    }

    pub fn is_empty(&self, user_id: &str, collection: &str) -> bool {
        self.len(user_id, collection) == 0
    }
}

#[async_trait]
impl TimestampStore for InMemoryStore {
    async fn query(
        &self,
        user_id: &str,
        collection: &str,
        filter: TimestampFilter,
    ) -> Result<Vec<TimestampRecord>, StoreError> {
        let records = match self.records.get(&Self::key(user_id, collection)) {
            Some(records) => records
                .iter()
                .filter(|r| filter.matches(r.timestamp_millis))
                .cloned()
                .collect(),
            None => Vec::new(),
        };
        Ok(records)
    }

    async fn delete_batch(
        &self,
        user_id: &str,
        collection: &str,
        ids: &[String],
    ) -> Result<(), StoreError> {
        if ids.is_empty() {
            return Ok(());
        }

        // Ids that are already gone count as deleted, matching a Firestore commit.
        // The entry guard holds the shard lock for the whole batch.
        let key = Self::key(user_id, collection);
        let Some(mut records) = self.records.get_mut(&key) else {
            return Ok(());
        };

        records.retain(|r| !ids.contains(&r.id));
        let now_empty = records.is_empty();
        drop(records);

        if now_empty {
            self.records.remove_if(&key, |_, r| r.is_empty());
        }
        Ok(())
    }

    async fn insert(
        &self,
        user_id: &str,
        collection: &str,
        timestamp_millis: i64,
    ) -> Result<TimestampRecord, StoreError> {
        let record = TimestampRecord {
            id: Uuid::new_v4().to_string(),
            timestamp_millis,
        };

        self.records
            .entry(Self::key(user_id, collection))
            .or_default()
            .push(record.clone());

        Ok(record)
    }
}
