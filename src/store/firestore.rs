use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::{TimestampFilter, TimestampRecord, TimestampStore};
use crate::config::FirestoreConfig;
use crate::error::StoreError;

const TIMESTAMP_FIELD: &str = "timestamp";

/// Firestore REST v1 backend. Records live at
/// `users/{user_id}/{collection}/{document}` with a single integer field.
pub struct FirestoreStore {
    client: Client,
    base_url: String,
    database: String,
    auth_token: Option<String>,
}

#[derive(Deserialize)]
struct Document {
    name: String,
    #[serde(default)]
    fields: HashMap<String, Value>,
}

#[derive(Deserialize)]
struct RunQueryItem {
    document: Option<Document>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Serialize)]
struct CommitRequest {
    writes: Vec<DeleteWrite>,
}

#[derive(Serialize)]
struct DeleteWrite {
    delete: String,
}

impl FirestoreStore {
    pub fn new(config: &FirestoreConfig) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: &FirestoreConfig) -> Self {
        Self {
            client,
            base_url: config.firestore_url.trim_end_matches('/').to_string(),
            database: format!("projects/{}/databases/(default)/documents", config.project_id),
            auth_token: config.auth_token.clone(),
        }
    }

    fn user_path(&self, user_id: &str) -> String {
        format!("{}/users/{}", self.database, user_id)
    }

    fn document_name(&self, user_id: &str, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.user_path(user_id), collection, id)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = self.authorize(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorEnvelope>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);

        Err(StoreError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

fn structured_query(collection: &str, filter: TimestampFilter) -> Value {
    let mut query = json!({
        "from": [{ "collectionId": collection }],
    });

    let (op, cutoff) = match filter {
        TimestampFilter::All => return json!({ "structuredQuery": query }),
        TimestampFilter::OlderThan(cutoff) => ("LESS_THAN", cutoff),
        TimestampFilter::AtOrAfter(cutoff) => ("GREATER_THAN_OR_EQUAL", cutoff),
    };

    query["where"] = json!({
        "fieldFilter": {
            "field": { "fieldPath": TIMESTAMP_FIELD },
            "op": op,
            "value": { "integerValue": cutoff.to_string() },
        }
    });

    json!({ "structuredQuery": query })
}

fn timestamp_fields(timestamp_millis: i64) -> Value {
    json!({
        "fields": {
            TIMESTAMP_FIELD: { "integerValue": timestamp_millis.to_string() }
        }
    })
}

fn parse_document(document: Document) -> Result<TimestampRecord, StoreError> {
    let id = document
        .name
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| StoreError::InvalidDocument(format!("bad document name: {}", document.name)))?
        .to_string();

    // Integers come back as JSON strings.
    let timestamp_millis = match document
        .fields
        .get(TIMESTAMP_FIELD)
        .and_then(|v| v.get("integerValue"))
    {
        Some(Value::String(s)) => s.parse::<i64>().ok(),
        Some(Value::Number(n)) => n.as_i64(),
        _ => None,
    }
    .ok_or_else(|| {
        StoreError::InvalidDocument(format!("{} has no integer {} field", document.name, TIMESTAMP_FIELD))
    })?;

    Ok(TimestampRecord { id, timestamp_millis })
}

#[async_trait]
impl TimestampStore for FirestoreStore {
    async fn query(
        &self,
        user_id: &str,
        collection: &str,
        filter: TimestampFilter,
    ) -> Result<Vec<TimestampRecord>, StoreError> {
        let url = format!("{}/{}:runQuery", self.base_url, self.user_path(user_id));
        let request = self.client.post(&url).json(&structured_query(collection, filter));

        let items: Vec<RunQueryItem> = self.send(request).await?.json().await?;
        let records = items
            .into_iter()
            .filter_map(|item| item.document)
            .map(parse_document)
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Fetched {} records for {}/{}", records.len(), user_id, collection);
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

        // A single commit is applied atomically by Firestore.
        let commit = CommitRequest {
            writes: ids
                .iter()
                .map(|id| DeleteWrite {
                    delete: self.document_name(user_id, collection, id),
                })
                .collect(),
        };

        let url = format!("{}/{}:commit", self.base_url, self.database);
        self.send(self.client.post(&url).json(&commit)).await?;

        debug!("Deleted {} records for {}/{}", ids.len(), user_id, collection);
        Ok(())
    }

    async fn insert(
        &self,
        user_id: &str,
        collection: &str,
        timestamp_millis: i64,
    ) -> Result<TimestampRecord, StoreError> {
        let url = format!("{}/{}/{}", self.base_url, self.user_path(user_id), collection);
        let request = self.client.post(&url).json(&timestamp_fields(timestamp_millis));

        let document: Document = self.send(request).await?.json().await?;
        parse_document(document)
    }
}
