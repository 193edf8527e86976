//! `StorageClient`: a typed async wrapper over the storage service's tabular
//! HTTP API, built the way `alloy-transport::http::client::HttpClientCapabilityImpl`
//! wraps a single shared `reqwest::Client` — one client, fixed timeout, JSON
//! bodies in and out.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use foglamp_core::{ConfigError, Reading, ReadingBatch};

use crate::error::StorageError;
use crate::payload::PayloadBuilder;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// The result of a `query_tbl`/`query_tbl_with_payload` call.
#[derive(Debug, Clone, Deserialize)]
pub struct QueryResult {
    pub count: u64,
    pub rows: Vec<Value>,
}

/// The purge call's result, aggregated across the age and size passes.
#[derive(Debug, Clone, Default)]
pub struct PurgeResult {
    pub readings: u64,
    pub removed: u64,
    pub unsent_purged: u64,
    pub unsent_retained: u64,
}

impl PurgeResult {
    fn accumulate(&mut self, other: &PurgeResult) {
        self.readings += other.readings;
        self.removed += other.removed;
        self.unsent_purged += other.unsent_purged;
        self.unsent_retained += other.unsent_retained;
    }
}

#[derive(Debug, Deserialize)]
struct RawPurgeResponse {
    #[serde(default)]
    readings: u64,
    #[serde(default)]
    removed: u64,
    #[serde(rename = "unsentPurged", default)]
    unsent_purged: u64,
    #[serde(rename = "unsentRetained", default)]
    unsent_retained: u64,
}

/// Whether a purge call should spare or discard rows past the safety floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetainFlag {
    Purge,
    Retain,
}

impl RetainFlag {
    fn as_query_value(self) -> &'static str {
        match self {
            RetainFlag::Purge => "purge",
            RetainFlag::Retain => "retain",
        }
    }
}

/// Async client for the storage service's tabular and readings-specific API.
#[derive(Clone)]
pub struct StorageClient {
    client: Client,
    base_url: String,
}

impl StorageClient {
    /// Connects to the storage service at `(address, port)`, per the Sending
    /// Process startup sequence's step 2.
    pub fn connect(address: &str, port: u16) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        Ok(Self {
            client,
            base_url: format!("http://{address}:{port}"),
        })
    }

    /// Constructs a client around a pre-built `reqwest::Client`, for tests
    /// that need a custom timeout or a `wiremock` server URL in place of
    /// `base_url`.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn send_query(&self, path: &str, payload: Value) -> Result<QueryResult, StorageError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .put(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        self.parse_query_response(resp).await
    }

    async fn parse_query_response(
        &self,
        resp: reqwest::Response,
    ) -> Result<QueryResult, StorageError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::from_status(status, body));
        }
        resp.json::<QueryResult>()
            .await
            .map_err(|e| StorageError::Malformed(e.to_string()))
    }

    /// `query_tbl(table, where_string)` — a simple string-form WHERE clause.
    pub async fn query_tbl(
        &self,
        table: &str,
        where_clause: Option<&str>,
    ) -> Result<QueryResult, StorageError> {
        let payload = match where_clause {
            Some(w) => json!({ "where": w }),
            None => json!({}),
        };
        self.send_query(&format!("/storage/table/{table}/query"), payload)
            .await
    }

    /// `query_tbl_with_payload(table, json_payload)`.
    pub async fn query_tbl_with_payload(
        &self,
        table: &str,
        payload: Value,
    ) -> Result<QueryResult, StorageError> {
        self.send_query(&format!("/storage/table/{table}/query"), payload)
            .await
    }

    /// `insert_into_tbl(table, json_payload)`.
    pub async fn insert_into_tbl(&self, table: &str, payload: Value) -> Result<(), StorageError> {
        let url = format!("{}/storage/table/{}", self.base_url, table);
        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::from_status(status, body));
        }
        Ok(())
    }

    /// `update_tbl(table, json_payload)`.
    pub async fn update_tbl(&self, table: &str, payload: Value) -> Result<(), StorageError> {
        let url = format!("{}/storage/table/{}", self.base_url, table);
        let resp = self
            .client
            .put(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::from_status(status, body));
        }
        Ok(())
    }

    /// Readings-specific: fetches up to `limit` rows with `id > from_id_exclusive`.
    pub async fn fetch(
        &self,
        from_id_exclusive: i64,
        limit: u32,
    ) -> Result<ReadingBatch, StorageError> {
        let url = format!(
            "{}/storage/reading?id={}&count={}",
            self.base_url, from_id_exclusive, limit
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::from_status(status, body));
        }
        #[derive(Deserialize)]
        struct RawReading {
            id: i64,
            asset_code: String,
            read_key: String,
            user_ts: DateTime<Utc>,
            reading: std::collections::BTreeMap<String, Value>,
        }
        #[derive(Deserialize)]
        struct RawFetch {
            rows: Vec<RawReading>,
        }
        let raw: RawFetch = resp
            .json()
            .await
            .map_err(|e| StorageError::Malformed(e.to_string()))?;
        let readings = raw
            .rows
            .into_iter()
            .map(|r| Reading {
                id: r.id,
                asset_code: r.asset_code,
                read_key: r.read_key,
                user_ts: r.user_ts,
                reading: r.reading,
            })
            .collect();
        Ok(ReadingBatch::new(readings))
    }

    /// Readings-specific purge: age-based when `age` is `Some` and non-zero,
    /// size-based when `size` is `Some` and non-zero. Per §4.5, both passes
    /// may run in one call (age then size); the caller decides which to
    /// issue by passing `None` for the pass it wants skipped.
    pub async fn purge(
        &self,
        age: Option<u32>,
        size: Option<u64>,
        sent_id: i64,
        flag: RetainFlag,
    ) -> Result<PurgeResult, StorageError> {
        let mut total = PurgeResult::default();

        if let Some(age) = age.filter(|&a| a > 0) {
            let url = format!(
                "{}/storage/reading/purge?age={}&sent={}&flags={}",
                self.base_url,
                age,
                sent_id,
                flag.as_query_value()
            );
            total.accumulate(&self.issue_purge(&url).await?);
        }

        if let Some(size) = size.filter(|&s| s > 0) {
            let url = format!(
                "{}/storage/reading/purge?size={}&sent={}&flags={}",
                self.base_url,
                size,
                sent_id,
                flag.as_query_value()
            );
            total.accumulate(&self.issue_purge(&url).await?);
        }

        Ok(total)
    }

    /// Fetches the `streams` row for `stream_id`, if it exists. A `streams`
    /// row must exist at most once per id; more than one match is a
    /// configuration error, not "first one wins".
    pub async fn fetch_stream(&self, stream_id: i32) -> Result<Option<Value>, ConfigError> {
        let payload = PayloadBuilder::new()
            .where_cond("id", "=", json!(stream_id))
            .build();
        let result = self
            .query_tbl_with_payload("streams", payload)
            .await
            .map_err(|e| ConfigError::InvalidSchema(format!("storage error: {e}")))?;
        if result.rows.len() > 1 {
            return Err(ConfigError::StreamNotFound(stream_id));
        }
        Ok(result.rows.into_iter().next())
    }

    /// `update streams set last_object=<id>, ts=now() where id=<stream_id>`.
    pub async fn checkpoint_stream(&self, stream_id: i32, last_object: i64) -> Result<(), StorageError> {
        let payload = PayloadBuilder::new()
            .where_cond("id", "=", json!(stream_id))
            .set("last_object", json!(last_object))
            .set("ts", json!(Utc::now()))
            .build();
        self.update_tbl("streams", payload).await
    }

    /// The smallest `last_object` across every stream, or 0 if there are none
    /// — the Purge Task's safety floor (`spec.md` §4.5).
    pub async fn min_last_object(&self) -> Result<i64, StorageError> {
        let payload = PayloadBuilder::new()
            .aggregate("min", "last_object")
            .build();
        let result = self.query_tbl_with_payload("streams", payload).await?;
        Ok(result
            .rows
            .first()
            .and_then(|r| r.get("min_last_object").or_else(|| r.get("last_object")))
            .and_then(Value::as_i64)
            .unwrap_or(0))
    }

    /// Increments (or creates) a `statistics` row, tracking `previous_value`
    /// the way `streams`' checkpoint tracks `last_object` — read, add,
    /// write, because the storage service's payload grammar (`PayloadBuilder`)
    /// has no server-side increment operator.
    pub async fn bump_statistic(
        &self,
        key: &str,
        description: &str,
        delta: i64,
    ) -> Result<(), StorageError> {
        let existing = self
            .query_tbl_with_payload(
                "statistics",
                PayloadBuilder::new().where_cond("key", "=", json!(key)).build(),
            )
            .await?;
        match existing.rows.into_iter().next() {
            Some(row) => {
                let current = row["value"].as_i64().unwrap_or(0);
                let update = PayloadBuilder::new()
                    .where_cond("key", "=", json!(key))
                    .set("previous_value", json!(current))
                    .set("value", json!(current + delta))
                    .build();
                self.update_tbl("statistics", update).await
            }
            None => {
                let insert = json!({
                    "key": key,
                    "description": description,
                    "value": delta,
                    "previous_value": 0,
                });
                self.insert_into_tbl("statistics", insert).await
            }
        }
    }

    async fn issue_purge(&self, url: &str) -> Result<PurgeResult, StorageError> {
        let resp = self
            .client
            .put(url)
            .send()
            .await
            .map_err(|e| StorageError::Transient(e.to_string()))?;
        let status = resp.status();
        if status == reqwest::StatusCode::CONFLICT {
            let body = resp.text().await.unwrap_or_default();
            warn!(body = %body, "purge deferred: storage reported a conflict");
            return Err(StorageError::Conflict(body));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StorageError::from_status(status, body));
        }
        let raw: RawPurgeResponse = resp
            .json()
            .await
            .map_err(|e| StorageError::Malformed(e.to_string()))?;
        debug!(removed = raw.removed, "purge pass completed");
        Ok(PurgeResult {
            readings: raw.readings,
            removed: raw.removed,
            unsent_purged: raw.unsent_purged,
            unsent_retained: raw.unsent_retained,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_stream_rejects_more_than_one_matching_row() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/storage/table/streams/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 2,
                "rows": [{ "id": 7, "last_object": 1 }, { "id": 7, "last_object": 2 }],
            })))
            .mount(&server)
            .await;

        let client = StorageClient::with_client(Client::new(), server.uri());
        let err = client.fetch_stream(7).await.unwrap_err();
        assert!(matches!(err, ConfigError::StreamNotFound(7)));
    }

    #[tokio::test]
    async fn fetch_stream_returns_none_when_absent() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/storage/table/streams/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 0,
                "rows": [],
            })))
            .mount(&server)
            .await;

        let client = StorageClient::with_client(Client::new(), server.uri());
        assert!(client.fetch_stream(7).await.unwrap().is_none());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> StorageClient {
        StorageClient::with_client(Client::new(), server.uri())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(8))]
        /// Every purge call carries the `sent` boundary and the caller's
        /// retention flag verbatim, for any age/size/sent_id combination —
        /// the storage service, not this client, is what actually enforces
        /// "no row past `sent_id` is removed when retaining", but the
        /// client must never drop or mangle the parameters that request it.
        #[test]
        fn purge_requests_always_carry_sent_boundary_and_flag(
            age in 1u32..1000,
            sent_id in 0i64..1_000_000,
            retain in any::<bool>(),
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let server = MockServer::start().await;
                let flag = if retain { RetainFlag::Retain } else { RetainFlag::Purge };
                let flag_str = if retain { "retain" } else { "purge" };

                Mock::given(method("PUT"))
                    .and(path("/storage/reading/purge"))
                    .and(query_param("age", age.to_string()))
                    .and(query_param("sent", sent_id.to_string()))
                    .and(query_param("flags", flag_str))
                    .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                        "readings": 10, "removed": 3, "unsentPurged": 0, "unsentRetained": 7
                    })))
                    .mount(&server)
                    .await;

                let client = client_for(&server);
                let result = client.purge(Some(age), None, sent_id, flag).await.unwrap();
                prop_assert_eq!(result.removed, 3);
                Ok(())
            })?;
        }
    }
}
