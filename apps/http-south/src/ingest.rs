//! `StorageIngressSink`: the real `IngressSink` backing the standalone HTTP
//! South listener. Bridges the HTTP handler to storage through a bounded
//! `mpsc` queue drained by a background worker — the same shape the teacher
//! uses for its per-connection outbound queues
//! (`alloy-transport::server`'s `mpsc::Sender<Vec<u8>>`), here applied to
//! inbound readings instead of outbound frames.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::warn;

use foglamp_plugin_http_south::{EnqueueOutcome, IncomingReading, IngressSink};
use foglamp_storage::StorageClient;

const INGRESS_QUEUE_CAPACITY: usize = 1024;

pub struct StorageIngressSink {
    tx: mpsc::Sender<IncomingReading>,
}

impl StorageIngressSink {
    /// Spawns the drain worker and returns a sink bound to it. The worker
    /// runs for the lifetime of the process; there is no `stop` because the
    /// listener and the worker always share the process lifetime.
    pub fn spawn(storage: Arc<StorageClient>) -> Self {
        let (tx, rx) = mpsc::channel(INGRESS_QUEUE_CAPACITY);
        tokio::spawn(drain(storage, rx));
        Self { tx }
    }
}

#[async_trait]
impl IngressSink for StorageIngressSink {
    async fn try_enqueue(&self, reading: IncomingReading) -> EnqueueOutcome {
        match self.tx.try_send(reading) {
            Ok(()) => EnqueueOutcome::Accepted,
            Err(_) => EnqueueOutcome::Busy,
        }
    }
}

async fn drain(storage: Arc<StorageClient>, mut rx: mpsc::Receiver<IncomingReading>) {
    while let Some(reading) = rx.recv().await {
        if let Err(e) = insert(&storage, reading).await {
            warn!(error = %e, "failed to persist ingested reading");
        }
    }
}

async fn insert(storage: &StorageClient, reading: IncomingReading) -> Result<(), foglamp_storage::StorageError> {
    let user_ts = parse_timestamp(&reading.timestamp);
    let row = json!({
        "asset_code": reading.asset,
        "read_key": reading.key,
        "user_ts": foglamp_core::normalize_timestamp(user_ts),
        "reading": Value::Object(reading.readings),
    });
    storage.insert_into_tbl("readings", row).await
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
