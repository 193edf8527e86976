//! The fetch coroutine: loads unsent rows, optionally filters them, and
//! hands them to the sender over the shared ring (`spec.md` §4.4 "Fetcher").

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::watch;
use tracing::{debug, warn};

use foglamp_core::{AuditLevel, Backoff, FetchSendRing, ReadingBatch};
use foglamp_storage::StorageClient;
use foglamp_transform::FilterEngine;

use crate::audit::audit;
use crate::config::Source;

pub struct FetcherArgs {
    pub storage: Arc<StorageClient>,
    pub ring: FetchSendRing,
    pub stream_id: i32,
    pub source: Source,
    pub block_size: u32,
    pub filter: Option<Arc<FilterEngine>>,
    pub stop_rx: watch::Receiver<bool>,
    pub process_name: Option<String>,
}

/// Runs until `stop_rx` flips true, fetching batches and pushing them onto
/// `ring`. Never returns an error: loader failures are audited and retried
/// with backoff, matching "On loader exception: audit STRMN failure, sleep
/// with backoff, continue" rather than tearing down the process.
pub async fn run(mut args: FetcherArgs) {
    let mut last_object = match args.storage.fetch_stream(args.stream_id).await {
        Ok(Some(row)) => row["last_object"].as_i64().unwrap_or(0),
        _ => 0,
    };
    let mut backoff = Backoff::new(Duration::from_millis(500));

    loop {
        if *args.stop_rx.borrow() {
            break;
        }

        let loaded = load_batch(&args.storage, args.source, last_object, args.block_size).await;

        match loaded {
            Ok(batch) if batch.is_empty() => {
                let delay = backoff.next_delay();
                debug!(delay_ms = delay.as_millis(), "fetcher idle, no new rows");
                if wait_or_stop(delay, &mut args.stop_rx).await {
                    break;
                }
            }
            Ok(batch) => {
                backoff.reset();
                let batch = match apply_filter(&args.filter, batch) {
                    Ok(b) => b,
                    Err(e) => {
                        warn!(error = %e, "filter rule failed, dropping batch");
                        audit(
                            &args.storage,
                            "STRMN",
                            AuditLevel::Fail,
                            json!({ "streamId": args.stream_id, "reason": e.to_string() }),
                            args.process_name.as_deref(),
                        )
                        .await;
                        continue;
                    }
                };
                last_object = batch.last_id().unwrap_or(last_object);

                tokio::select! {
                    _ = args.stop_rx.changed() => break,
                    _ = args.ring.push(batch) => {}
                }
            }
            Err(reason) => {
                warn!(error = %reason, "fetch failed");
                audit(
                    &args.storage,
                    "STRMN",
                    AuditLevel::Fail,
                    json!({ "streamId": args.stream_id, "reason": reason }),
                    args.process_name.as_deref(),
                )
                .await;
                let delay = backoff.next_delay();
                if wait_or_stop(delay, &mut args.stop_rx).await {
                    break;
                }
            }
        }
    }
}

async fn load_batch(
    storage: &StorageClient,
    source: Source,
    last_object: i64,
    block_size: u32,
) -> Result<ReadingBatch, String> {
    match source {
        Source::Readings => storage
            .fetch(last_object, block_size)
            .await
            .map_err(|e| e.to_string()),
        Source::Statistics => {
            // `statistics_history` has no surrogate `id` column; `rowid`
            // stands in as the monotone cursor the rest of the run loop
            // expects every source to expose.
            let payload = foglamp_storage::PayloadBuilder::new()
                .where_cond("rowid", ">", json!(last_object))
                .order_by("rowid", false)
                .limit(block_size as u64)
                .build();
            let result = storage
                .query_tbl_with_payload("statistics_history", payload)
                .await
                .map_err(|e| e.to_string())?;
            rows_to_batch(result.rows)
        }
        // Reserved in the original source; always an empty batch, never an
        // error, per the "audit source" open question.
        Source::Audit => Ok(ReadingBatch::default()),
    }
}

fn rows_to_batch(rows: Vec<Value>) -> Result<ReadingBatch, String> {
    use chrono::Utc;
    use std::collections::BTreeMap;

    let readings = rows
        .into_iter()
        .map(|row| foglamp_core::Reading {
            id: row["rowid"].as_i64().unwrap_or(0),
            asset_code: row["key"].as_str().unwrap_or_default().to_string(),
            read_key: row["key"].as_str().unwrap_or_default().to_string(),
            user_ts: row["history_ts"]
                .as_str()
                .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(Utc::now),
            reading: BTreeMap::from([(
                "value".to_string(),
                row["value"].clone(),
            )]),
        })
        .collect();
    Ok(ReadingBatch::new(readings))
}

fn apply_filter(
    filter: &Option<Arc<FilterEngine>>,
    batch: ReadingBatch,
) -> Result<ReadingBatch, foglamp_core::TransformError> {
    let Some(engine) = filter else {
        return Ok(batch);
    };
    let input = json!(batch
        .readings
        .iter()
        .map(|r| json!({
            "id": r.id,
            "asset_code": r.asset_code,
            "read_key": r.read_key,
            "user_ts": r.user_ts,
            "reading": r.reading,
        }))
        .collect::<Vec<_>>());
    let transformed = engine.apply(input)?;
    let readings: Vec<foglamp_core::Reading> =
        serde_json::from_value(transformed).map_err(|e| foglamp_core::TransformError(e.to_string()))?;
    Ok(ReadingBatch::new(readings))
}

/// Sleeps for `delay`, returning early (with `true`) if `stop_rx` flips.
async fn wait_or_stop(delay: Duration, stop_rx: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(delay) => false,
        _ = stop_rx.changed() => true,
    }
}
