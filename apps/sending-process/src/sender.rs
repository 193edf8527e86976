//! The send coroutine: drains the ring, hands each batch to the plugin, and
//! checkpoints progress (`spec.md` §4.4 "Sender" and "Checkpoint").

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tokio::sync::watch;
use tracing::{debug, warn};

use foglamp_core::{AuditLevel, Backoff, FetchSendRing, NorthPluginHandle, ReadingBatch};
use foglamp_storage::StorageClient;

use crate::audit::audit;

/// Every this many successful sends, progress is checkpointed and counters
/// reset (`spec.md` §4.4).
const TASK_SEND_UPDATE_POSITION_MAX: u32 = 10;

pub struct SenderArgs {
    pub storage: Arc<StorageClient>,
    pub ring: FetchSendRing,
    pub plugin: Box<dyn NorthPluginHandle>,
    pub stream_id: i32,
    pub stop_rx: watch::Receiver<bool>,
    pub process_name: Option<String>,
    /// `--performance_log`: append the elapsed time covering the batch of
    /// fetch+send cycles since the last checkpoint to the `STRMN` entry.
    pub performance_log: bool,
}

struct Pending {
    last_object: i64,
    sent_rows: u64,
    successes: u32,
    since: Instant,
}

impl Pending {
    fn new() -> Self {
        Self {
            last_object: 0,
            sent_rows: 0,
            successes: 0,
            since: Instant::now(),
        }
    }

    fn has_progress(&self) -> bool {
        self.sent_rows > 0
    }

    fn record(&mut self, last_object: i64, num_sent: usize) {
        self.last_object = self.last_object.max(last_object);
        self.sent_rows += num_sent as u64;
        self.successes += 1;
    }

    fn take(&mut self) -> (i64, u64, Duration) {
        let elapsed = self.since.elapsed();
        let out = (self.last_object, self.sent_rows, elapsed);
        self.sent_rows = 0;
        self.successes = 0;
        self.since = Instant::now();
        out
    }
}

/// Runs until `stop_rx` flips true (after draining its current batch),
/// flushing a final checkpoint if there is unpersisted progress.
pub async fn run(mut args: SenderArgs) {
    let mut pending = Pending::new();

    loop {
        if pending.has_progress() && args.ring.is_empty().await {
            checkpoint(&args, &mut pending).await;
        }

        if *args.stop_rx.borrow() {
            break;
        }

        let batch = tokio::select! {
            _ = args.stop_rx.changed() => break,
            batch = args.ring.pop() => batch,
        };

        send_with_retry(&args, &batch, &mut pending).await;

        if pending.successes >= TASK_SEND_UPDATE_POSITION_MAX {
            checkpoint(&args, &mut pending).await;
        }
    }

    if pending.has_progress() {
        checkpoint(&args, &mut pending).await;
    }
    if let Err(e) = args.plugin.shutdown().await {
        warn!(error = %e, "plugin shutdown reported an error");
        audit(
            &args.storage,
            "STRMN",
            AuditLevel::Fail,
            json!({ "streamId": args.stream_id, "reason": e.to_string() }),
            args.process_name.as_deref(),
        )
        .await;
    }
}

/// Sends `batch`, retrying with backoff on failure until it succeeds or a
/// stop is requested — "retry same slot", never re-drawing from the ring.
async fn send_with_retry(args: &SenderArgs, batch: &ReadingBatch, pending: &mut Pending) {
    let mut backoff = Backoff::new(Duration::from_millis(500));
    loop {
        match args.plugin.send(batch, args.stream_id).await {
            Ok(outcome) if outcome.sent_ok => {
                pending.record(outcome.new_last_object_id, outcome.num_sent);
                return;
            }
            Ok(_) | Err(_) => {
                warn!(stream_id = args.stream_id, "send failed, backing off");
                audit(
                    &args.storage,
                    "STRMN",
                    AuditLevel::Fail,
                    json!({ "streamId": args.stream_id }),
                    args.process_name.as_deref(),
                )
                .await;
                if *args.stop_rx.borrow() {
                    return;
                }
                let delay = backoff.next_delay();
                debug!(delay_ms = delay.as_millis(), "sender backing off");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

async fn checkpoint(args: &SenderArgs, pending: &mut Pending) {
    let (last_object, sent_rows, elapsed) = pending.take();
    if sent_rows == 0 {
        return;
    }
    let stream_id = args.stream_id;
    let storage = &args.storage;
    if let Err(e) = storage.checkpoint_stream(stream_id, last_object).await {
        warn!(error = %e, "failed to checkpoint stream progress");
        return;
    }
    if let Err(e) = storage
        .bump_statistic(
            &format!("SENT_{stream_id}"),
            "readings sent on this stream",
            sent_rows as i64,
        )
        .await
    {
        warn!(error = %e, "failed to update SENT statistic");
    }
    let mut data = json!({ "streamId": stream_id, "sentRows": sent_rows });
    if args.performance_log {
        data["performanceMs"] = json!(elapsed.as_millis() as u64);
    }
    audit(
        storage,
        "STRMN",
        AuditLevel::Info,
        data,
        args.process_name.as_deref(),
    )
    .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use foglamp_core::{PluginError, Reading};
    use reqwest::Client;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU32, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn reading(id: i64) -> Reading {
        Reading {
            id,
            asset_code: "test".into(),
            read_key: "test".into(),
            user_ts: chrono::Utc::now(),
            reading: BTreeMap::new(),
        }
    }

    async fn mock_storage() -> (MockServer, Arc<StorageClient>) {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/storage/table/streams"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/storage/table/log"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/storage/table/statistics/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "count": 0, "rows": [] })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/storage/table/statistics"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        let client = Arc::new(StorageClient::with_client(Client::new(), server.uri()));
        (server, client)
    }

    /// A plugin that fails its first `fail_times` sends, then always
    /// succeeds — the "plugin transient failure" scenario.
    struct FlakyPlugin {
        fail_times: u32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl NorthPluginHandle for FlakyPlugin {
        async fn send(&self, batch: &ReadingBatch, _stream_id: i32) -> Result<SendOutcome, PluginError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.fail_times {
                return Err(PluginError::SendFailed("transient".into()));
            }
            Ok(SendOutcome {
                sent_ok: true,
                new_last_object_id: batch.last_id().unwrap_or(0),
                num_sent: batch.readings.len(),
            })
        }

        async fn shutdown(&self) -> Result<(), PluginError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn transient_send_failure_is_retried_until_it_succeeds() {
        let (_server, storage) = mock_storage().await;
        let args = SenderArgs {
            storage,
            ring: FetchSendRing::new(1),
            plugin: Box::new(FlakyPlugin {
                fail_times: 2,
                attempts: AtomicU32::new(0),
            }),
            stream_id: 1,
            stop_rx: tokio::sync::watch::channel(false).1,
            process_name: None,
            performance_log: false,
        };
        let batch = ReadingBatch::new(vec![reading(1), reading(2)]);
        let mut pending = Pending::new();
        send_with_retry(&args, &batch, &mut pending).await;
        assert_eq!(pending.last_object, 2);
        assert_eq!(pending.sent_rows, 2);
    }

    #[tokio::test]
    async fn send_with_retry_stops_early_once_shutdown_is_requested() {
        let (_server, storage) = mock_storage().await;
        let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
        stop_tx.send(true).unwrap();
        let args = SenderArgs {
            storage,
            ring: FetchSendRing::new(1),
            plugin: Box::new(FlakyPlugin {
                fail_times: u32::MAX,
                attempts: AtomicU32::new(0),
            }),
            stream_id: 1,
            stop_rx,
            process_name: None,
            performance_log: false,
        };
        let batch = ReadingBatch::new(vec![reading(1)]);
        let mut pending = Pending::new();
        send_with_retry(&args, &batch, &mut pending).await;
        assert!(!pending.has_progress());
    }
}
