//! The reference HTTP North plugin: POSTs each batch to a configured URL
//! as one JSON document per asset code, retrying transient failures with
//! the shared exponential backoff policy.
//!
//! Grounded on `alloy-transport::http::client::HttpClientCapabilityImpl`:
//! one shared `reqwest::Client`, a fixed connect/request timeout, bearer
//! auth when configured, JSON in and out.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use foglamp_core::retry::{MaxAttempts, RetrySchedule};
use foglamp_core::{
    normalize_timestamp, NorthPlugin, NorthPluginHandle, PluginError, PluginInfo,
    PluginInitConfig, ReadingBatch, SendOutcome,
};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const PLUGIN_NAME: &str = "http_north";

#[derive(Serialize, Clone)]
struct NorthReading {
    read_key: String,
    user_ts: String,
    reading: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize)]
struct NorthRequest<'a> {
    asset_code: &'a str,
    readings: Vec<NorthReading>,
}

/// Descriptor for the HTTP North plugin; `init` validates its configuration
/// and produces a live handle bound to one stream.
pub struct HttpNorthPlugin;

#[async_trait]
impl NorthPlugin for HttpNorthPlugin {
    fn info(&self) -> PluginInfo {
        PluginInfo {
            name: PLUGIN_NAME.to_string(),
            version: "1.0.0".to_string(),
            plugin_type: "north".to_string(),
            interface: "1.0".to_string(),
            config_schema: json!({
                "url": { "description": "destination URL", "type": "string", "default": "" },
                "timeout": { "description": "request timeout, seconds", "type": "integer", "default": "30" },
                "max_attempts": { "description": "retry budget (-1 forever, 0 none, N limited)", "type": "integer", "default": "-1" },
            }),
        }
    }

    async fn init(
        &self,
        config: PluginInitConfig,
    ) -> Result<Box<dyn NorthPluginHandle>, PluginError> {
        let url = config
            .item("url")
            .filter(|u| !u.is_empty())
            .ok_or_else(|| PluginError::InitFailed("missing required 'url' item".to_string()))?
            .to_string();

        let timeout_secs: u64 = config
            .item("timeout")
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let max_attempts: i64 = config
            .item("max_attempts")
            .and_then(|v| v.parse().ok())
            .unwrap_or(-1);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PluginError::InitFailed(e.to_string()))?;

        Ok(Box::new(HttpNorthHandle {
            client,
            url,
            max_attempts: MaxAttempts::from(max_attempts),
        }))
    }
}

struct HttpNorthHandle {
    client: Client,
    url: String,
    max_attempts: MaxAttempts,
}

impl HttpNorthHandle {
    fn group_by_asset(batch: &ReadingBatch) -> HashMap<&str, Vec<NorthReading>> {
        let mut groups: HashMap<&str, Vec<NorthReading>> = HashMap::new();
        for reading in &batch.readings {
            let map: serde_json::Map<String, serde_json::Value> =
                reading.reading.clone().into_iter().collect();
            groups
                .entry(reading.asset_code.as_str())
                .or_default()
                .push(NorthReading {
                    read_key: reading.read_key.clone(),
                    user_ts: normalize_timestamp(reading.user_ts),
                    reading: map,
                });
        }
        groups
    }

    async fn post_once(&self, request: &NorthRequest<'_>) -> Result<(), String> {
        let resp = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status();
        // Terminal on 2xx/3xx; retried on 4xx/5xx per `spec.md` §6.
        if status.is_success() || status.is_redirection() {
            Ok(())
        } else {
            Err(format!("HTTP {}", status.as_u16()))
        }
    }
}

#[async_trait]
impl NorthPluginHandle for HttpNorthHandle {
    async fn send(
        &self,
        batch: &ReadingBatch,
        _stream_id: i32,
    ) -> Result<SendOutcome, PluginError> {
        if batch.is_empty() {
            return Ok(SendOutcome {
                sent_ok: true,
                new_last_object_id: 0,
                num_sent: 0,
            });
        }

        let groups = Self::group_by_asset(batch);
        let schedule = RetrySchedule::new(Duration::from_millis(500), self.max_attempts);
        let mut attempts: u32 = 0;

        loop {
            let mut all_ok = true;
            for (asset_code, readings) in &groups {
                let request = NorthRequest {
                    asset_code,
                    readings: readings.clone(),
                };
                if let Err(reason) = self.post_once(&request).await {
                    warn!(asset_code, reason = %reason, "HTTP North send failed");
                    all_ok = false;
                }
            }

            if all_ok {
                return Ok(SendOutcome {
                    sent_ok: true,
                    new_last_object_id: batch.last_id().unwrap_or(0),
                    num_sent: batch.len(),
                });
            }

            if !schedule.max_attempts.allows_retry(attempts) {
                return Err(PluginError::SendFailed(format!(
                    "exhausted retry budget after {attempts} attempts"
                )));
            }

            let delay = schedule.delay_for(attempts);
            attempts += 1;
            debug!(attempt = attempts, delay_ms = delay.as_millis(), "retrying HTTP North send");
            tokio::time::sleep(delay).await;
        }
    }

    async fn shutdown(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn batch() -> ReadingBatch {
        ReadingBatch::new(vec![foglamp_core::Reading {
            id: 1,
            asset_code: "motor1".into(),
            read_key: "9c858901-8a57-4791-81fe-4c455b099bc9".into(),
            user_ts: Utc::now(),
            reading: BTreeMap::from([("temperature".to_string(), json!(21.5))]),
        }])
    }

    async fn init_plugin(server: &MockServer, max_attempts: i64) -> Box<dyn NorthPluginHandle> {
        let plugin = HttpNorthPlugin;
        let config = PluginInitConfig {
            stream_id: 1,
            items: HashMap::from([
                ("url".to_string(), format!("{}/ingest", server.uri())),
                ("max_attempts".to_string(), max_attempts.to_string()),
            ]),
        };
        plugin.init(config).await.unwrap()
    }

    #[tokio::test]
    async fn send_succeeds_on_first_attempt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let handle = init_plugin(&server, 0).await;
        let outcome = handle.send(&batch(), 1).await.unwrap();
        assert!(outcome.sent_ok);
        assert_eq!(outcome.num_sent, 1);
    }

    #[tokio::test]
    async fn max_attempts_zero_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let handle = init_plugin(&server, 0).await;
        assert!(handle.send(&batch(), 1).await.is_err());
    }

    #[tokio::test]
    async fn limited_retries_eventually_succeed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let handle = init_plugin(&server, 3).await;
        let outcome = handle.send(&batch(), 1).await.unwrap();
        assert!(outcome.sent_ok);
    }
}
