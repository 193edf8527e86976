//! The Purge Task: trims old readings from storage per `spec.md` §4.5.

mod cli;
mod error;

use std::process::ExitCode;

use clap::Parser;
use serde_json::json;
use tracing::{info, warn};

use foglamp_config::ConfigurationManager;
use foglamp_core::{AuditEntry, AuditLevel};
use foglamp_runtime::{level_from_debug_flag, LoggingBuilder};
use foglamp_storage::{RetainFlag, StorageClient, StorageError};

use crate::cli::Cli;
use crate::error::PurgeTaskError;

const PURGE_READ_CATEGORY: &str = "PURGE_READ";

fn default_schema() -> serde_json::Value {
    json!({
        "age": {
            "description": "purge readings older than this many hours",
            "type": "integer",
            "default": "72",
        },
        "size": {
            "description": "purge down to this many rows",
            "type": "integer",
            "default": "1000000",
        },
        "retainUnsent": {
            "description": "spare rows not yet sent on every stream",
            "type": "boolean",
            "default": "false",
        },
    })
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    LoggingBuilder::new()
        .with_level(level_from_debug_flag(cli.debug_level))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "purge task failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), PurgeTaskError> {
    let storage = StorageClient::connect(&cli.address, cli.port)?;
    let config_manager = ConfigurationManager::new(storage.clone());

    config_manager
        .create_category(PURGE_READ_CATEGORY, default_schema(), "Purge Task configuration", true)
        .await?;
    let items = config_manager.get_category_all_items(PURGE_READ_CATEGORY).await?;

    let age: u32 = items["age"].effective_value().parse().unwrap_or(72);
    let size: u64 = items["size"].effective_value().parse().unwrap_or(1_000_000);
    let retain_unsent: bool = items["retainUnsent"].effective_value().parse().unwrap_or(false);

    let sent_id = storage.min_last_object().await?;
    let flag = if retain_unsent {
        RetainFlag::Retain
    } else {
        RetainFlag::Purge
    };

    let result = match storage.purge(Some(age), Some(size), sent_id, flag).await {
        Ok(result) => result,
        Err(StorageError::Conflict(reason)) => {
            warn!(reason = %reason, "purge deferred by storage, will retry next run");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    if result.removed > 0 {
        info!(removed = result.removed, "purge completed");
        audit_purge(&storage, &result).await;
        let _ = storage
            .bump_statistic("PURGED", "rows purged", result.removed as i64)
            .await;
        let _ = storage
            .bump_statistic("UNSNPURGED", "unsent rows purged", result.unsent_purged as i64)
            .await;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn category_row(age: &str, size: &str, retain_unsent: &str) -> serde_json::Value {
        json!({
            "description": "Purge Task configuration",
            "value": {
                "age": { "description": "d", "type": "integer", "default": "72", "value": age },
                "size": { "description": "d", "type": "integer", "default": "1000000", "value": size },
                "retainUnsent": { "description": "d", "type": "boolean", "default": "false", "value": retain_unsent },
            }
        })
    }

    /// Wires up a mock storage service that always reports the given
    /// `PURGE_READ` values and a `streams` floor of `sent_id`, tracking the
    /// bare minimum of endpoints `run` actually exercises.
    async fn mock_storage(age: &str, size: &str, retain_unsent: &str, sent_id: i64) -> (MockServer, StorageClient) {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/storage/table/configuration/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1,
                "rows": [category_row(age, size, retain_unsent)],
            })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/storage/table/configuration"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/storage/table/log"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/storage/table/streams/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "count": 1,
                "rows": [{ "min_last_object": sent_id }],
            })))
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

        let client = StorageClient::with_client(reqwest::Client::new(), server.uri());
        (server, client)
    }

    /// "Purge with retention": `retainUnsent=true` must pass `flags=retain`
    /// and the live `sent_id` floor through to the storage call.
    #[tokio::test]
    async fn retention_purge_passes_retain_flag_and_sent_floor() {
        let (server, storage) = mock_storage("72", "1000000", "true", 4200).await;

        Mock::given(method("PUT"))
            .and(path("/storage/reading/purge"))
            .and(query_param("sent", "4200"))
            .and(query_param("flags", "retain"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "readings": 50, "removed": 10, "unsentPurged": 0, "unsentRetained": 40
            })))
            .mount(&server)
            .await;

        let config_manager = ConfigurationManager::new(storage.clone());
        config_manager
            .create_category(PURGE_READ_CATEGORY, default_schema(), "Purge Task configuration", true)
            .await
            .unwrap();
        let items = config_manager.get_category_all_items(PURGE_READ_CATEGORY).await.unwrap();
        let retain_unsent: bool = items["retainUnsent"].effective_value().parse().unwrap();
        assert!(retain_unsent);

        let sent_id = storage.min_last_object().await.unwrap();
        assert_eq!(sent_id, 4200);

        let result = storage
            .purge(Some(72), Some(1_000_000), sent_id, RetainFlag::Retain)
            .await
            .unwrap();
        assert_eq!(result.removed, 10);
        assert_eq!(result.unsent_retained, 40);
    }

    /// "Purge age path": a storage-reported `Conflict` on the age pass is a
    /// non-fatal deferral, not a task failure — the full `run` returns
    /// `Ok(())` rather than propagating the conflict.
    #[tokio::test]
    async fn conflict_from_storage_defers_the_whole_run_without_failing() {
        let (server, _storage) = mock_storage("72", "1000000", "false", 0).await;
        let address = server.address();

        Mock::given(method("PUT"))
            .and(path("/storage/reading/purge"))
            .and(query_param("age", "72"))
            .respond_with(ResponseTemplate::new(409).set_body_string("purge already in progress"))
            .mount(&server)
            .await;

        let cli = Cli {
            port: address.port(),
            address: address.ip().to_string(),
            debug_level: 0,
        };
        assert!(run(cli).await.is_ok());
    }
}

async fn audit_purge(storage: &StorageClient, result: &foglamp_storage::PurgeResult) {
    let entry = AuditEntry::new(
        "PURGE",
        AuditLevel::Info,
        json!({
            "readings": result.readings,
            "removed": result.removed,
            "unsentPurged": result.unsent_purged,
            "unsentRetained": result.unsent_retained,
        }),
    );
    let payload = json!({
        "code": entry.code,
        "level": entry.level,
        "data": entry.data,
        "ts": entry.ts,
    });
    if let Err(e) = storage.insert_into_tbl("log", payload).await {
        warn!(error = %e, "failed to write PURGE audit entry");
    }
}
