//! The Sending Process: fetches unsent rows for one stream and forwards
//! them through a configured north plugin, per `spec.md` §4.4.

mod audit;
mod cli;
mod config;
mod error;
mod fetcher;
mod sender;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, info_span, Instrument};

use foglamp_config::ConfigurationManager;
use foglamp_core::{NorthPluginRegistry, PluginInitConfig};
use foglamp_runtime::{level_from_debug_flag, wait_for_shutdown_signal, LoggingBuilder};
use foglamp_storage::StorageClient;
use foglamp_transform::FilterEngine;

use crate::cli::Cli;
use crate::config::SendingProcessConfig;
use crate::error::SendingProcessError;

fn plugin_registry() -> NorthPluginRegistry {
    let mut registry = NorthPluginRegistry::new();
    registry.register("http_north", || Box::new(foglamp_plugin_http_north::HttpNorthPlugin));
    registry
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
            error!(error = %e, "sending process terminated");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), SendingProcessError> {
    let storage = Arc::new(StorageClient::connect(&cli.address, cli.port)?);

    let stream_row = storage
        .fetch_stream(cli.stream_id)
        .await?
        .ok_or(foglamp_core::ConfigError::StreamNotFound(cli.stream_id))?;
    if !stream_row["active"].as_bool().unwrap_or(true) {
        info!(stream_id = cli.stream_id, "stream is inactive, exiting cleanly");
        return Ok(());
    }

    let config_manager = ConfigurationManager::new((*storage).clone());
    let category_name = format!("SEND_PR_{}", cli.stream_id);
    config_manager
        .create_category(
            &category_name,
            config::default_schema(cli.stream_id),
            "Sending Process configuration",
            true,
        )
        .await?;

    let items = config_manager.get_category_all_items(&category_name).await?;
    let process_config = SendingProcessConfig::from_items(&items)?;
    if !process_config.enable {
        info!(stream_id = cli.stream_id, "sending process disabled, exiting cleanly");
        return Ok(());
    }

    let registry = plugin_registry();
    let plugin = registry.load(&process_config.north)?;

    // Second pass: merge the plugin's own schema into the category so its
    // items (url, timeout, max_attempts, ...) are persisted alongside ours,
    // then build its init config from the merged, effective values.
    config_manager
        .create_category(
            &category_name,
            plugin.info().config_schema,
            "Sending Process configuration",
            true,
        )
        .await?;
    let merged_items = config_manager.get_category_all_items(&category_name).await?;
    let plugin_items = merged_items
        .iter()
        .map(|(k, v)| (k.clone(), v.effective_value().to_string()))
        .collect();
    let handle = plugin
        .init(PluginInitConfig {
            stream_id: cli.stream_id,
            items: plugin_items,
        })
        .await?;

    let filter = if process_config.apply_filter {
        Some(Arc::new(FilterEngine::compile(&process_config.filter_rule)?))
    } else {
        None
    };

    let ring = foglamp_core::FetchSendRing::new(process_config.memory_buffer_size);
    let (stop_tx, stop_rx) = watch::channel(false);
    let process_name = cli.name.clone();
    let span = info_span!("sending_process", name = process_name.as_deref().unwrap_or("sending_process"));

    let fetcher_handle = tokio::spawn(
        fetcher::run(fetcher::FetcherArgs {
            storage: Arc::clone(&storage),
            ring: ring.clone(),
            stream_id: cli.stream_id,
            source: process_config.source,
            block_size: process_config.block_size,
            filter,
            stop_rx: stop_rx.clone(),
            process_name: process_name.clone(),
        })
        .instrument(span.clone()),
    );

    let sender_handle = tokio::spawn(
        sender::run(sender::SenderArgs {
            storage: Arc::clone(&storage),
            ring,
            plugin: handle,
            stream_id: cli.stream_id,
            stop_rx: stop_rx.clone(),
            process_name: process_name.clone(),
            performance_log: cli.performance_log,
        })
        .instrument(span),
    );

    let duration = process_config.duration;
    tokio::select! {
        _ = tokio::time::sleep(duration) => {
            info!(stream_id = cli.stream_id, "run duration elapsed");
        }
        _ = wait_for_shutdown_signal() => {}
        _ = parent_tick(process_config.sleep_interval, duration) => {}
    }
    let _ = stop_tx.send(true);

    let _ = fetcher_handle.await;
    let _ = sender_handle.await;
    Ok(())
}

/// Parent coroutine: wakes every `sleep_interval` purely so its presence in
/// the `select!` mirrors `spec.md`'s "parent sleeps in sleepInterval
/// increments" description; the actual deadline is `tokio::time::sleep(duration)`
/// racing it in `run`, so this future is expected never to win before either
/// the signal or the duration timer does for any sane `sleep_interval`.
async fn parent_tick(sleep_interval: std::time::Duration, duration: std::time::Duration) {
    let mut elapsed = std::time::Duration::ZERO;
    loop {
        tokio::time::sleep(sleep_interval).await;
        elapsed += sleep_interval;
        if elapsed >= duration {
            return;
        }
    }
}
