//! Standalone HTTP South listener binary: ingests readings from south-side
//! collectors into storage, with host/port reconfigured live from the
//! `HTTP_SOUTH` category (`spec.md` §4.6).

mod cli;
mod ingest;
mod reconfigure;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;
use tracing::info;

use foglamp_config::ConfigurationManager;
use foglamp_plugin_http_south::HttpSouthListener;
use foglamp_runtime::{level_from_debug_flag, wait_for_shutdown_signal, LoggingBuilder};
use foglamp_storage::StorageClient;

use crate::cli::Cli;
use crate::ingest::StorageIngressSink;
use crate::reconfigure::{config_from_items, default_schema, ReconfigureOnChange, HTTP_SOUTH_CATEGORY};

#[derive(Debug, Error)]
enum HttpSouthError {
    #[error(transparent)]
    Config(#[from] foglamp_core::ConfigError),
    #[error(transparent)]
    Storage(#[from] foglamp_storage::StorageError),
    #[error("listener configuration: {0}")]
    Listener(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
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
            tracing::error!(error = %e, "HTTP South listener terminated");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), HttpSouthError> {
    let storage = Arc::new(StorageClient::connect(&cli.address, cli.port)?);
    let config_manager = Arc::new(ConfigurationManager::new((*storage).clone()));

    config_manager
        .create_category(HTTP_SOUTH_CATEGORY, default_schema(), "HTTP South listener configuration", true)
        .await?;
    let items = config_manager.get_category_all_items(HTTP_SOUTH_CATEGORY).await?;
    let listener_config = config_from_items(&items).map_err(HttpSouthError::Listener)?;

    let sink = StorageIngressSink::spawn(Arc::clone(&storage));
    let listener = Arc::new(HttpSouthListener::new(Arc::new(sink)));
    listener.start(listener_config).await?;
    info!("HTTP South listener started");

    config_manager
        .register_interest(
            HTTP_SOUTH_CATEGORY,
            Arc::new(ReconfigureOnChange {
                config_manager: Arc::clone(&config_manager),
                listener: Arc::clone(&listener),
            }),
        )
        .await;

    wait_for_shutdown_signal().await;
    listener.stop().await;
    Ok(())
}
