//! The umbrella error for the Sending Process binary: composes every lower
//! crate's error into one type via `#[from]`, the way the teacher composes
//! `TransportError`/`AdapterError`/`ConfigError` under one top-level enum
//! at the binary boundary.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SendingProcessError {
    #[error(transparent)]
    Config(#[from] foglamp_core::ConfigError),

    #[error(transparent)]
    Plugin(#[from] foglamp_core::PluginError),

    #[error(transparent)]
    Storage(#[from] foglamp_storage::StorageError),

    #[error(transparent)]
    Transform(#[from] foglamp_core::TransformError),
}
