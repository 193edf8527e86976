use thiserror::Error;

#[derive(Debug, Error)]
pub enum PurgeTaskError {
    #[error(transparent)]
    Config(#[from] foglamp_core::ConfigError),

    #[error(transparent)]
    Storage(#[from] foglamp_storage::StorageError),
}
