//! Unified error taxonomy for the plugin contract and the sending process.
//!
//! Storage- and configuration-specific errors live in their own crates
//! (`foglamp-storage::StorageError`, `foglamp-config::ConfigError`); this
//! module only carries the errors that are intrinsic to `foglamp-core`
//! itself — the plugin contract and command-line / stream validation.

use thiserror::Error;

/// Errors surfaced by a north plugin's `init`/`send`/`shutdown` lifecycle.
#[derive(Debug, Clone, Error)]
pub enum PluginError {
    /// `init` failed; fatal to the owning Sending Process.
    #[error("plugin initialization failed: {0}")]
    InitFailed(String),

    /// `send` failed after the plugin's own internal retry.
    #[error("plugin failed to send batch: {0}")]
    SendFailed(String),

    /// `shutdown` did not complete within its bound.
    #[error("plugin shutdown timed out: {0}")]
    ShutdownTimeout(String),

    /// No plugin is registered under the requested name.
    #[error("unknown north plugin: {0}")]
    Unknown(String),

    /// A plugin's `info()` is not acceptable to the Sending Process
    /// (wrong `type`, or the sentinel empty-plugin name).
    #[error("plugin '{0}' is not a usable north plugin")]
    NotAcceptable(String),
}

/// Startup/validation errors, fatal unless explicitly noted otherwise.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// A required command-line parameter was missing or malformed.
    #[error("bad command line: {0}")]
    BadCommandLine(String),

    /// The referenced stream id does not exist, or exists more than once.
    #[error("stream {0} not found")]
    StreamNotFound(i32),

    /// `register_interest`/`unregister_interest` given an unresolvable
    /// callback reference.
    #[error("unknown callback")]
    UnknownCallback,

    /// A configuration category failed schema validation.
    #[error("invalid category schema: {0}")]
    InvalidSchema(String),
}

/// A JSON filter (transform stage) failed to evaluate.
#[derive(Debug, Clone, Error)]
#[error("filter rule failed: {0}")]
pub struct TransformError(pub String);
