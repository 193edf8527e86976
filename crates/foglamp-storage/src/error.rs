//! Error taxonomy for the storage service client.

use thiserror::Error;

/// Errors surfaced by `StorageClient`.
///
/// `SPEC_FULL.md` §7 splits storage failures into two buckets: transport
/// failures the caller should retry with backoff, and an in-band semantic
/// rejection (409 from `purge`) that is non-fatal but not simply "try again
/// immediately".
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// Connection, timeout, or non-2xx response other than 409.
    #[error("storage transport error: {0}")]
    Transient(String),

    /// HTTP 409 — a semantic rejection such as a concurrent purge conflict.
    #[error("storage conflict: {0}")]
    Conflict(String),

    /// The response body did not match the expected shape.
    #[error("malformed storage response: {0}")]
    Malformed(String),
}

impl StorageError {
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status == reqwest::StatusCode::CONFLICT {
            StorageError::Conflict(body)
        } else {
            StorageError::Transient(format!("HTTP {}: {body}", status.as_u16()))
        }
    }
}
