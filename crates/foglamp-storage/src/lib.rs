//! Typed async client for the FogLAMP storage service's tabular HTTP API.

pub mod client;
pub mod error;
pub mod payload;

pub use client::{PurgeResult, QueryResult, RetainFlag, StorageClient};
pub use error::StorageError;
pub use payload::PayloadBuilder;
