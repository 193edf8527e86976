//! The ingress boundary between the HTTP handler and whatever buffers
//! incoming readings for the south-side store (out of scope per
//! `spec.md` §1 — specified only as a collaborator interface).

use async_trait::async_trait;
use serde_json::Map;
use serde_json::Value;

/// One parsed reading from a south POST body.
#[derive(Debug, Clone)]
pub struct IncomingReading {
    pub timestamp: String,
    pub asset: String,
    pub key: String,
    pub readings: Map<String, Value>,
}

/// Whether the ingress buffer accepted the reading or signalled
/// back-pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    Accepted,
    Busy,
}

/// Accepts parsed readings on behalf of whatever south-side buffering
/// mechanism is configured (out of scope; a fake in tests, the real
/// ingress buffer in production).
#[async_trait]
pub trait IngressSink: Send + Sync {
    async fn try_enqueue(&self, reading: IncomingReading) -> EnqueueOutcome;
}
