//! Domain types shared by every FogLAMP component.
//!
//! These mirror the tables the storage service owns (`readings`, `streams`,
//! `configuration`, `statistics`, `log`) — see the data model in
//! `SPEC_FULL.md` §3.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single sensor reading, as stored in the `readings` table.
///
/// `id` is monotone per storage instance once assigned; gaps between ids are
/// allowed and carry no meaning. `user_ts` is immutable once the reading is
/// produced.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reading {
    pub id: i64,
    pub asset_code: String,
    pub read_key: String,
    pub user_ts: DateTime<Utc>,
    pub reading: BTreeMap<String, Value>,
}

/// An ordered, size-bounded slice of readings delivered to a plugin atomically.
///
/// Invariant: `readings` is sorted by strictly increasing `id`; this is
/// upheld by the fetcher (§4.4) and never re-checked downstream.
#[derive(Debug, Clone, Default)]
pub struct ReadingBatch {
    pub readings: Vec<Reading>,
}

impl ReadingBatch {
    pub fn new(readings: Vec<Reading>) -> Self {
        Self { readings }
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    /// The id of the last reading in the batch, if any.
    pub fn last_id(&self) -> Option<i64> {
        self.readings.last().map(|r| r.id)
    }

    /// The id of the first reading in the batch, if any.
    pub fn first_id(&self) -> Option<i64> {
        self.readings.first().map(|r| r.id)
    }
}

/// Per-stream delivery progress, the `streams` table.
///
/// `last_object` is the largest reading id known to have been forwarded on
/// this stream; it is monotonically non-decreasing over the stream's
/// lifetime (invariant 1 in `SPEC_FULL.md` §8).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stream {
    pub id: i32,
    pub name: String,
    pub active: bool,
    pub last_object: i64,
    pub ts: DateTime<Utc>,
}

/// The fixed set of configuration item types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemType {
    #[serde(rename = "boolean")]
    Boolean,
    #[serde(rename = "integer")]
    Integer,
    #[serde(rename = "string")]
    String,
    #[serde(rename = "IPv4")]
    IPv4,
    #[serde(rename = "IPv6")]
    IPv6,
    #[serde(rename = "X509 certificate")]
    X509Certificate,
    #[serde(rename = "JSON")]
    Json,
}

/// A single configuration item inside a category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigItem {
    pub description: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    pub default: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ConfigItem {
    /// The effective setting: `value` if present, else `default`.
    pub fn effective_value(&self) -> &str {
        self.value.as_deref().unwrap_or(&self.default)
    }
}

/// A named, versioned group of configuration items.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigCategory {
    pub name: String,
    pub description: String,
    pub items: BTreeMap<String, ConfigItem>,
}

/// A monotonic counter tracked by the storage service's `statistics` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Statistic {
    pub key: String,
    pub description: String,
    pub value: i64,
    pub previous_value: i64,
    pub ts: DateTime<Utc>,
}

/// Audit entry severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditLevel {
    #[serde(rename = "INFO")]
    Info,
    #[serde(rename = "WARN")]
    Warn,
    #[serde(rename = "FAIL")]
    Fail,
}

/// An append-only audit record, the `log` table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditEntry {
    pub code: String,
    pub level: AuditLevel,
    pub data: Value,
    pub ts: DateTime<Utc>,
}

impl AuditEntry {
    /// Builds an entry, normalizing `ts` to now.
    ///
    /// # Panics
    /// Panics if `code` is not 4–5 ASCII characters, matching the invariant
    /// in `SPEC_FULL.md` §3 — callers always pass a literal audit code, so
    /// this can never trigger outside of a programming error.
    pub fn new(code: &str, level: AuditLevel, data: Value) -> Self {
        assert!(
            (4..=5).contains(&code.len()) && code.is_ascii(),
            "audit code must be 4-5 ASCII characters, got {code:?}"
        );
        Self {
            code: code.to_string(),
            level,
            data,
            ts: Utc::now(),
        }
    }
}
