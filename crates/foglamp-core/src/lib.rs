//! Domain model, error taxonomy, plugin contract, and fetch/send primitives
//! shared across every FogLAMP crate.

pub mod error;
pub mod model;
pub mod plugin;
pub mod retry;
pub mod ring;
pub mod wire;

pub use error::{ConfigError, PluginError, TransformError};
pub use model::{
    AuditEntry, AuditLevel, ConfigCategory, ConfigItem, ItemType, Reading, ReadingBatch,
    Statistic, Stream,
};
pub use plugin::{
    NorthPlugin, NorthPluginHandle, NorthPluginRegistry, PluginInfo, PluginInitConfig,
    SendOutcome, EMPTY_NORTH_PLUGIN,
};
pub use retry::{Backoff, MaxAttempts, RetrySchedule, TASK_SLEEP_MAX_INCREMENTS};
pub use ring::FetchSendRing;
pub use wire::normalize_timestamp;
