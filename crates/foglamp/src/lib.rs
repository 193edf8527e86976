//! Re-export facade over the FogLAMP crates, the way the teacher's `alloy`
//! crate bundles `alloy-core`/`alloy-framework`/`alloy-runtime` behind one
//! dependency with feature-gated extras.

pub use foglamp_config as config;
pub use foglamp_core as core;
pub use foglamp_runtime as runtime;
pub use foglamp_storage as storage;
pub use foglamp_transform as transform;

#[cfg(feature = "http-north")]
pub use foglamp_plugin_http_north as http_north;

#[cfg(feature = "http-south")]
pub use foglamp_plugin_http_south as http_south;

/// Common imports for building a north plugin or a Sending Process driver.
pub mod prelude {
    pub use foglamp_core::{
        AuditEntry, AuditLevel, ConfigCategory, ConfigError, ConfigItem, FetchSendRing, ItemType,
        NorthPlugin, NorthPluginHandle, NorthPluginRegistry, PluginError, PluginInfo,
        PluginInitConfig, Reading, ReadingBatch, SendOutcome, Statistic, Stream, TransformError,
    };
    pub use foglamp_config::{CategoryObserver, ConfigurationManager};
    pub use foglamp_storage::{PayloadBuilder, StorageClient, StorageError};
}
