//! The north plugin contract (`SPEC_FULL.md` §4.1) and its registry.
//!
//! Modeled on the teacher's `Adapter`/`AdapterBridge` split
//! (`alloy-core::adapter`): a stateless descriptor type (`NorthPlugin`,
//! analogous to `Adapter`) paired with a live, per-run handle
//! (`NorthPluginHandle`, analogous to a connected bot) produced by `init`.
//! The registry binds config-selected names to boxed plugins the way the
//! teacher's `alloy-framework::manager::PluginManager` binds plugin names to
//! `Plugin` instances — simplified here because exactly one plugin is active
//! per Sending Process and there is no inter-plugin dependency graph to
//! topologically sort.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::error::PluginError;
use crate::model::ReadingBatch;

/// The sentinel name the Sending Process rejects (`SPEC_FULL.md` §4.1).
pub const EMPTY_NORTH_PLUGIN: &str = "Empty North Plugin";

/// Static metadata returned by `NorthPlugin::info`.
#[derive(Debug, Clone)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub plugin_type: String,
    pub interface: String,
    pub config_schema: Value,
}

impl PluginInfo {
    /// Whether the Sending Process should accept this plugin: `type` must be
    /// `"north"` and `name` must not be the sentinel empty plugin.
    pub fn is_acceptable(&self) -> bool {
        self.plugin_type == "north" && self.name != EMPTY_NORTH_PLUGIN
    }
}

/// The outcome of one `send` call: `(sent_ok, new_last_object_id, num_sent)`.
#[derive(Debug, Clone, Copy)]
pub struct SendOutcome {
    pub sent_ok: bool,
    pub new_last_object_id: i64,
    pub num_sent: usize,
}

/// The plugin's validated, merged configuration handed to `init`.
#[derive(Debug, Clone)]
pub struct PluginInitConfig {
    pub stream_id: i32,
    pub items: HashMap<String, String>,
}

impl PluginInitConfig {
    pub fn item(&self, name: &str) -> Option<&str> {
        self.items.get(name).map(String::as_str)
    }
}

/// A live plugin instance bound to one Sending Process run.
///
/// `send` may be called many times across the run's lifetime; `shutdown` is
/// called at most once, after the last `send`.
#[async_trait]
pub trait NorthPluginHandle: Send + Sync {
    async fn send(
        &self,
        batch: &ReadingBatch,
        stream_id: i32,
    ) -> Result<SendOutcome, PluginError>;

    async fn shutdown(&self) -> Result<(), PluginError>;
}

/// A north plugin implementation, named and versioned, constructible from a
/// validated configuration.
#[async_trait]
pub trait NorthPlugin: Send + Sync {
    fn info(&self) -> PluginInfo;

    async fn init(
        &self,
        config: PluginInitConfig,
    ) -> Result<Box<dyn NorthPluginHandle>, PluginError>;
}

/// A factory that produces a fresh `NorthPlugin` instance for each lookup.
type PluginFactory = Arc<dyn Fn() -> Box<dyn NorthPlugin> + Send + Sync>;

/// Binds configuration-selected plugin names (the `north` config item) to
/// plugin factories.
#[derive(Clone, Default)]
pub struct NorthPluginRegistry {
    factories: HashMap<String, PluginFactory>,
}

impl NorthPluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a plugin factory under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn NorthPlugin> + Send + Sync + 'static,
    {
        let name = name.into();
        debug!(plugin = %name, "registered north plugin");
        self.factories.insert(name, Arc::new(factory));
    }

    /// Instantiates the plugin named by the `north` config item.
    ///
    /// Fails with `PluginError::Unknown` if no factory is registered, or
    /// `PluginError::NotAcceptable` if the instantiated plugin's `info()`
    /// is not a usable north plugin.
    pub fn load(&self, name: &str) -> Result<Box<dyn NorthPlugin>, PluginError> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| PluginError::Unknown(name.to_string()))?;
        let plugin = factory();
        if !plugin.info().is_acceptable() {
            return Err(PluginError::NotAcceptable(name.to_string()));
        }
        Ok(plugin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeHandle;

    #[async_trait]
    impl NorthPluginHandle for FakeHandle {
        async fn send(
            &self,
            batch: &ReadingBatch,
            _stream_id: i32,
        ) -> Result<SendOutcome, PluginError> {
            Ok(SendOutcome {
                sent_ok: true,
                new_last_object_id: batch.last_id().unwrap_or(0),
                num_sent: batch.len(),
            })
        }

        async fn shutdown(&self) -> Result<(), PluginError> {
            Ok(())
        }
    }

    struct FakePlugin;

    #[async_trait]
    impl NorthPlugin for FakePlugin {
        fn info(&self) -> PluginInfo {
            PluginInfo {
                name: "fake".into(),
                version: "1.0.0".into(),
                plugin_type: "north".into(),
                interface: "1.0".into(),
                config_schema: Value::Null,
            }
        }

        async fn init(
            &self,
            _config: PluginInitConfig,
        ) -> Result<Box<dyn NorthPluginHandle>, PluginError> {
            Ok(Box::new(FakeHandle))
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        let registry = NorthPluginRegistry::new();
        assert!(matches!(
            registry.load("nope"),
            Err(PluginError::Unknown(_))
        ));
    }

    #[test]
    fn sentinel_empty_plugin_is_rejected() {
        struct EmptyPlugin;
        #[async_trait]
        impl NorthPlugin for EmptyPlugin {
            fn info(&self) -> PluginInfo {
                PluginInfo {
                    name: EMPTY_NORTH_PLUGIN.into(),
                    version: "0.0.0".into(),
                    plugin_type: "north".into(),
                    interface: "1.0".into(),
                    config_schema: Value::Null,
                }
            }
            async fn init(
                &self,
                _config: PluginInitConfig,
            ) -> Result<Box<dyn NorthPluginHandle>, PluginError> {
                unreachable!()
            }
        }

        let mut registry = NorthPluginRegistry::new();
        registry.register("empty", || Box::new(EmptyPlugin));
        assert!(matches!(
            registry.load("empty"),
            Err(PluginError::NotAcceptable(_))
        ));
    }

    #[test]
    fn registered_plugin_loads() {
        let mut registry = NorthPluginRegistry::new();
        registry.register("fake", || Box::new(FakePlugin));
        assert!(registry.load("fake").is_ok());
    }
}
