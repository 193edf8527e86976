//! Wires the `HTTP_SOUTH` category's live `host`/`port` reconfiguration
//! (`spec.md` §4.6) to `HttpSouthListener::reconfigure` through a
//! `CategoryObserver`.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tracing::warn;

use foglamp_config::{CategoryObserver, ConfigurationManager};
use foglamp_core::ConfigItem;
use foglamp_plugin_http_south::{HttpSouthConfig, HttpSouthListener};

pub const HTTP_SOUTH_CATEGORY: &str = "HTTP_SOUTH";

pub fn default_schema() -> serde_json::Value {
    json!({
        "host": {
            "description": "interface the listener binds to",
            "type": "string",
            "default": "0.0.0.0",
        },
        "port": {
            "description": "port the listener binds to",
            "type": "integer",
            "default": "6683",
        },
        "uri": {
            "description": "path readings are POSTed to",
            "type": "string",
            "default": "/sensor-reading",
        },
    })
}

pub fn config_from_items(
    items: &std::collections::BTreeMap<String, ConfigItem>,
) -> Result<HttpSouthConfig, String> {
    let get = |name: &str| {
        items
            .get(name)
            .map(ConfigItem::effective_value)
            .ok_or_else(|| format!("missing item '{name}'"))
    };
    Ok(HttpSouthConfig {
        host: get("host")?.to_string(),
        port: get("port")?.parse().map_err(|e| format!("port: {e}"))?,
        uri: get("uri")?.to_string(),
    })
}

pub struct ReconfigureOnChange {
    pub config_manager: Arc<ConfigurationManager>,
    pub listener: Arc<HttpSouthListener>,
}

#[async_trait]
impl CategoryObserver for ReconfigureOnChange {
    async fn run(&self, category: &str) {
        let items = match self.config_manager.get_category_all_items(category).await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "failed to reload HTTP_SOUTH configuration");
                return;
            }
        };
        let config = match config_from_items(&items) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "invalid HTTP_SOUTH configuration, keeping current listener");
                return;
            }
        };
        if let Err(e) = self.listener.reconfigure(config).await {
            warn!(error = %e, "failed to rebind HTTP South listener");
        }
    }
}
