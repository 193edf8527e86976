//! `ConfigurationManager`: the configuration category registry.
//!
//! Owns no process-wide mutable state of its own beyond the observer map —
//! categories live in the storage service's `configuration` table. Modeled
//! as an explicit dependency-injected service constructed once at process
//! start (per `spec.md` §9's "Global singletons" design note), the way the
//! teacher's `PluginManager` is constructed once by the runtime and handed
//! around as an `Arc`.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use futures::FutureExt;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::{error, warn};

use foglamp_core::{AuditEntry, AuditLevel, ConfigCategory, ConfigError, ConfigItem};
use foglamp_storage::{PayloadBuilder, StorageClient, StorageError};

use crate::merge::merge_category_vals;
use crate::observer::CategoryObserver;
use crate::validate::validate_category_val;

const CONFIGURATION_TABLE: &str = "configuration";
const LOG_TABLE: &str = "log";

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        ConfigError::InvalidSchema(format!("storage error: {e}"))
    }
}

/// Owns the category registry and the observer map.
pub struct ConfigurationManager {
    storage: StorageClient,
    observers: RwLock<HashMap<String, Vec<Arc<dyn CategoryObserver>>>>,
}

impl ConfigurationManager {
    /// Constructs the manager against a storage client. Per the "Global
    /// singletons" design note, there is no default construction path —
    /// a storage client is mandatory.
    pub fn new(storage: StorageClient) -> Self {
        Self {
            storage,
            observers: RwLock::new(HashMap::new()),
        }
    }

    async fn fetch_stored(&self, name: &str) -> Result<Option<ConfigCategory>, ConfigError> {
        let payload = PayloadBuilder::new()
            .where_cond("key", "=", json!(name))
            .build();
        let result = self
            .storage
            .query_tbl_with_payload(CONFIGURATION_TABLE, payload)
            .await?;
        match result.rows.into_iter().next() {
            Some(row) => {
                let description = row["description"].as_str().unwrap_or_default().to_string();
                let items: BTreeMap<String, ConfigItem> =
                    serde_json::from_value(row["value"].clone())
                        .map_err(|e| ConfigError::InvalidSchema(e.to_string()))?;
                Ok(Some(ConfigCategory {
                    name: name.to_string(),
                    description,
                    items,
                }))
            }
            None => Ok(None),
        }
    }

    async fn persist(&self, category: &ConfigCategory, existed: bool) -> Result<(), ConfigError> {
        let payload = json!({
            "key": category.name,
            "description": category.description,
            "value": category.items,
        });
        if existed {
            let update = PayloadBuilder::new()
                .where_cond("key", "=", json!(category.name))
                .set("description", json!(category.description))
                .set("value", json!(category.items))
                .build();
            self.storage.update_tbl(CONFIGURATION_TABLE, update).await?;
        } else {
            self.storage.insert_into_tbl(CONFIGURATION_TABLE, payload).await?;
        }
        Ok(())
    }

    async fn audit(&self, code: &str, level: AuditLevel, data: Value) {
        let entry = AuditEntry::new(code, level, data);
        let payload = json!({
            "code": entry.code,
            "level": entry.level,
            "data": entry.data,
            "ts": entry.ts,
        });
        if let Err(e) = self.storage.insert_into_tbl(LOG_TABLE, payload).await {
            warn!(code = %code, error = %e, "failed to write audit entry");
        }
    }

    /// Validates `schema`, then creates the category if absent, or merges
    /// it against the persisted value and updates only when the merge
    /// changes anything.
    ///
    /// A `CONAD` audit entry is emitted only on first creation — merging an
    /// existing category's schema is a structural upgrade, not an item
    /// change, so it does not itself emit `CONCH`; `set_category_item_value_entry`
    /// is the sole source of `CONCH` entries.
    pub async fn create_category(
        &self,
        name: &str,
        schema: Value,
        description: &str,
        keep_original_items: bool,
    ) -> Result<(), ConfigError> {
        let new_items = validate_category_val(&schema, true)?;

        match self.fetch_stored(name).await? {
            None => {
                let category = ConfigCategory {
                    name: name.to_string(),
                    description: description.to_string(),
                    items: new_items,
                };
                self.persist(&category, false).await?;
                self.audit(
                    "CONAD",
                    AuditLevel::Info,
                    json!({ "category": name }),
                )
                .await;
            }
            Some(stored) => {
                let merged = merge_category_vals(&new_items, &stored.items, keep_original_items);
                if merged != stored.items {
                    let category = ConfigCategory {
                        name: name.to_string(),
                        description: description.to_string(),
                        items: merged,
                    };
                    self.persist(&category, true).await?;
                }
            }
        }
        Ok(())
    }

    /// Returns `(name, description)` for every known category.
    pub async fn get_all_category_names(&self) -> Result<Vec<(String, String)>, ConfigError> {
        let payload = PayloadBuilder::new().order_by("key", false).build();
        let result = self
            .storage
            .query_tbl_with_payload(CONFIGURATION_TABLE, payload)
            .await?;
        Ok(result
            .rows
            .into_iter()
            .map(|row| {
                (
                    row["key"].as_str().unwrap_or_default().to_string(),
                    row["description"].as_str().unwrap_or_default().to_string(),
                )
            })
            .collect())
    }

    pub async fn get_category_all_items(
        &self,
        name: &str,
    ) -> Result<BTreeMap<String, ConfigItem>, ConfigError> {
        let stored = self
            .fetch_stored(name)
            .await?
            .ok_or_else(|| ConfigError::InvalidSchema(format!("category '{name}' not found")))?;
        Ok(stored.items)
    }

    pub async fn get_category_item(
        &self,
        name: &str,
        item: &str,
    ) -> Result<ConfigItem, ConfigError> {
        let items = self.get_category_all_items(name).await?;
        items
            .get(item)
            .cloned()
            .ok_or_else(|| ConfigError::InvalidSchema(format!("item '{item}' not found in '{name}'")))
    }

    pub async fn get_category_item_value_entry(
        &self,
        name: &str,
        item: &str,
    ) -> Result<String, ConfigError> {
        let entry = self.get_category_item(name, item).await?;
        Ok(entry.effective_value().to_string())
    }

    /// Updates one item's value. A no-op if the new value matches the
    /// current one; otherwise persists the change, emits `CONCH`, and runs
    /// every registered observer for the category.
    pub async fn set_category_item_value_entry(
        &self,
        name: &str,
        item: &str,
        new_value: &str,
    ) -> Result<(), ConfigError> {
        let mut stored = self
            .fetch_stored(name)
            .await?
            .ok_or_else(|| ConfigError::InvalidSchema(format!("category '{name}' not found")))?;

        let Some(config_item) = stored.items.get_mut(item) else {
            return Err(ConfigError::InvalidSchema(format!(
                "item '{item}' not found in '{name}'"
            )));
        };

        let old_value = config_item.effective_value().to_string();
        if old_value == new_value {
            return Ok(());
        }

        config_item.value = Some(new_value.to_string());
        self.persist(&stored, true).await?;
        self.audit(
            "CONCH",
            AuditLevel::Info,
            json!({
                "category": name,
                "item": item,
                "oldValue": old_value,
                "newValue": new_value,
            }),
        )
        .await;

        self.run_callbacks(name).await;
        Ok(())
    }

    async fn run_callbacks(&self, category: &str) {
        let observers = self.observers.read().await;
        let Some(list) = observers.get(category) else {
            return;
        };
        for observer in list {
            let observer = observer.clone();
            let category = category.to_string();
            // Each callback is isolated: a panic or async error from one
            // must not prevent its siblings from running, matching the
            // teacher's per-handler isolation in plugin dispatch.
            let result = std::panic::AssertUnwindSafe(observer.run(&category))
                .catch_unwind()
                .await;
            if let Err(panic) = result {
                error!(category = %category, ?panic, "category observer panicked");
            }
        }
    }

    /// Registers `observer` for notifications on `name`.
    pub async fn register_interest(&self, name: &str, observer: Arc<dyn CategoryObserver>) {
        self.observers
            .write()
            .await
            .entry(name.to_string())
            .or_default()
            .push(observer);
    }

    /// Removes a previously registered observer, matched by pointer
    /// identity. Fails with `ConfigError::UnknownCallback` if it was never
    /// registered for `name`.
    pub async fn unregister_interest(
        &self,
        name: &str,
        observer: &Arc<dyn CategoryObserver>,
    ) -> Result<(), ConfigError> {
        let mut observers = self.observers.write().await;
        let Some(list) = observers.get_mut(name) else {
            return Err(ConfigError::UnknownCallback);
        };
        let before = list.len();
        list.retain(|o| !Arc::ptr_eq(o, observer));
        if list.len() == before {
            return Err(ConfigError::UnknownCallback);
        }
        Ok(())
    }
}
