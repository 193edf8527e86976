//! `_validate_category_val`: schema validation for a configuration category
//! supplied to `create_category`.

use std::collections::BTreeMap;

use serde_json::Value;

use foglamp_core::{ConfigError, ConfigItem, ItemType};

const REQUIRED_KEYS: [&str; 3] = ["description", "type", "default"];
const ALL_KEYS: [&str; 4] = ["description", "type", "default", "value"];

/// Validates a raw category schema (a mapping of item name → item mapping)
/// and returns the typed items.
///
/// `set_value_from_default`: when true, every item's effective value is
/// derived from its `default` and an explicit `value` entry is rejected;
/// when false, every item must carry its own `value`.
pub fn validate_category_val(
    schema: &Value,
    set_value_from_default: bool,
) -> Result<BTreeMap<String, ConfigItem>, ConfigError> {
    let obj = schema
        .as_object()
        .ok_or_else(|| ConfigError::InvalidSchema("category schema must be a mapping".into()))?;

    let mut items = BTreeMap::new();
    for (item_name, item_val) in obj {
        let item_obj = item_val.as_object().ok_or_else(|| {
            ConfigError::InvalidSchema(format!("item '{item_name}' must be a mapping"))
        })?;

        for key in item_obj.keys() {
            if !ALL_KEYS.contains(&key.as_str()) {
                return Err(ConfigError::InvalidSchema(format!(
                    "item '{item_name}' has unknown entry '{key}'"
                )));
            }
        }

        for key in REQUIRED_KEYS {
            match item_obj.get(key) {
                Some(Value::String(_)) => {}
                Some(_) => {
                    return Err(ConfigError::InvalidSchema(format!(
                        "item '{item_name}.{key}' must be a string"
                    )));
                }
                None => {
                    return Err(ConfigError::InvalidSchema(format!(
                        "item '{item_name}' is missing required entry '{key}'"
                    )));
                }
            }
        }

        let description = item_obj["description"].as_str().unwrap().to_string();
        let type_str = item_obj["type"].as_str().unwrap();
        let item_type: ItemType = serde_json::from_value(Value::String(type_str.to_string()))
            .map_err(|_| {
                ConfigError::InvalidSchema(format!(
                    "item '{item_name}' has unrecognized type '{type_str}'"
                ))
            })?;
        let default = item_obj["default"].as_str().unwrap().to_string();

        let has_value = item_obj.contains_key("value");
        if set_value_from_default && has_value {
            return Err(ConfigError::InvalidSchema(format!(
                "item '{item_name}' supplies 'value' but the category derives values from defaults"
            )));
        }
        if !set_value_from_default && !has_value {
            return Err(ConfigError::InvalidSchema(format!(
                "item '{item_name}' is missing required entry 'value'"
            )));
        }

        let value = if set_value_from_default {
            Some(default.clone())
        } else {
            match &item_obj["value"] {
                Value::String(s) => Some(s.clone()),
                _ => {
                    return Err(ConfigError::InvalidSchema(format!(
                        "item '{item_name}.value' must be a string"
                    )));
                }
            }
        };

        items.insert(
            item_name.clone(),
            ConfigItem {
                description,
                item_type,
                default,
                value,
            },
        );
    }

    Ok(items)
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_non_mapping_schema() {
        let err = validate_category_val(&json!("not a map"), true).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSchema(_)));
    }

    #[test]
    fn rejects_unknown_entry_names() {
        let schema = json!({
            "x": { "description": "d", "type": "integer", "default": "1", "units": "kg" }
        });
        let err = validate_category_val(&schema, true).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSchema(_)));
    }

    #[test]
    fn rejects_bad_type() {
        let schema = json!({
            "x": { "description": "d", "type": "float", "default": "1" }
        });
        assert!(validate_category_val(&schema, true).is_err());
    }

    #[test]
    fn set_value_from_default_rejects_explicit_value() {
        let schema = json!({
            "x": { "description": "d", "type": "integer", "default": "1", "value": "2" }
        });
        assert!(validate_category_val(&schema, true).is_err());
    }

    #[test]
    fn requires_value_when_not_derived_from_default() {
        let schema = json!({
            "x": { "description": "d", "type": "integer", "default": "1" }
        });
        assert!(validate_category_val(&schema, false).is_err());
    }

    #[test]
    fn accepts_well_formed_schema() {
        let schema = json!({
            "x": { "description": "d", "type": "integer", "default": "1" }
        });
        let items = validate_category_val(&schema, true).unwrap();
        assert_eq!(items["x"].value.as_deref(), Some("1"));
    }
}
