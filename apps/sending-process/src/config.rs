//! The `SEND_PR_<stream_id>` category: its default schema and the typed view
//! the run loop actually reads, per `spec.md` §4.4 step 4.

use std::collections::BTreeMap;
use std::time::Duration;

use serde_json::{json, Value};

use foglamp_core::{ConfigError, ConfigItem};

/// The category's default schema, validated with `set_value_from_default`.
pub fn default_schema(stream_id: i32) -> Value {
    json!({
        "enable": {
            "description": "enable this Sending Process",
            "type": "boolean",
            "default": "true",
        },
        "duration": {
            "description": "run duration in seconds",
            "type": "integer",
            "default": "60",
        },
        "sleepInterval": {
            "description": "parent wake interval in seconds",
            "type": "integer",
            "default": "1",
        },
        "source": {
            "description": "data source: readings, statistics, or audit",
            "type": "string",
            "default": "readings",
        },
        "blockSize": {
            "description": "rows fetched per batch",
            "type": "integer",
            "default": "500",
        },
        "memory_buffer_size": {
            "description": "ring buffer slot count",
            "type": "integer",
            "default": "10",
        },
        "north": {
            "description": "north plugin name",
            "type": "string",
            "default": "omf",
        },
        "stream_id": {
            "description": "stream this process sends",
            "type": "integer",
            "default": stream_id.to_string(),
        },
        "applyFilter": {
            "description": "pass batches through filterRule before sending",
            "type": "boolean",
            "default": "false",
        },
        "filterRule": {
            "description": "JQ-style filter expression, used when applyFilter is true",
            "type": "JSON",
            "default": ".",
        },
    })
}

/// The data source a batch is fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Readings,
    Statistics,
    Audit,
}

impl Source {
    fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "readings" => Ok(Source::Readings),
            "statistics" => Ok(Source::Statistics),
            "audit" => Ok(Source::Audit),
            other => Err(ConfigError::InvalidSchema(format!(
                "unknown source '{other}'"
            ))),
        }
    }
}

/// The effective, typed configuration for one run of the Sending Process.
#[derive(Debug, Clone)]
pub struct SendingProcessConfig {
    pub enable: bool,
    pub duration: Duration,
    pub sleep_interval: Duration,
    pub source: Source,
    pub block_size: u32,
    pub memory_buffer_size: usize,
    pub north: String,
    pub apply_filter: bool,
    pub filter_rule: String,
}

impl SendingProcessConfig {
    pub fn from_items(items: &BTreeMap<String, ConfigItem>) -> Result<Self, ConfigError> {
        let get = |name: &str| -> Result<&str, ConfigError> {
            items
                .get(name)
                .map(ConfigItem::effective_value)
                .ok_or_else(|| ConfigError::InvalidSchema(format!("missing item '{name}'")))
        };
        let parse_bool = |name: &str| -> Result<bool, ConfigError> {
            get(name)?
                .parse::<bool>()
                .map_err(|e| ConfigError::InvalidSchema(format!("{name}: {e}")))
        };
        let parse_u64 = |name: &str| -> Result<u64, ConfigError> {
            get(name)?
                .parse::<u64>()
                .map_err(|e| ConfigError::InvalidSchema(format!("{name}: {e}")))
        };

        Ok(Self {
            enable: parse_bool("enable")?,
            duration: Duration::from_secs(parse_u64("duration")?),
            sleep_interval: Duration::from_secs(parse_u64("sleepInterval")?),
            source: Source::parse(get("source")?)?,
            block_size: parse_u64("blockSize")? as u32,
            memory_buffer_size: parse_u64("memory_buffer_size")? as usize,
            north: get("north")?.to_string(),
            apply_filter: parse_bool("applyFilter")?,
            filter_rule: get("filterRule")?.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foglamp_config::validate::validate_category_val;

    #[test]
    fn default_schema_round_trips_through_typed_config() {
        let schema = default_schema(7);
        let items = validate_category_val(&schema, true).unwrap();
        let cfg = SendingProcessConfig::from_items(&items).unwrap();
        assert!(cfg.enable);
        assert_eq!(cfg.block_size, 500);
        assert_eq!(cfg.memory_buffer_size, 10);
        assert_eq!(cfg.north, "omf");
        assert!(!cfg.apply_filter);
    }
}
