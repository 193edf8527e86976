//! Small shared helper for writing `log` table entries from the run loop,
//! mirroring `foglamp_config::ConfigurationManager`'s own audit helper.

use serde_json::{json, Value};
use tracing::warn;

use foglamp_core::{AuditEntry, AuditLevel};
use foglamp_storage::StorageClient;

/// Writes one `log` table entry. `process_name`, when set via `--name`,
/// is folded into `data` as `"process"` so audit entries from one run can
/// be told apart from another's on the same stream.
pub async fn audit(
    storage: &StorageClient,
    code: &str,
    level: AuditLevel,
    mut data: Value,
    process_name: Option<&str>,
) {
    if let Some(name) = process_name {
        if let Value::Object(map) = &mut data {
            map.insert("process".to_string(), Value::String(name.to_string()));
        }
    }
    let entry = AuditEntry::new(code, level, data);
    let payload = json!({
        "code": entry.code,
        "level": entry.level,
        "data": entry.data,
        "ts": entry.ts,
    });
    if let Err(e) = storage.insert_into_tbl("log", payload).await {
        warn!(code = %code, error = %e, "failed to write audit entry");
    }
}
