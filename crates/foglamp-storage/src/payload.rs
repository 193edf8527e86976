//! Fluent builder over the storage service's payload grammar:
//! `SELECT/WHERE/SET/INSERT/AGGREGATE/ORDER_BY/LIMIT/GROUP`.
//!
//! Each method appends one clause and returns `self`, mirroring the builder
//! style of `alloy-framework::handler::builder`. The built value is a plain
//! `serde_json::Value` tree — the wire format the storage service expects,
//! not a Rust-side AST.

use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Default)]
pub struct PayloadBuilder {
    payload: Map<String, Value>,
}

impl PayloadBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// `SELECT` clause: the columns to project, or all columns if omitted.
    pub fn select(mut self, columns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let cols: Vec<Value> = columns.into_iter().map(|c| json!(c.into())).collect();
        self.payload.insert("return".into(), Value::Array(cols));
        self
    }

    /// `WHERE` clause: `column <op> value`, ANDed with any prior condition.
    pub fn where_cond(mut self, column: impl Into<String>, op: impl Into<String>, value: Value) -> Self {
        let condition = json!({ "column": column.into(), "condition": op.into(), "value": value });
        match self.payload.get_mut("where") {
            Some(Value::Array(existing)) => existing.push(condition),
            _ => {
                self.payload.insert("where".into(), Value::Array(vec![condition]));
            }
        }
        self
    }

    /// `SET` clause for `update_tbl`: the column/value pairs to assign.
    pub fn set(mut self, column: impl Into<String>, value: Value) -> Self {
        let entry = self
            .payload
            .entry("values")
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(map) = entry {
            map.insert(column.into(), value);
        }
        self
    }

    /// `INSERT` clause: a full row (or array of rows) for `insert_into_tbl`.
    pub fn insert(mut self, values: Value) -> Self {
        self.payload.insert("values".into(), values);
        self
    }

    /// `AGGREGATE` clause: `{operation, column}`, e.g. `min(last_object)`.
    pub fn aggregate(mut self, operation: impl Into<String>, column: impl Into<String>) -> Self {
        let agg = json!({ "operation": operation.into(), "column": column.into() });
        match self.payload.get_mut("aggregate") {
            Some(Value::Array(existing)) => existing.push(agg),
            _ => {
                self.payload.insert("aggregate".into(), Value::Array(vec![agg]));
            }
        }
        self
    }

    /// `ORDER_BY` clause: `column` ascending unless `descending` is set.
    pub fn order_by(mut self, column: impl Into<String>, descending: bool) -> Self {
        let dir = if descending { "desc" } else { "asc" };
        let order = json!({ "column": column.into(), "direction": dir });
        match self.payload.get_mut("sort") {
            Some(Value::Array(existing)) => existing.push(order),
            _ => {
                self.payload.insert("sort".into(), Value::Array(vec![order]));
            }
        }
        self
    }

    pub fn limit(mut self, n: u64) -> Self {
        self.payload.insert("limit".into(), json!(n));
        self
    }

    /// `GROUP` clause: the column to group rows by (used with `aggregate`).
    pub fn group(mut self, column: impl Into<String>) -> Self {
        self.payload.insert("group".into(), json!(column.into()));
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_clauses_accumulate_conjunctively() {
        let payload = PayloadBuilder::new()
            .where_cond("asset_code", "=", json!("motor1"))
            .where_cond("id", ">", json!(100))
            .build();
        assert_eq!(payload["where"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn aggregate_with_group_builds_expected_shape() {
        let payload = PayloadBuilder::new()
            .aggregate("min", "last_object")
            .group("id")
            .build();
        assert_eq!(payload["aggregate"][0]["operation"], "min");
        assert_eq!(payload["group"], "id");
    }
}
