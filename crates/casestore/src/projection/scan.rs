//! Row accessors used by scan-plan functions.

use crate::error::{StoreError, StoreResult};
use crate::projection::Lookup;
use serde::de::DeserializeOwned;
use tokio_postgres::Row;
use tokio_postgres::types::FromSql;

fn column_name(row: &Row, idx: usize) -> &str {
    row.columns().get(idx).map(|c| c.name()).unwrap_or("?")
}

/// Read column `idx`, mapping driver conversion errors to a decode error.
pub fn get<'a, V: FromSql<'a>>(row: &'a Row, idx: usize) -> StoreResult<V> {
    row.try_get(idx)
        .map_err(|e| StoreError::decode(column_name(row, idx), e))
}

/// Read a `ROW(id, name)::text` lookup column.
pub fn lookup(row: &Row, idx: usize) -> StoreResult<Option<Lookup>> {
    match get::<Option<String>>(row, idx)? {
        Some(text) => Lookup::from_record(&text),
        None => Ok(None),
    }
}

/// Read a `json_agg(...)` column into typed children. NULL decodes to empty.
pub fn children<V: DeserializeOwned>(row: &Row, idx: usize) -> StoreResult<Vec<V>> {
    match get::<Option<serde_json::Value>>(row, idx)? {
        Some(value) => decode_children(value)
            .map_err(|e| StoreError::decode(column_name(row, idx), e)),
        None => Ok(Vec::new()),
    }
}

/// Decode a JSON array of children; `null` is an empty list.
pub fn decode_children<V: DeserializeOwned>(value: serde_json::Value) -> serde_json::Result<Vec<V>> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    serde_json::from_value(value)
}
