//! Per-column value encoders applied before a filter value is bound.

use crate::error::{StoreError, StoreResult};
use crate::filter::FilterValue;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::fmt;

/// Rewrites a raw filter value into the type the column expects.
pub type EncodeFn = Box<dyn Fn(&FilterValue) -> StoreResult<FilterValue> + Send + Sync>;

/// Table of `column -> encoder`, keyed by the column as written in the filter
/// (`created_at`, `sla.name`).
#[derive(Default)]
pub struct ValueEncoders {
    encoders: HashMap<String, EncodeFn>,
}

impl ValueEncoders {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an encoder for `column`.
    #[must_use]
    pub fn register<F>(mut self, column: &str, encode: F) -> Self
    where
        F: Fn(&FilterValue) -> StoreResult<FilterValue> + Send + Sync + 'static,
    {
        self.encoders.insert(column.to_string(), Box::new(encode));
        self
    }

    /// Encode `value` for `column`; columns without an encoder pass through.
    pub fn encode(&self, column: &str, value: &FilterValue) -> StoreResult<FilterValue> {
        match self.encoders.get(column) {
            Some(encode) => encode(value),
            None => Ok(value.clone()),
        }
    }

    pub fn contains(&self, column: &str) -> bool {
        self.encoders.contains_key(column)
    }
}

impl fmt::Debug for ValueEncoders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut columns: Vec<&String> = self.encoders.keys().collect();
        columns.sort();
        f.debug_struct("ValueEncoders")
            .field("columns", &columns)
            .finish()
    }
}

/// Turn unix milliseconds (integer or numeric text) or RFC 3339 text into a
/// timestamp.
pub fn encode_timestamp(value: &FilterValue) -> StoreResult<FilterValue> {
    match value {
        FilterValue::Timestamp(_) | FilterValue::Null => Ok(value.clone()),
        FilterValue::Int(ms) => from_millis(*ms),
        FilterValue::Text(text) => match text.trim().parse::<i64>() {
            Ok(ms) => from_millis(ms),
            Err(_) => DateTime::parse_from_rfc3339(text.trim())
                .map(|dt| FilterValue::Timestamp(dt.with_timezone(&Utc)))
                .map_err(|e| {
                    StoreError::invalid_argument(
                        "store.filter.encode",
                        format!("invalid timestamp '{text}': {e}"),
                    )
                }),
        },
        other => Err(StoreError::invalid_argument(
            "store.filter.encode",
            format!("cannot encode {other:?} as timestamp"),
        )),
    }
}

fn from_millis(ms: i64) -> StoreResult<FilterValue> {
    DateTime::from_timestamp_millis(ms)
        .map(FilterValue::Timestamp)
        .ok_or_else(|| {
            StoreError::invalid_argument(
                "store.filter.encode",
                format!("timestamp {ms} out of range"),
            )
        })
}
