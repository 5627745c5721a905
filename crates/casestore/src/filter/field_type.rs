//! Declared column types of filterable fields.
//!
//! Flat filters arrive as text and JSON filter values carry whatever type the
//! client chose, so a value is converted to the column's type before it is
//! bound. `tokio-postgres` refuses to serialize an `i64` into a `text`
//! parameter, so binding the wrong variant fails the whole statement.

use super::{Comparison, FilterValue, encode_timestamp};
use crate::error::{StoreError, StoreResult};

/// SQL type of a filterable column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    /// `bigint`
    Int,
    /// `double precision`
    Float,
    /// `boolean`
    Bool,
    /// `text`
    Text,
    /// `timestamptz`
    Timestamp,
}

impl FieldType {
    /// Convert `value` into the variant that binds against this type.
    ///
    /// `NULL` passes through unchanged. `LIKE`/`ILIKE` are only accepted on
    /// text columns.
    pub fn coerce(
        self,
        column: &str,
        comparison: Comparison,
        value: &FilterValue,
    ) -> StoreResult<FilterValue> {
        if !comparison.is_scalar() && self != FieldType::Text {
            return Err(invalid(format!(
                "'{comparison}' is only supported on text columns, not on '{column}'"
            )));
        }
        if let FilterValue::Null = value {
            return Ok(FilterValue::Null);
        }
        let mismatch = || invalid(format!("invalid value for '{column}' ({self:?}): {value:?}"));

        match (self, value) {
            (FieldType::Int, FilterValue::Int(_) | FilterValue::IntList(_)) => Ok(value.clone()),
            (FieldType::Int, FilterValue::Text(s)) => {
                s.trim().parse().map(FilterValue::Int).map_err(|_| mismatch())
            }
            (FieldType::Int, FilterValue::TextList(items)) => items
                .iter()
                .map(|s| s.trim().parse::<i64>().map_err(|_| mismatch()))
                .collect::<StoreResult<Vec<_>>>()
                .map(FilterValue::IntList),

            (FieldType::Float, FilterValue::Float(_)) => Ok(value.clone()),
            (FieldType::Float, FilterValue::Int(i)) => Ok(FilterValue::Float(*i as f64)),
            (FieldType::Float, FilterValue::Text(s)) => match s.trim().parse::<f64>() {
                Ok(f) if f.is_finite() => Ok(FilterValue::Float(f)),
                _ => Err(mismatch()),
            },

            (FieldType::Bool, FilterValue::Bool(_)) => Ok(value.clone()),
            (FieldType::Bool, FilterValue::Text(s)) => match s.trim() {
                t if t.eq_ignore_ascii_case("true") => Ok(FilterValue::Bool(true)),
                t if t.eq_ignore_ascii_case("false") => Ok(FilterValue::Bool(false)),
                _ => Err(mismatch()),
            },

            (FieldType::Text, FilterValue::Text(_) | FilterValue::TextList(_)) => Ok(value.clone()),
            (FieldType::Text, FilterValue::Int(i)) => Ok(FilterValue::Text(i.to_string())),
            (FieldType::Text, FilterValue::Float(f)) => Ok(FilterValue::Text(f.to_string())),
            (FieldType::Text, FilterValue::Bool(b)) => Ok(FilterValue::Text(b.to_string())),
            (FieldType::Text, FilterValue::IntList(items)) => Ok(FilterValue::TextList(
                items.iter().map(i64::to_string).collect(),
            )),

            (FieldType::Timestamp, _) => encode_timestamp(value),

            _ => Err(mismatch()),
        }
    }
}

fn invalid(message: String) -> StoreError {
    StoreError::invalid_argument("store.filter.value", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coerce(kind: FieldType, value: FilterValue) -> StoreResult<FilterValue> {
        kind.coerce("c", Comparison::Eq, &value)
    }

    #[test]
    fn digits_stay_text_on_text_columns() {
        assert_eq!(
            coerce(FieldType::Text, "100".into()).unwrap(),
            FilterValue::Text("100".into())
        );
        assert_eq!(
            coerce(FieldType::Text, "007".into()).unwrap(),
            FilterValue::Text("007".into())
        );
        assert_eq!(
            coerce(FieldType::Text, 42i64.into()).unwrap(),
            FilterValue::Text("42".into())
        );
        assert_eq!(
            coerce(FieldType::Text, true.into()).unwrap(),
            FilterValue::Text("true".into())
        );
    }

    #[test]
    fn text_parses_into_typed_columns() {
        assert_eq!(coerce(FieldType::Int, " 5 ".into()).unwrap(), FilterValue::Int(5));
        assert_eq!(coerce(FieldType::Float, "1.5".into()).unwrap(), FilterValue::Float(1.5));
        assert_eq!(coerce(FieldType::Float, 2i64.into()).unwrap(), FilterValue::Float(2.0));
        assert_eq!(coerce(FieldType::Bool, "TRUE".into()).unwrap(), FilterValue::Bool(true));
        assert_eq!(
            coerce(FieldType::Int, vec!["1".to_string(), "2".to_string()].into()).unwrap(),
            FilterValue::IntList(vec![1, 2])
        );
        assert!(matches!(
            coerce(FieldType::Timestamp, "1700000000000".into()).unwrap(),
            FilterValue::Timestamp(_)
        ));
    }

    #[test]
    fn unparsable_values_are_invalid_arguments() {
        for (kind, value) in [
            (FieldType::Int, FilterValue::from("abc")),
            (FieldType::Int, FilterValue::from(1.5)),
            (FieldType::Bool, FilterValue::from("yes")),
            (FieldType::Float, FilterValue::from("inf")),
            (FieldType::Bool, FilterValue::from(1i64)),
        ] {
            let err = coerce(kind, value).unwrap_err();
            assert!(err.is_invalid_argument());
            assert_eq!(err.id(), "store.filter.value");
        }
    }

    #[test]
    fn null_passes_through() {
        assert_eq!(coerce(FieldType::Int, FilterValue::Null).unwrap(), FilterValue::Null);
    }

    #[test]
    fn patterns_need_text_columns() {
        let value = FilterValue::from("%1%");
        assert!(FieldType::Text.coerce("name", Comparison::ILike, &value).is_ok());
        let err = FieldType::Int
            .coerce("id", Comparison::Like, &value)
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }
}
