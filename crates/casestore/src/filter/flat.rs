//! Legacy flat filters: `field<op>value` strings without AND/OR nesting.
//!
//! Two spellings are accepted:
//!
//! - symbolic: `priority_id>=3`, `name!=Low`
//! - named: `priority_id=ge=3`, `name=ne=Low` (`eq`, `ne`, `gt`, `ge`, `lt`, `le`)
//!
//! Only the six scalar comparators are supported. Every filter is ANDed.
//!
//! Values stay text until they are applied: the entity's declared
//! [`FieldType`] of the column decides how the text is bound.

use crate::error::{StoreError, StoreResult};
use crate::filter::{Comparison, FieldType, FilterValue};
use crate::ident::validate_name;
use crate::qb::{Expr, SelectQb};
use crate::sql_text::qualify;
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

static NAMED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<field>[^=!<>]+)=(?P<op>eq|ne|gt|ge|lt|le)=(?P<value>.*)$")
        .expect("valid regex")
});

// Longest operators first so `>=` is not read as `>`.
const SYMBOLIC: [(&str, Comparison); 6] = [
    (">=", Comparison::Gte),
    ("<=", Comparison::Lte),
    ("!=", Comparison::NotEq),
    ("=", Comparison::Eq),
    (">", Comparison::Gt),
    ("<", Comparison::Lt),
];

/// One flat filter.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatFilter {
    pub field: String,
    pub op: Comparison,
    pub value: FilterValue,
}

impl FlatFilter {
    pub fn new(field: impl Into<String>, op: Comparison, value: impl Into<FilterValue>) -> Self {
        Self {
            field: field.into(),
            op,
            value: value.into(),
        }
    }
}

impl FromStr for FlatFilter {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(caps) = NAMED.captures(s) {
            let op = match &caps["op"] {
                "eq" => Comparison::Eq,
                "ne" => Comparison::NotEq,
                "gt" => Comparison::Gt,
                "ge" => Comparison::Gte,
                "lt" => Comparison::Lt,
                _ => Comparison::Lte,
            };
            return build(&caps["field"], op, &caps["value"], s);
        }

        let (pos, token, op) = SYMBOLIC
            .iter()
            .filter_map(|(token, op)| s.find(token).map(|pos| (pos, *token, *op)))
            // Leftmost operator wins, longer token on ties.
            .min_by_key(|(pos, token, _)| (*pos, usize::MAX - token.len()))
            .ok_or_else(|| {
                StoreError::invalid_argument(
                    "store.filter.flat",
                    format!("no comparison operator in filter '{s}'"),
                )
            })?;

        build(&s[..pos], op, &s[pos + token.len()..], s)
    }
}

fn build(field: &str, op: Comparison, value: &str, source: &str) -> StoreResult<FlatFilter> {
    let field = field.trim();
    validate_name(field).map_err(|_| {
        StoreError::invalid_argument(
            "store.filter.flat",
            format!("invalid field in filter '{source}'"),
        )
    })?;
    let value = value.trim();
    let value = if value.eq_ignore_ascii_case("null") {
        FilterValue::Null
    } else {
        FilterValue::Text(value.to_string())
    };
    Ok(FlatFilter {
        field: field.to_string(),
        op,
        value,
    })
}

/// Declared type of `field`, or `InvalidArgument` when it is not filterable.
pub(crate) fn field_type(fields: &[(&str, FieldType)], field: &str) -> StoreResult<FieldType> {
    fields
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, kind)| *kind)
        .ok_or_else(|| {
            StoreError::invalid_argument(
                "store.filter.unknown_field",
                format!("unknown filter field: {field}"),
            )
        })
}

/// AND every flat filter into the WHERE clause of `qb`, qualified with `alias`.
///
/// Each field must appear in `fields`; its value is converted to the declared
/// type before binding.
pub fn apply_filters_to_query(
    qb: &mut SelectQb,
    alias: &str,
    filters: &[FlatFilter],
    fields: &[(&str, FieldType)],
) -> StoreResult<()> {
    for filter in filters {
        validate_name(&filter.field)?;
        let kind = field_type(fields, &filter.field)?;
        if !filter.op.is_scalar() {
            return Err(StoreError::invalid_argument(
                "store.filter.flat",
                format!("unsupported operator '{}' in flat filter", filter.op),
            ));
        }
        if filter.value.is_list() {
            return Err(StoreError::invalid_argument(
                "store.filter.flat",
                format!("list value for flat filter on '{}'", filter.field),
            ));
        }
        let column = qualify(alias, &filter.field);
        let value = kind.coerce(&filter.field, filter.op, &filter.value)?;
        let expr = match (&value, filter.op) {
            (FilterValue::Null, Comparison::Eq) => Expr::is_null(column),
            (FilterValue::Null, Comparison::NotEq) => Expr::is_not_null(column),
            (FilterValue::Null, op) => {
                return Err(StoreError::invalid_argument(
                    "store.filter.flat",
                    format!("'{op}' cannot compare {column} with null"),
                ));
            }
            (value, op) => Expr::compare(column, op.as_sql(), value.to_param()),
        };
        qb.push_where(expr);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qb::SqlQb;

    const FIELDS: &[(&str, FieldType)] = &[
        ("id", FieldType::Int),
        ("name", FieldType::Text),
        ("color", FieldType::Text),
        ("state", FieldType::Bool),
    ];

    #[test]
    fn parse_symbolic() {
        let f: FlatFilter = "priority_id>=3".parse().unwrap();
        assert_eq!(f, FlatFilter::new("priority_id", Comparison::Gte, "3"));
        let f: FlatFilter = "name!=Low".parse().unwrap();
        assert_eq!(f, FlatFilter::new("name", Comparison::NotEq, "Low"));
        let f: FlatFilter = "a<b".parse().unwrap();
        assert_eq!(f.op, Comparison::Lt);
    }

    #[test]
    fn parse_value_with_operator_characters() {
        let f: FlatFilter = "name=a>=b".parse().unwrap();
        assert_eq!(f, FlatFilter::new("name", Comparison::Eq, "a>=b"));
    }

    #[test]
    fn parse_named() {
        let f: FlatFilter = "priority_id=ge=3".parse().unwrap();
        assert_eq!(f, FlatFilter::new("priority_id", Comparison::Gte, "3"));
        let f: FlatFilter = "enabled=eq=true".parse().unwrap();
        assert_eq!(f.value, FilterValue::Text("true".into()));
        let f: FlatFilter = "color=NULL".parse().unwrap();
        assert_eq!(f.value, FilterValue::Null);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!("no_operator".parse::<FlatFilter>().is_err());
        assert!("bad field=1".parse::<FlatFilter>().is_err());
        assert!("=1".parse::<FlatFilter>().is_err());
    }

    #[test]
    fn apply_ands_everything() {
        let mut qb = SelectQb::new("cases.priority p");
        let filters = vec![
            "name=High".parse().unwrap(),
            "id>2".parse().unwrap(),
            "color=null".parse().unwrap(),
        ];
        apply_filters_to_query(&mut qb, "p", &filters, FIELDS).unwrap();
        assert_eq!(
            qb.to_sql(),
            "SELECT * FROM cases.priority p WHERE p.name = $1 AND p.id > $2 AND p.color IS NULL"
        );
    }

    #[test]
    fn values_bind_as_the_declared_column_type() {
        let mut qb = SelectQb::new("cases.priority p");
        let filters = vec![
            "name=100".parse().unwrap(),
            "color=1.5".parse().unwrap(),
            "id=7".parse().unwrap(),
            "state=true".parse().unwrap(),
        ];
        apply_filters_to_query(&mut qb, "p", &filters, FIELDS).unwrap();
        let built = qb.build().unwrap();
        let params: Vec<String> = built.params.iter().map(|p| format!("{p:?}")).collect();
        assert_eq!(params, ["\"100\"", "\"1.5\"", "7", "true"]);
    }

    #[test]
    fn apply_rejects_unknown_fields_and_bad_values() {
        let mut qb = SelectQb::new("t");
        let err = apply_filters_to_query(&mut qb, "", &["colour=red".parse::<FlatFilter>().unwrap()], FIELDS)
            .unwrap_err();
        assert_eq!(err.id(), "store.filter.unknown_field");

        let err = apply_filters_to_query(&mut qb, "", &["id=abc".parse::<FlatFilter>().unwrap()], FIELDS)
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(err.id(), "store.filter.value");
    }

    #[test]
    fn apply_rejects_pattern_operators() {
        let mut qb = SelectQb::new("t");
        let filters = vec![FlatFilter::new("name", Comparison::Like, "%a%")];
        assert!(apply_filters_to_query(&mut qb, "", &filters, FIELDS).is_err());
    }
}
