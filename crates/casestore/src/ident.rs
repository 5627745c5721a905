//! Validation of client-supplied identifiers.
//!
//! Field names, filter columns and sort keys arrive from clients and end up
//! inside SQL text (identifiers cannot be bound as parameters). Everything that
//! reaches the builders passes through [`validate_name`] or [`ColumnRef::parse`].
//!
//! - A name must match `[A-Za-z_][A-Za-z0-9_]*`
//! - A column reference is either `column` or `fk.column`; deeper nesting is rejected

use crate::error::{StoreError, StoreResult};
use std::fmt;

/// Check a single identifier segment.
pub fn validate_name(name: &str) -> StoreResult<()> {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return Err(StoreError::invalid_argument(
            "store.ident.empty",
            "identifier cannot be empty",
        ));
    };
    if !(first == '_' || first.is_ascii_alphabetic()) {
        return Err(StoreError::invalid_argument(
            "store.ident.invalid",
            format!("invalid identifier start character '{first}' in '{name}'"),
        ));
    }
    if let Some(c) = chars.find(|c| !(*c == '_' || c.is_ascii_alphanumeric())) {
        return Err(StoreError::invalid_argument(
            "store.ident.invalid",
            format!("invalid character '{c}' in identifier '{name}'"),
        ));
    }
    Ok(())
}

/// A validated column reference: `column` or `fk.column`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRef {
    /// Foreign-key field name when the reference goes through a join.
    pub fk: Option<String>,
    pub column: String,
}

impl ColumnRef {
    /// Parse a column reference.
    ///
    /// At most one level of nesting is accepted so that join resolution stays
    /// unambiguous.
    pub fn parse(s: &str) -> StoreResult<Self> {
        let mut parts = s.split('.');
        let first = parts.next().unwrap_or_default();
        let second = parts.next();
        if parts.next().is_some() {
            return Err(StoreError::invalid_argument(
                "store.filter.nesting",
                format!("unsupported nesting depth in column '{s}': only fk.column is allowed"),
            ));
        }

        validate_name(first)?;
        match second {
            None => Ok(Self {
                fk: None,
                column: first.to_string(),
            }),
            Some(column) => {
                validate_name(column)?;
                Ok(Self {
                    fk: Some(first.to_string()),
                    column: column.to_string(),
                })
            }
        }
    }

    pub fn is_nested(&self) -> bool {
        self.fk.is_some()
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.fk {
            Some(fk) => write!(f, "{fk}.{}", self.column),
            None => f.write_str(&self.column),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_simple() {
        assert!(validate_name("created_at").is_ok());
        assert!(validate_name("_x1").is_ok());
    }

    #[test]
    fn name_rejects_empty() {
        assert!(validate_name("").is_err());
    }

    #[test]
    fn name_rejects_start_digit() {
        assert!(validate_name("1table").is_err());
    }

    #[test]
    fn name_rejects_injection() {
        assert!(validate_name("name; drop table cases").is_err());
        assert!(validate_name("name--").is_err());
        assert!(validate_name("na me").is_err());
        assert!(validate_name("na$me").is_err());
    }

    #[test]
    fn column_bare() {
        let c = ColumnRef::parse("color").unwrap();
        assert_eq!(c.fk, None);
        assert_eq!(c.column, "color");
        assert!(!c.is_nested());
        assert_eq!(c.to_string(), "color");
    }

    #[test]
    fn column_nested_once() {
        let c = ColumnRef::parse("sla.name").unwrap();
        assert_eq!(c.fk.as_deref(), Some("sla"));
        assert_eq!(c.column, "name");
        assert_eq!(c.to_string(), "sla.name");
    }

    #[test]
    fn column_rejects_two_dots() {
        let err = ColumnRef::parse("sla.calendar.name").unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(err.id(), "store.filter.nesting");
    }

    #[test]
    fn column_rejects_empty_segments() {
        assert!(ColumnRef::parse("sla.").is_err());
        assert!(ColumnRef::parse(".name").is_err());
        assert!(ColumnRef::parse("").is_err());
    }
}
