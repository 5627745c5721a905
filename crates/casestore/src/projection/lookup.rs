//! Decoding of `ROW(id, name)::text` lookup columns.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};

/// Reference to another record: its id and display name.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Lookup {
    pub id: i64,
    pub name: String,
}

impl Lookup {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Decode the text form of a `(id, name)` record.
    ///
    /// A record whose id is NULL decodes to `None`.
    pub fn from_record(text: &str) -> StoreResult<Option<Self>> {
        let fields = parse_record(text)?;
        let [id, name] = fields.as_slice() else {
            return Err(StoreError::decode(
                "lookup",
                format!("expected 2 record fields, got {} in '{text}'", fields.len()),
            ));
        };
        let Some(id) = id else {
            return Ok(None);
        };
        let id = id
            .parse::<i64>()
            .map_err(|e| StoreError::decode("lookup", format!("bad id '{id}': {e}")))?;
        Ok(Some(Self {
            id,
            name: name.clone().unwrap_or_default(),
        }))
    }
}

/// Split the text output of a Postgres record into its fields.
///
/// Unquoted empty fields are NULL; quoted fields honour `""` and backslash
/// escapes.
pub fn parse_record(text: &str) -> StoreResult<Vec<Option<String>>> {
    let inner = text
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| StoreError::decode("record", format!("not a record: '{text}'")))?;

    let mut fields = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut was_quoted = false;
    let mut chars = inner.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if quoted => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    current.push('"');
                } else {
                    quoted = false;
                }
            }
            '"' => {
                quoted = true;
                was_quoted = true;
            }
            '\\' if quoted => {
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            ',' if !quoted => {
                fields.push(finish_field(&mut current, &mut was_quoted));
            }
            _ => current.push(ch),
        }
    }

    if quoted {
        return Err(StoreError::decode(
            "record",
            format!("unterminated quote in '{text}'"),
        ));
    }
    fields.push(finish_field(&mut current, &mut was_quoted));
    Ok(fields)
}

fn finish_field(current: &mut String, was_quoted: &mut bool) -> Option<String> {
    let value = std::mem::take(current);
    let quoted = std::mem::replace(was_quoted, false);
    if value.is_empty() && !quoted {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_record() {
        assert_eq!(
            Lookup::from_record("(1,Alice)").unwrap(),
            Some(Lookup::new(1, "Alice"))
        );
    }

    #[test]
    fn quoted_name_with_comma_and_quotes() {
        assert_eq!(
            Lookup::from_record(r#"(12,"Smith, ""Jr""")"#).unwrap(),
            Some(Lookup::new(12, r#"Smith, "Jr""#))
        );
        assert_eq!(
            Lookup::from_record(r#"(3,"back\\slash")"#).unwrap(),
            Some(Lookup::new(3, r"back\slash"))
        );
    }

    #[test]
    fn null_and_empty_fields() {
        assert_eq!(Lookup::from_record("(,)").unwrap(), None);
        assert_eq!(
            Lookup::from_record("(4,)").unwrap(),
            Some(Lookup::new(4, ""))
        );
        assert_eq!(
            parse_record(r#"(4,"")"#).unwrap(),
            vec![Some("4".to_string()), Some(String::new())]
        );
    }

    #[test]
    fn malformed_records() {
        assert!(Lookup::from_record("1,Alice").is_err());
        assert!(Lookup::from_record("(x,Alice)").is_err());
        assert!(Lookup::from_record("(1,Alice,extra)").is_err());
        assert!(parse_record(r#"(1,"open)"#).is_err());
    }
}
