//! Paging and sorting of list queries.
//!
//! Lists fetch `size + 1` rows; when the extra row arrives it is dropped and
//! the result reports `next = true`. A size of `-1` disables the limit.

use crate::error::{StoreError, StoreResult};
use crate::qb::SelectQb;
use crate::sql_text::qualify;
use serde::Serialize;

/// Page size meaning "no limit".
pub const ALL: i32 = -1;

/// Size bounds applied to client paging input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingLimits {
    /// Used when the client sends size 0
    pub default_size: i32,
    /// Larger sizes are clamped to this
    pub max_size: i32,
}

impl Default for PagingLimits {
    fn default() -> Self {
        Self {
            default_size: 40,
            max_size: 1000,
        }
    }
}

/// Normalized paging input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    /// 1-based page
    pub page: i32,
    /// Rows per page, or [`ALL`]
    pub size: i32,
}

impl Paging {
    /// Normalize client input: pages start at 1, size 0 (or any negative
    /// other than `-1`) takes the default, sizes above the maximum are clamped.
    pub fn new(page: i32, size: i32, limits: &PagingLimits) -> Self {
        let size = match size {
            ALL => ALL,
            s if s <= 0 => limits.default_size,
            s => s.min(limits.max_size),
        };
        Self {
            page: page.max(1),
            size,
        }
    }

    pub fn is_all(&self) -> bool {
        self.size == ALL
    }

    /// Apply LIMIT `size + 1` and OFFSET `(page - 1) * size`.
    pub fn apply(&self, qb: &mut SelectQb) {
        if self.is_all() {
            qb.set_limit(None);
            qb.set_offset(None);
            return;
        }
        let size = i64::from(self.size);
        qb.set_limit(Some(size + 1));
        qb.set_offset((self.page > 1).then(|| (i64::from(self.page) - 1) * size));
    }

    /// Trim the look-ahead row and report whether another page exists.
    pub fn finish<T>(&self, mut items: Vec<T>) -> ListResult<T> {
        let mut next = false;
        if !self.is_all() {
            let size = usize::try_from(self.size).unwrap_or(0);
            if items.len() > size {
                items.truncate(size);
                next = true;
            }
        }
        ListResult {
            items,
            next,
            page: self.page,
        }
    }
}

/// One page of a list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListResult<T> {
    pub items: Vec<T>,
    pub next: bool,
    pub page: i32,
}

/// A parsed sort token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortColumn {
    pub field: String,
    pub descending: bool,
}

/// Parse `name`, `+name`, `-name` or a comma-separated list of them.
///
/// Only fields in `allowed` are accepted. An empty sort string yields `default`,
/// which may carry a `-` prefix itself.
pub fn parse_sort(sort: &str, allowed: &[&str], default: &str) -> StoreResult<Vec<SortColumn>> {
    let mut columns = Vec::new();
    for token in sort.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        let (field, descending) = match token.as_bytes()[0] {
            b'-' => (token[1..].trim(), true),
            b'+' => (token[1..].trim(), false),
            _ => (token, false),
        };
        if !allowed.contains(&field) {
            return Err(StoreError::invalid_argument(
                "store.sort.unknown_field",
                format!("unknown sort field: {field}"),
            ));
        }
        if columns.iter().any(|c: &SortColumn| c.field == field) {
            continue;
        }
        columns.push(SortColumn {
            field: field.to_string(),
            descending,
        });
    }
    if columns.is_empty() {
        let (field, descending) = match default.strip_prefix('-') {
            Some(field) => (field, true),
            None => (default.trim_start_matches('+'), false),
        };
        columns.push(SortColumn {
            field: field.to_string(),
            descending,
        });
    }
    Ok(columns)
}

/// Parse `sort` and add ORDER BY clauses qualified with `alias`.
///
/// `id` is appended as a tie-breaker so pages are stable.
pub fn apply_sort(
    qb: &mut SelectQb,
    alias: &str,
    sort: &str,
    allowed: &[&str],
    default: &str,
) -> StoreResult<()> {
    let columns = parse_sort(sort, allowed, default)?;
    for column in &columns {
        let dir = if column.descending { "DESC" } else { "ASC" };
        qb.push_order(&format!("{} {dir}", qualify(alias, &column.field)));
    }
    if !columns.iter().any(|c| c.field == "id") {
        qb.push_order(&format!("{} ASC", qualify(alias, "id")));
    }
    Ok(())
}
