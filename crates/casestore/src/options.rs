//! Per-request option bundles handed to store methods.
//!
//! Bundles are built once per request and read by the store. The only
//! mutation the store performs is forcing identifier fields into the mask.

use crate::error::{StoreError, StoreResult};
use crate::filter::{FilterExpr, FilterValue, FlatFilter};
use crate::rbac::Auther;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// List request.
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub auth: Arc<dyn Auther>,
    pub fields: Vec<String>,
    pub ids: Vec<i64>,
    /// Free-text search on the entity's name; `*` is a wildcard.
    pub search: Option<String>,
    /// Named flat filters, e.g. `in_sla_cond=4`
    pub filters: Vec<FlatFilter>,
    /// Client filter tree
    pub filter: Option<FilterExpr>,
    pub sort: String,
    pub page: i32,
    pub size: i32,
}

impl SearchOptions {
    pub fn new(auth: Arc<dyn Auther>) -> Self {
        Self {
            auth,
            fields: Vec::new(),
            ids: Vec::new(),
            search: None,
            filters: Vec::new(),
            filter: None,
            sort: String::new(),
            page: 1,
            size: 0,
        }
    }

    #[must_use]
    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    #[must_use]
    pub fn ids(mut self, ids: Vec<i64>) -> Self {
        self.ids = ids;
        self
    }

    #[must_use]
    pub fn search(mut self, q: impl Into<String>) -> Self {
        self.search = Some(q.into());
        self
    }

    #[must_use]
    pub fn flat_filter(mut self, filter: FlatFilter) -> Self {
        self.filters.push(filter);
        self
    }

    #[must_use]
    pub fn filter_tree(mut self, filter: FilterExpr) -> Self {
        self.filter = Some(filter);
        self
    }

    #[must_use]
    pub fn sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = sort.into();
        self
    }

    #[must_use]
    pub fn page(mut self, page: i32, size: i32) -> Self {
        self.page = page;
        self.size = size;
        self
    }

    /// Flat filters whose field is `name`.
    pub fn filter(&self, name: &str) -> Vec<&FlatFilter> {
        self.filters.iter().filter(|f| f.field == name).collect()
    }

    /// Value of the first flat filter named `name`.
    pub fn filter_value(&self, name: &str) -> Option<&FilterValue> {
        self.filters
            .iter()
            .find(|f| f.field == name)
            .map(|f| &f.value)
    }

    /// Search text as an ILIKE pattern: `*` becomes `%`, and the text is
    /// wrapped in `%` when it carries no wildcard of its own.
    pub fn search_pattern(&self) -> Option<String> {
        let q = self.search.as_deref()?.trim();
        if q.is_empty() {
            return None;
        }
        let pattern = q.replace('*', "%");
        if pattern.contains('%') {
            Some(pattern)
        } else {
            Some(format!("%{pattern}%"))
        }
    }
}

/// Create request.
#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub auth: Arc<dyn Auther>,
    pub fields: Vec<String>,
}

impl CreateOptions {
    pub fn new(auth: Arc<dyn Auther>, fields: &[&str]) -> Self {
        Self {
            auth,
            fields: fields.iter().map(|f| f.to_string()).collect(),
        }
    }
}

/// Update request.
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    pub auth: Arc<dyn Auther>,
    pub fields: Vec<String>,
    /// Mutable fields to write; empty means every mutable field
    pub mask: Vec<String>,
    /// Concurrency token of the version being updated, for versioned entities
    pub etag: Option<Etag>,
}

impl UpdateOptions {
    pub fn new(auth: Arc<dyn Auther>, fields: &[&str]) -> Self {
        Self {
            auth,
            fields: fields.iter().map(|f| f.to_string()).collect(),
            mask: Vec::new(),
            etag: None,
        }
    }

    #[must_use]
    pub fn mask(mut self, mask: &[&str]) -> Self {
        self.mask = mask.iter().map(|f| f.to_string()).collect();
        self
    }

    #[must_use]
    pub fn etag(mut self, etag: Etag) -> Self {
        self.etag = Some(etag);
        self
    }

    /// Whether `field` should be written.
    pub fn writes(&self, field: &str) -> bool {
        self.mask.is_empty() || self.mask.iter().any(|m| m == field)
    }
}

/// Delete request.
#[derive(Debug, Clone)]
pub struct DeleteOptions {
    pub auth: Arc<dyn Auther>,
    pub ids: Vec<i64>,
    /// Fields to return for entities whose delete returns projections
    pub fields: Vec<String>,
}

impl DeleteOptions {
    pub fn new(auth: Arc<dyn Auther>, ids: Vec<i64>) -> Self {
        Self {
            auth,
            ids,
            fields: Vec::new(),
        }
    }

    #[must_use]
    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }
}

/// Optimistic concurrency token: `<id>.<ver>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Etag {
    pub id: i64,
    pub ver: i32,
}

impl Etag {
    pub fn new(id: i64, ver: i32) -> Self {
        Self { id, ver }
    }
}

impl fmt::Display for Etag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.id, self.ver)
    }
}

impl FromStr for Etag {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || StoreError::invalid_argument("store.etag.invalid", format!("invalid etag: {s}"));
        let (id, ver) = s.split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            id: id.parse().map_err(|_| invalid())?,
            ver: ver.parse().map_err(|_| invalid())?,
        })
    }
}

/// Require that a named filter is present, e.g. a parent id.
pub fn required_int_filter(options: &SearchOptions, name: &str) -> StoreResult<i64> {
    let value = options.filter_value(name).ok_or_else(|| {
        StoreError::invalid_argument(
            "store.options.filter",
            format!("filter '{name}' is required"),
        )
    })?;
    let parsed = match value {
        FilterValue::Int(v) => Some(*v),
        FilterValue::Text(text) => text.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| {
        StoreError::invalid_argument(
            "store.options.filter",
            format!("filter '{name}' must be an integer, got {value:?}"),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::AuthContext;

    fn auth() -> Arc<dyn Auther> {
        Arc::new(AuthContext::new(1, 1))
    }

    #[test]
    fn etag_round_trip_and_errors() {
        let etag: Etag = "15.3".parse().unwrap();
        assert_eq!(etag, Etag::new(15, 3));
        assert_eq!(etag.to_string(), "15.3");
        assert!("15".parse::<Etag>().is_err());
        assert!("a.1".parse::<Etag>().is_err());
        assert!("1.b".parse::<Etag>().is_err());
    }

    #[test]
    fn search_pattern() {
        let opts = SearchOptions::new(auth()).search("urg");
        assert_eq!(opts.search_pattern().as_deref(), Some("%urg%"));
        let opts = SearchOptions::new(auth()).search("urg*");
        assert_eq!(opts.search_pattern().as_deref(), Some("urg%"));
        let opts = SearchOptions::new(auth()).search("  ");
        assert_eq!(opts.search_pattern(), None);
    }

    #[test]
    fn named_filters() {
        let opts = SearchOptions::new(auth())
            .flat_filter("in_sla_cond=4".parse().unwrap())
            .flat_filter("name=x".parse().unwrap());
        assert_eq!(required_int_filter(&opts, "in_sla_cond").unwrap(), 4);
        assert!(required_int_filter(&opts, "name").is_err());
        assert!(required_int_filter(&opts, "not_in_sla").is_err());
        assert_eq!(opts.filter("name").len(), 1);
    }

    #[test]
    fn update_mask() {
        let opts = UpdateOptions::new(auth(), &["id"]);
        assert!(opts.writes("name"));
        let opts = opts.mask(&["color"]);
        assert!(opts.writes("color"));
        assert!(!opts.writes("name"));
    }
}
