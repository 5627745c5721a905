//! Bound values and their placeholder numbering.

use std::fmt;
use std::sync::Arc;
use tokio_postgres::types::ToSql;

/// One bound value.
///
/// Shared through an `Arc`: the same value can sit in a cached filter tree, a
/// projection template and the final statement without being copied.
#[derive(Clone)]
pub struct Param(pub(crate) Arc<dyn ToSql + Send + Sync>);

impl Param {
    pub fn new<T: ToSql + Send + Sync + 'static>(value: T) -> Self {
        Param(Arc::new(value))
    }

    /// The value as the driver takes it.
    pub fn as_ref(&self) -> &(dyn ToSql + Sync) {
        &*self.0
    }
}

/// Prints the bound value itself (`"red"`, `1`, `[5, 6]`), which is what
/// statement tests compare.
impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// Values of one statement in placeholder order: the value at position `n`
/// (1-based) binds `$n`.
///
/// Builders render SQL and fill the list in the same pass, so a fragment
/// never needs to know its placeholder numbers up front.
#[derive(Clone, Debug, Default)]
pub struct ParamList {
    values: Vec<Param>,
}

impl ParamList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `value`; returns its placeholder number.
    pub fn push<T: ToSql + Send + Sync + 'static>(&mut self, value: T) -> usize {
        self.push_param(Param::new(value))
    }

    /// Bind an already wrapped value; returns its placeholder number.
    pub fn push_param(&mut self, param: Param) -> usize {
        self.values.push(param);
        self.values.len()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Borrowed values in the shape `tokio_postgres` query methods take.
    pub fn as_refs(&self) -> Vec<&(dyn ToSql + Sync)> {
        self.values.iter().map(Param::as_ref).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Param> {
        self.values.iter()
    }
}
