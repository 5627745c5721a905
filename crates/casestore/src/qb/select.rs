//! SELECT query builder using the unified expression layer.

use crate::qb::expr::{Expr, ExprGroup};
use crate::qb::param::ParamList;
use crate::qb::traits::SqlQb;
use tokio_postgres::types::ToSql;

/// SELECT query builder.
///
/// Besides the usual consuming builder methods it offers `push_*` methods
/// taking `&mut self`, used by the projection builder and the filter compiler
/// while they grow a query field by field.
#[derive(Clone, Debug)]
pub struct SelectQb {
    /// Table or FROM expression
    from_expr: String,
    /// SELECT columns (empty renders `*`)
    columns: Vec<Expr>,
    /// JOIN clauses
    join_clauses: Vec<String>,
    /// Join key -> alias, one entry per joined table
    join_aliases: Vec<(String, String)>,
    /// WHERE conditions
    where_group: ExprGroup,
    /// ORDER BY clauses
    order_clauses: Vec<String>,
    /// LIMIT
    limit: Option<i64>,
    /// OFFSET
    offset: Option<i64>,
    /// Row lock strength, e.g. `UPDATE` or `KEY SHARE`
    lock: Option<String>,
}

impl SelectQb {
    /// Create a new SELECT query builder for a table or FROM expression.
    pub fn new(from_expr: &str) -> Self {
        Self {
            from_expr: from_expr.to_string(),
            columns: Vec::new(),
            join_clauses: Vec::new(),
            join_aliases: Vec::new(),
            where_group: ExprGroup::new(),
            order_clauses: Vec::new(),
            limit: None,
            offset: None,
            lock: None,
        }
    }

    // ==================== SELECT columns ====================

    /// Append one SELECT column.
    pub fn column(mut self, col: &str) -> Self {
        self.push_column(Expr::raw(col));
        self
    }

    /// Append a SELECT column that may carry parameters.
    pub fn push_column(&mut self, col: Expr) {
        self.columns.push(col);
    }

    /// Number of SELECT columns added so far.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    // ==================== JOIN ====================

    /// Add LEFT JOIN.
    pub fn left_join(mut self, table: &str, on: &str) -> Self {
        self.join_clauses.push(format!("LEFT JOIN {table} ON {on}"));
        self
    }

    /// Add INNER JOIN.
    pub fn inner_join(mut self, table: &str, on: &str) -> Self {
        self.join_clauses.push(format!("INNER JOIN {table} ON {on}"));
        self
    }

    /// Alias of a join previously registered under `key`.
    pub fn join_alias(&self, key: &str) -> Option<&str> {
        self.join_aliases
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, alias)| alias.as_str())
    }

    /// LEFT JOIN `table alias ON on` unless a join is already registered under
    /// `key`. Returns the alias to qualify columns with.
    pub fn left_join_once(&mut self, key: &str, table: &str, alias: &str, on: &str) -> String {
        if let Some(existing) = self.join_alias(key) {
            return existing.to_string();
        }
        self.join_clauses
            .push(format!("LEFT JOIN {table} {alias} ON {on}"));
        self.join_aliases.push((key.to_string(), alias.to_string()));
        alias.to_string()
    }

    /// Register `alias` under `key` for a join added by other means.
    pub fn remember_join(&mut self, key: &str, alias: &str) {
        if self.join_alias(key).is_none() {
            self.join_aliases.push((key.to_string(), alias.to_string()));
        }
    }

    /// Number of JOIN clauses.
    pub fn join_count(&self) -> usize {
        self.join_clauses.len()
    }

    // ==================== WHERE conditions ====================

    /// Add WHERE: column = value
    pub fn eq<T: ToSql + Send + Sync + 'static>(mut self, column: &str, value: T) -> Self {
        self.where_group.eq(column, value);
        self
    }

    /// Add WHERE: column = ANY(values)
    pub fn any<T: ToSql + Send + Sync + 'static>(mut self, column: &str, values: Vec<T>) -> Self {
        self.where_group.any(column, values);
        self
    }

    /// Add a raw WHERE condition without params.
    pub fn raw(mut self, sql: &str) -> Self {
        self.where_group.raw(sql);
        self
    }

    /// Add a custom expression.
    pub fn and_expr(mut self, expr: Expr) -> Self {
        self.where_group.and_expr(expr);
        self
    }

    /// Add a custom expression in place.
    pub fn push_where(&mut self, expr: Expr) {
        self.where_group.and_expr(expr);
    }

    // ==================== Ordering ====================

    /// Add ORDER BY clause.
    pub fn order_by(mut self, clause: &str) -> Self {
        self.push_order(clause);
        self
    }

    /// Add ORDER BY clause in place.
    pub fn push_order(&mut self, clause: &str) {
        self.order_clauses.push(clause.to_string());
    }

    // ==================== Pagination ====================

    /// Set LIMIT.
    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Set OFFSET.
    pub fn offset(mut self, n: i64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn set_limit(&mut self, n: Option<i64>) {
        self.limit = n;
    }

    pub fn set_offset(&mut self, n: Option<i64>) {
        self.offset = n;
    }

    // ==================== Locking ====================

    /// Lock the selected rows: `FOR <strength>`.
    pub fn lock(mut self, strength: &str) -> Self {
        self.lock = Some(strength.to_string());
        self
    }
}

impl SqlQb for SelectQb {
    fn build_into(&self, params: &mut ParamList) -> String {
        let select_part = if self.columns.is_empty() {
            "*".to_string()
        } else {
            self.columns
                .iter()
                .map(|c| c.build(params))
                .collect::<Vec<_>>()
                .join(", ")
        };

        let mut sql = format!("SELECT {} FROM {}", select_part, self.from_expr);

        // JOINs
        for join in &self.join_clauses {
            sql.push(' ');
            sql.push_str(join);
        }

        // WHERE
        let where_sql = self.where_group.build(params);
        if !where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }

        if !self.order_clauses.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&self.order_clauses.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        if let Some(offset) = self.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }

        if let Some(strength) = &self.lock {
            sql.push_str(" FOR ");
            sql.push_str(strength);
        }

        sql
    }
}
