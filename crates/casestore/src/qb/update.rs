//! UPDATE query builder using the unified expression layer.

use crate::error::{StoreError, StoreResult};
use crate::qb::expr::{Expr, ExprGroup};
use crate::qb::param::{Param, ParamList};
use crate::qb::traits::{MutationQb, SqlQb};
use tokio_postgres::types::ToSql;

/// SET field value type.
#[derive(Clone, Debug)]
enum SetField {
    /// Parameterized value
    Value(Param),
    /// Raw SQL expression
    Raw(String),
    /// Parameterized expression
    Expr(Expr),
}

/// UPDATE query builder with unified expression-based WHERE.
#[derive(Clone, Debug)]
pub struct UpdateQb {
    /// Table name, optionally followed by an alias
    table: String,
    /// SET clauses
    set_fields: Vec<(String, SetField)>,
    /// WHERE conditions
    where_group: ExprGroup,
    /// RETURNING columns
    returning_cols: Vec<String>,
}

impl UpdateQb {
    /// Create a new UPDATE query builder.
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            set_fields: Vec::new(),
            where_group: ExprGroup::new(),
            returning_cols: Vec::new(),
        }
    }

    /// Set a column value.
    pub fn set<T: ToSql + Send + Sync + 'static>(self, column: &str, value: T) -> Self {
        self.set_param(column, Param::new(value))
    }

    /// Set a column to an already wrapped parameter.
    pub fn set_param(mut self, column: &str, value: Param) -> Self {
        self.set_fields
            .push((column.to_string(), SetField::Value(value)));
        self
    }

    /// Set a raw SQL expression, e.g. `ver = ver + 1`.
    pub fn set_raw(mut self, column: &str, expr: &str) -> Self {
        self.set_fields
            .push((column.to_string(), SetField::Raw(expr.to_string())));
        self
    }

    /// Set a parameterized expression.
    pub fn set_expr(mut self, column: &str, expr: Expr) -> Self {
        self.set_fields
            .push((column.to_string(), SetField::Expr(expr)));
        self
    }

    /// Whether any SET clause was added.
    pub fn has_set_fields(&self) -> bool {
        !self.set_fields.is_empty()
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

    /// Add a raw WHERE condition.
    pub fn raw(mut self, sql: &str) -> Self {
        self.where_group.raw(sql);
        self
    }

    /// Add a custom expression.
    pub fn and_expr(mut self, expr: Expr) -> Self {
        self.where_group.and_expr(expr);
        self
    }

    // ==================== RETURNING ====================

    /// Set RETURNING columns.
    pub fn returning(mut self, cols: &str) -> Self {
        self.returning_cols = vec![cols.to_string()];
        self
    }
}

impl SqlQb for UpdateQb {
    fn build_into(&self, params: &mut ParamList) -> String {
        let set_parts: Vec<String> = self
            .set_fields
            .iter()
            .map(|(col, field)| match field {
                SetField::Value(p) => format!("{col} = ${}", params.push_param(p.clone())),
                SetField::Raw(expr) => format!("{col} = {expr}"),
                SetField::Expr(expr) => format!("{col} = {}", expr.build(params)),
            })
            .collect();

        let mut sql = format!("UPDATE {} SET {}", self.table, set_parts.join(", "));

        let where_sql = self.where_group.build(params);
        if !where_sql.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }

        if !self.returning_cols.is_empty() {
            sql.push_str(" RETURNING ");
            sql.push_str(&self.returning_cols.join(", "));
        }

        sql
    }

    fn validate(&self) -> StoreResult<()> {
        if self.set_fields.is_empty() {
            return Err(StoreError::invalid_argument(
                "store.qb.update",
                format!("UPDATE {} has no fields to set", self.table),
            ));
        }
        if self.where_group.is_empty() {
            return Err(StoreError::internal(
                "store.qb.update",
                format!("UPDATE {} without WHERE", self.table),
            ));
        }
        Ok(())
    }
}

impl MutationQb for UpdateQb {
    fn returning_all(self) -> Self {
        self.returning("*")
    }

    fn has_returning(&self) -> bool {
        !self.returning_cols.is_empty()
    }
}
