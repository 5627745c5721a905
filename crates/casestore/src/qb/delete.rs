//! DELETE query builder using the unified expression layer.

use crate::qb::expr::{Expr, ExprGroup};
use crate::qb::param::ParamList;
use crate::qb::traits::{MutationQb, SqlQb};
use tokio_postgres::types::ToSql;

/// DELETE query builder with unified expression-based WHERE.
#[derive(Clone, Debug)]
pub struct DeleteQb {
    /// Table name, optionally followed by an alias
    table: String,
    /// WHERE conditions
    where_group: ExprGroup,
    /// RETURNING columns
    returning_cols: Vec<String>,
}

impl DeleteQb {
    /// Create a new DELETE query builder.
    ///
    /// A DELETE without WHERE conditions renders `WHERE 1=0` and deletes nothing.
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            where_group: ExprGroup::new(),
            returning_cols: Vec::new(),
        }
    }

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

    /// Set RETURNING columns.
    pub fn returning(mut self, cols: &str) -> Self {
        self.returning_cols = vec![cols.to_string()];
        self
    }
}

impl SqlQb for DeleteQb {
    fn build_into(&self, params: &mut ParamList) -> String {
        let mut sql = format!("DELETE FROM {}", self.table);

        let where_sql = self.where_group.build(params);
        if where_sql.is_empty() {
            sql.push_str(" WHERE 1=0");
        } else {
            sql.push_str(" WHERE ");
            sql.push_str(&where_sql);
        }

        if !self.returning_cols.is_empty() {
            sql.push_str(" RETURNING ");
            sql.push_str(&self.returning_cols.join(", "));
        }

        sql
    }
}

impl MutationQb for DeleteQb {
    fn returning_all(self) -> Self {
        self.returning("*")
    }

    fn has_returning(&self) -> bool {
        !self.returning_cols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delete_by_ids() {
        let qb = DeleteQb::new("cases.priority")
            .eq("dc", 1i64)
            .any("id", vec![5i64, 6]);
        assert_eq!(
            qb.to_sql(),
            "DELETE FROM cases.priority WHERE dc = $1 AND id = ANY($2)"
        );
    }

    #[test]
    fn test_delete_safe_default() {
        assert_eq!(DeleteQb::new("t").to_sql(), "DELETE FROM t WHERE 1=0");
    }

    #[test]
    fn test_delete_empty_ids_matches_nothing() {
        let qb = DeleteQb::new("t").any::<i64>("id", vec![]).returning_all();
        assert_eq!(qb.to_sql(), "DELETE FROM t WHERE 1=0 RETURNING *");
    }
}
