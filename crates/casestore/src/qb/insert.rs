//! INSERT query builder using the unified expression layer.

use crate::error::{StoreError, StoreResult};
use crate::qb::expr::Expr;
use crate::qb::param::{Param, ParamList};
use crate::qb::select::SelectQb;
use crate::qb::traits::{MutationQb, SqlQb};
use tokio_postgres::types::ToSql;

/// Value expression for INSERT.
#[derive(Clone, Debug)]
enum ValueExpr {
    /// Parameterized value
    Param(Param),
    /// Raw SQL expression without parameter
    Raw(String),
    /// Parameterized expression
    Expr(Expr),
}

/// INSERT query builder.
#[derive(Clone, Debug)]
pub struct InsertQb {
    /// Table name
    table: String,
    /// Column names
    columns: Vec<String>,
    /// Value expressions, index-aligned with `columns`
    value_exprs: Vec<ValueExpr>,
    /// `INSERT ... SELECT` source, exclusive with `value_exprs`
    source: Option<SelectQb>,
    /// RETURNING columns
    returning_cols: Vec<String>,
    /// ON CONFLICT (...) DO NOTHING target
    conflict_target: Option<String>,
}

impl InsertQb {
    /// Create a new INSERT query builder.
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            columns: Vec::new(),
            value_exprs: Vec::new(),
            source: None,
            returning_cols: Vec::new(),
            conflict_target: None,
        }
    }

    /// Set a column value.
    pub fn set<T: ToSql + Send + Sync + 'static>(self, column: &str, value: T) -> Self {
        self.set_param(column, Param::new(value))
    }

    /// Set a column to an already wrapped parameter.
    pub fn set_param(mut self, column: &str, value: Param) -> Self {
        self.columns.push(column.to_string());
        self.value_exprs.push(ValueExpr::Param(value));
        self
    }

    /// Set an optional column value (None => skip, the column default applies).
    pub fn set_opt<T: ToSql + Send + Sync + 'static>(self, column: &str, value: Option<T>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// Set a raw SQL expression, e.g. `now()`.
    pub fn set_raw(mut self, column: &str, expr: &str) -> Self {
        self.columns.push(column.to_string());
        self.value_exprs.push(ValueExpr::Raw(expr.to_string()));
        self
    }

    /// Set a parameterized expression, e.g. `? OR NOT EXISTS(...)`.
    pub fn set_expr(mut self, column: &str, expr: Expr) -> Self {
        self.columns.push(column.to_string());
        self.value_exprs.push(ValueExpr::Expr(expr));
        self
    }

    /// Insert the rows of `source` into `columns` (`INSERT ... SELECT`).
    ///
    /// The SELECT list of `source` must line up with `columns`.
    pub fn select_from(mut self, columns: &[&str], source: SelectQb) -> Self {
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self.source = Some(source);
        self
    }

    /// Set RETURNING columns.
    pub fn returning(mut self, cols: &str) -> Self {
        self.returning_cols = vec![cols.to_string()];
        self
    }

    /// Add `ON CONFLICT (target) DO NOTHING`.
    pub fn on_conflict_do_nothing(mut self, target: &str) -> Self {
        self.conflict_target = Some(target.to_string());
        self
    }
}

impl SqlQb for InsertQb {
    fn build_into(&self, params: &mut ParamList) -> String {
        let mut sql = if let Some(source) = &self.source {
            format!(
                "INSERT INTO {} ({}) {}",
                self.table,
                self.columns.join(", "),
                source.build_into(params)
            )
        } else if self.columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", self.table)
        } else {
            let value_parts: Vec<String> = self
                .value_exprs
                .iter()
                .map(|expr| match expr {
                    ValueExpr::Param(p) => format!("${}", params.push_param(p.clone())),
                    ValueExpr::Raw(raw) => raw.clone(),
                    ValueExpr::Expr(expr) => expr.build(params),
                })
                .collect();
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                self.table,
                self.columns.join(", "),
                value_parts.join(", ")
            )
        };

        if let Some(target) = &self.conflict_target {
            sql.push_str(" ON CONFLICT (");
            sql.push_str(target);
            sql.push_str(") DO NOTHING");
        }

        if !self.returning_cols.is_empty() {
            sql.push_str(" RETURNING ");
            sql.push_str(&self.returning_cols.join(", "));
        }

        sql
    }

    fn validate(&self) -> StoreResult<()> {
        if self.source.is_some() {
            if !self.value_exprs.is_empty() {
                return Err(StoreError::internal(
                    "store.qb.insert",
                    "cannot mix select_from and set methods",
                ));
            }
            if self.columns.is_empty() {
                return Err(StoreError::internal(
                    "store.qb.insert",
                    "select_from needs target columns",
                ));
            }
        }
        Ok(())
    }
}

impl MutationQb for InsertQb {
    fn returning_all(self) -> Self {
        self.returning("*")
    }

    fn has_returning(&self) -> bool {
        !self.returning_cols.is_empty()
    }
}
