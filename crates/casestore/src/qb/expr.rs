//! Predicate tree for WHERE clauses and parameterized SELECT expressions.
//!
//! `Expr::build()` renders SQL with `$n` placeholders numbered from the current
//! length of the [`ParamList`] it appends to, so fragments from several builders
//! (CTE bodies, select columns, WHERE clauses) can share one parameter list
//! without any string rewriting.

use crate::qb::param::{Param, ParamList};
use tokio_postgres::types::ToSql;

/// Expression node for building WHERE clauses.
#[derive(Clone, Debug)]
pub enum Expr {
    /// AND group: all conditions must be true.
    And(Vec<Expr>),

    /// OR group: at least one condition must be true.
    Or(Vec<Expr>),

    /// NOT: negate the inner expression.
    Not(Box<Expr>),

    /// Simple comparison: column op $n
    Compare {
        column: String,
        op: &'static str,
        value: Param,
    },

    /// Array comparison: `column = ANY($n)` or `column != ALL($n)`
    Array {
        column: String,
        negated: bool,
        value: Param,
    },

    /// NULL check: column IS NULL or column IS NOT NULL
    NullCheck { column: String, is_null: bool },

    /// Template with `?` placeholders that get replaced with `$n`.
    /// Example: `Template { sql: "a = ? OR b = ?", params: [1, 2] }` -> `a = $1 OR b = $2`
    Template { sql: String, params: Vec<Param> },

    /// Raw SQL fragment without parameters.
    Raw(String),

    /// Always true.
    True,

    /// Always false.
    False,
}

impl Expr {
    /// Create an AND expression from a list of expressions.
    pub fn and(exprs: Vec<Expr>) -> Self {
        Expr::And(exprs)
    }

    /// Create an OR expression from a list of expressions.
    pub fn or(exprs: Vec<Expr>) -> Self {
        Expr::Or(exprs)
    }

    /// Create a NOT expression.
    #[allow(clippy::should_implement_trait)]
    pub fn not(expr: Expr) -> Self {
        Expr::Not(Box::new(expr))
    }

    /// Create a comparison with an already wrapped parameter.
    pub fn compare(column: impl Into<String>, op: &'static str, value: Param) -> Self {
        Expr::Compare {
            column: column.into(),
            op,
            value,
        }
    }

    /// Create an equality condition: column = value
    pub fn eq<T: ToSql + Send + Sync + 'static>(column: impl Into<String>, value: T) -> Self {
        Self::compare(column, "=", Param::new(value))
    }

    /// Create an inequality condition: column != value
    pub fn ne<T: ToSql + Send + Sync + 'static>(column: impl Into<String>, value: T) -> Self {
        Self::compare(column, "!=", Param::new(value))
    }

    /// Create `column = ANY($n)` from a list of values.
    pub fn any<T: ToSql + Send + Sync + 'static>(column: impl Into<String>, values: Vec<T>) -> Self {
        if values.is_empty() {
            return Expr::False;
        }
        Expr::Array {
            column: column.into(),
            negated: false,
            value: Param::new(values),
        }
    }

    /// Create `column != ALL($n)` from a list of values.
    pub fn not_all<T: ToSql + Send + Sync + 'static>(
        column: impl Into<String>,
        values: Vec<T>,
    ) -> Self {
        if values.is_empty() {
            return Expr::True;
        }
        Expr::Array {
            column: column.into(),
            negated: true,
            value: Param::new(values),
        }
    }

    /// Create an IS NULL condition: column IS NULL
    pub fn is_null(column: impl Into<String>) -> Self {
        Expr::NullCheck {
            column: column.into(),
            is_null: true,
        }
    }

    /// Create an IS NOT NULL condition: column IS NOT NULL
    pub fn is_not_null(column: impl Into<String>) -> Self {
        Expr::NullCheck {
            column: column.into(),
            is_null: false,
        }
    }

    /// Create a template expression with `?` placeholders.
    ///
    /// # Example
    /// ```ignore
    /// Expr::template("a = ? OR b = ?", vec![Param::new(1), Param::new(2)])
    /// ```
    pub fn template(sql: impl Into<String>, params: Vec<Param>) -> Self {
        Expr::Template {
            sql: sql.into(),
            params,
        }
    }

    /// Create a raw SQL fragment.
    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    /// Check if this expression is empty (contains no conditions).
    pub fn is_empty(&self) -> bool {
        match self {
            Expr::And(exprs) | Expr::Or(exprs) => exprs.iter().all(|e| e.is_empty()),
            Expr::Not(inner) => inner.is_empty(),
            _ => false,
        }
    }

    /// Build the SQL fragment with proper `$n` placeholders.
    ///
    /// Parameters are appended to `params`; numbering continues from its length.
    pub fn build(&self, params: &mut ParamList) -> String {
        match self {
            Expr::And(exprs) => join_group(exprs, " AND ", params, |e| matches!(e, Expr::Or(_))),
            Expr::Or(exprs) => join_group(exprs, " OR ", params, |e| matches!(e, Expr::And(_))),
            Expr::Not(inner) => {
                let sql = inner.build(params);
                if sql.is_empty() {
                    String::new()
                } else {
                    format!("NOT ({sql})")
                }
            }
            Expr::Compare { column, op, value } => {
                let idx = params.push_param(value.clone());
                format!("{column} {op} ${idx}")
            }
            Expr::Array {
                column,
                negated,
                value,
            } => {
                let idx = params.push_param(value.clone());
                if *negated {
                    format!("{column} != ALL(${idx})")
                } else {
                    format!("{column} = ANY(${idx})")
                }
            }
            Expr::NullCheck { column, is_null } => {
                if *is_null {
                    format!("{column} IS NULL")
                } else {
                    format!("{column} IS NOT NULL")
                }
            }
            Expr::Template {
                sql,
                params: template_params,
            } => {
                let mut result = String::with_capacity(sql.len() + 8);
                let mut values = template_params.iter();
                for ch in sql.chars() {
                    if ch == '?' {
                        if let Some(value) = values.next() {
                            let idx = params.push_param(value.clone());
                            result.push('$');
                            result.push_str(&idx.to_string());
                            continue;
                        }
                    }
                    result.push(ch);
                }
                result
            }
            Expr::Raw(sql) => sql.clone(),
            Expr::True => "1=1".to_string(),
            Expr::False => "1=0".to_string(),
        }
    }
}

fn join_group(
    exprs: &[Expr],
    sep: &str,
    params: &mut ParamList,
    needs_parens: impl Fn(&Expr) -> bool,
) -> String {
    let mut parts = Vec::with_capacity(exprs.len());
    for e in exprs.iter().filter(|e| !e.is_empty()) {
        let sql = e.build(params);
        if sql.is_empty() {
            continue;
        }
        if needs_parens(e) && group_len(e) > 1 {
            parts.push(format!("({sql})"));
        } else {
            parts.push(sql);
        }
    }
    parts.join(sep)
}

fn group_len(e: &Expr) -> usize {
    match e {
        Expr::And(exprs) | Expr::Or(exprs) => exprs.iter().filter(|e| !e.is_empty()).count(),
        _ => 1,
    }
}

/// Conditions that are ANDed together, used by every builder's WHERE clause.
#[derive(Clone, Debug, Default)]
pub struct ExprGroup {
    exprs: Vec<Expr>,
}

impl ExprGroup {
    /// Create a new empty expression group.
    pub fn new() -> Self {
        Self { exprs: Vec::new() }
    }

    /// Check if the group is empty.
    pub fn is_empty(&self) -> bool {
        self.exprs.iter().all(|e| e.is_empty())
    }

    /// Add an expression to be ANDed.
    pub fn and_expr(&mut self, expr: Expr) {
        self.exprs.push(expr);
    }

    /// Add a condition: column = value
    pub fn eq<T: ToSql + Send + Sync + 'static>(&mut self, column: &str, value: T) {
        self.exprs.push(Expr::eq(column, value));
    }

    /// Add a condition: column = ANY(values)
    pub fn any<T: ToSql + Send + Sync + 'static>(&mut self, column: &str, values: Vec<T>) {
        self.exprs.push(Expr::any(column, values));
    }

    /// Add a raw SQL condition.
    pub fn raw(&mut self, sql: &str) {
        self.exprs.push(Expr::raw(sql));
    }

    /// Add a template condition with `?` placeholders.
    pub fn template(&mut self, sql: &str, params: Vec<Param>) {
        self.exprs.push(Expr::template(sql, params));
    }

    /// Build the WHERE clause content (without the "WHERE" keyword).
    pub fn build(&self, params: &mut ParamList) -> String {
        join_group(&self.exprs, " AND ", params, |e| matches!(e, Expr::Or(_)))
    }

    /// Get all expressions.
    pub fn exprs(&self) -> &[Expr] {
        &self.exprs
    }
}
