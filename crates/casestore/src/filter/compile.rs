//! Iterative filter-tree compiler.

use crate::error::{StoreError, StoreResult};
use crate::filter::{Comparison, Connective, Filter, FilterExpr, FilterValue, ValueEncoders};
use crate::ident::ColumnRef;
use crate::qb::{Expr, SelectQb};
use crate::sql_text::qualify;

/// Resolves the `fk` segment of an `fk.column` reference to a joined alias.
///
/// Implementations add the actual `LEFT JOIN` to `qb`, normally through
/// [`SelectQb::left_join_once`], and return the alias to qualify with.
pub trait JoinResolver {
    fn resolve_join(&self, fk: &str, qb: &mut SelectQb) -> StoreResult<String>;
}

impl<F> JoinResolver for F
where
    F: Fn(&str, &mut SelectQb) -> StoreResult<String>,
{
    fn resolve_join(&self, fk: &str, qb: &mut SelectQb) -> StoreResult<String> {
        self(fk, qb)
    }
}

/// Resolver for entities without joinable references.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoJoins;

impl JoinResolver for NoJoins {
    fn resolve_join(&self, fk: &str, _qb: &mut SelectQb) -> StoreResult<String> {
        Err(StoreError::invalid_argument(
            "store.filter.join",
            format!("no join defined for '{fk}'"),
        ))
    }
}

/// Compiles [`FilterExpr`] trees against a root alias.
pub struct FilterCompiler<'a> {
    alias: &'a str,
    resolver: &'a dyn JoinResolver,
    encoders: Option<&'a ValueEncoders>,
}

enum Frame<'e> {
    Enter(&'e FilterExpr),
    Exit { connective: Connective, count: usize },
}

impl<'a> FilterCompiler<'a> {
    /// `alias` qualifies bare columns; an empty alias leaves them unqualified.
    pub fn new(alias: &'a str, resolver: &'a dyn JoinResolver) -> Self {
        Self {
            alias,
            resolver,
            encoders: None,
        }
    }

    pub fn with_encoders(mut self, encoders: &'a ValueEncoders) -> Self {
        self.encoders = Some(encoders);
        self
    }

    /// Compile `expr` into a predicate. Joins needed by dotted columns are
    /// added to `qb`, each foreign table at most once.
    ///
    /// An empty tree compiles to `1=1`.
    pub fn compile(&self, expr: &FilterExpr, qb: &mut SelectQb) -> StoreResult<Expr> {
        let mut work = vec![Frame::Enter(expr)];
        let mut out: Vec<Expr> = Vec::new();

        while let Some(frame) = work.pop() {
            match frame {
                Frame::Enter(FilterExpr::Leaf(filter)) => out.push(self.compile_leaf(filter, qb)?),
                Frame::Enter(FilterExpr::Node(node)) => {
                    work.push(Frame::Exit {
                        connective: node.connective,
                        count: node.nodes.len(),
                    });
                    work.extend(node.nodes.iter().rev().map(Frame::Enter));
                }
                Frame::Exit { connective, count } => {
                    let children = out.split_off(out.len() - count);
                    out.push(match connective {
                        Connective::And => Expr::And(children),
                        Connective::Or => Expr::Or(children),
                    });
                }
            }
        }

        match out.pop() {
            Some(expr) if !expr.is_empty() => Ok(expr),
            _ => Ok(Expr::True),
        }
    }

    /// Compile `expr` and AND it into the WHERE clause of `qb`.
    pub fn apply(&self, expr: &FilterExpr, qb: &mut SelectQb) -> StoreResult<()> {
        let predicate = self.compile(expr, qb)?;
        qb.push_where(predicate);
        Ok(())
    }

    fn compile_leaf(&self, filter: &Filter, qb: &mut SelectQb) -> StoreResult<Expr> {
        let column_ref = ColumnRef::parse(&filter.column)?;
        let column = match &column_ref.fk {
            None => qualify(self.alias, &column_ref.column),
            Some(fk) => {
                let alias = self.join_alias(fk, qb)?;
                qualify(&alias, &column_ref.column)
            }
        };

        let value = match self.encoders {
            Some(encoders) => encoders.encode(&filter.column, &filter.value)?,
            None => filter.value.clone(),
        };

        leaf_expr(column, filter.comparison, &value)
    }

    fn join_alias(&self, fk: &str, qb: &mut SelectQb) -> StoreResult<String> {
        if let Some(alias) = qb.join_alias(fk) {
            return Ok(alias.to_string());
        }
        let alias = self.resolver.resolve_join(fk, qb)?;
        if qb.join_alias(fk).is_none() {
            qb.remember_join(fk, &alias);
        }
        Ok(alias)
    }
}

fn leaf_expr(column: String, comparison: Comparison, value: &FilterValue) -> StoreResult<Expr> {
    match (comparison, value) {
        (Comparison::Eq, FilterValue::Null) => Ok(Expr::is_null(column)),
        (Comparison::NotEq, FilterValue::Null) => Ok(Expr::is_not_null(column)),
        (_, FilterValue::Null) => Err(StoreError::invalid_argument(
            "store.filter.null_comparison",
            format!("'{comparison}' cannot compare {column} with null"),
        )),
        (Comparison::Eq | Comparison::NotEq, list) if list.is_list() => Ok(Expr::Array {
            column,
            negated: comparison == Comparison::NotEq,
            value: list.to_param(),
        }),
        (_, list) if list.is_list() => Err(StoreError::invalid_argument(
            "store.filter.list_comparison",
            format!("'{comparison}' cannot compare {column} with a list"),
        )),
        (_, scalar) => Ok(Expr::compare(column, comparison.as_sql(), scalar.to_param())),
    }
}
