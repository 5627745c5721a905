//! Query builders for casestore.
//!
//! All builders render through [`SqlQb::build_into`], which appends parameters
//! to a caller-owned [`ParamList`]. Placeholder indices are computed while
//! rendering, never by rewriting SQL text afterwards.
//!
//! ```ignore
//! use casestore::qb::{self, SqlQb};
//!
//! let rows = qb::select("cases.priority p")
//!     .column("p.id")
//!     .column("p.name")
//!     .eq("p.dc", domain_id)
//!     .order_by("p.name ASC")
//!     .limit(11)
//!     .build()?
//!     .fetch_all(&client)
//!     .await?;
//! ```

mod delete;
mod expr;
mod insert;
mod param;
mod select;
mod traits;
mod update;

pub use delete::DeleteQb;
pub use expr::{Expr, ExprGroup};
pub use insert::InsertQb;
pub use param::{Param, ParamList};
pub use select::SelectQb;
pub use traits::{BuiltQuery, MutationQb, SqlQb};
pub use update::UpdateQb;

/// Create a SELECT query builder for a table or FROM expression.
pub fn select(from_expr: &str) -> SelectQb {
    SelectQb::new(from_expr)
}

/// Create an INSERT query builder for the given table.
pub fn insert(table: &str) -> InsertQb {
    InsertQb::new(table)
}

/// Create an UPDATE query builder for the given table.
pub fn update(table: &str) -> UpdateQb {
    UpdateQb::new(table)
}

/// Create a DELETE query builder for the given table.
///
/// Without WHERE conditions the statement renders `WHERE 1=0` (no-op).
pub fn delete(table: &str) -> DeleteQb {
    DeleteQb::new(table)
}

#[cfg(test)]
mod tests;
