//! Mutation-as-CTE composition.
//!
//! An INSERT/UPDATE/DELETE is rendered with `RETURNING *` as a named CTE and
//! the projection builder then selects from that alias exactly as it would
//! from the base table, so one statement both writes and returns the
//! requested fields:
//!
//! ```ignore
//! let query = WithQb::new()
//!     .mutation("p", qb::insert("cases.priority").set("dc", dc).set("name", name))?
//!     .select(projected_select_over_p);
//! // WITH p AS (INSERT ... RETURNING *) SELECT p.id, p.name FROM p
//! ```
//!
//! Side-effect CTEs (for example resetting an `initial` flag) are added with
//! [`WithQb::with`] before the main mutation and run in the same statement.

use crate::error::StoreResult;
use crate::ident::validate_name;
use crate::qb::{MutationQb, ParamList, SelectQb, SqlQb};
use crate::sql_text::form_as_cte;

/// Internal representation of a single CTE definition.
struct CteDefinition {
    name: String,
    query: Box<dyn SqlQb>,
}

/// Builder for the `WITH` part of a composed statement.
#[must_use]
#[derive(Default)]
pub struct WithQb {
    ctes: Vec<CteDefinition>,
}

impl WithQb {
    pub fn new() -> Self {
        Self { ctes: Vec::new() }
    }

    /// Add a CTE rendered as-is (side effects, helper selects).
    pub fn with(mut self, name: &str, query: impl SqlQb + 'static) -> StoreResult<Self> {
        validate_name(name)?;
        self.ctes.push(CteDefinition {
            name: name.to_string(),
            query: Box::new(query),
        });
        Ok(self)
    }

    /// Add the main mutation CTE. Its RETURNING list is forced to `*`.
    pub fn mutation<M: MutationQb + 'static>(self, name: &str, query: M) -> StoreResult<Self> {
        self.with(name, query.returning_all())
    }

    /// Number of CTEs added so far.
    pub fn len(&self) -> usize {
        self.ctes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ctes.is_empty()
    }

    /// Finish with the SELECT that reads from the CTEs.
    pub fn select(self, main: SelectQb) -> WithSelectQb {
        WithSelectQb { with: self, main }
    }
}

/// `WITH ... SELECT ...` statement.
pub struct WithSelectQb {
    with: WithQb,
    main: SelectQb,
}

impl WithSelectQb {
    /// The trailing SELECT.
    pub fn main(&self) -> &SelectQb {
        &self.main
    }
}

impl SqlQb for WithSelectQb {
    fn build_into(&self, params: &mut ParamList) -> String {
        let main = |params: &mut ParamList| self.main.build_into(params);
        if self.with.ctes.is_empty() {
            return main(params);
        }
        let parts: Vec<String> = self
            .with
            .ctes
            .iter()
            .map(|cte| form_as_cte(&cte.name, &cte.query.build_into(params)))
            .collect();
        format!("WITH {} {}", parts.join(", "), main(params))
    }

    fn validate(&self) -> StoreResult<()> {
        for cte in &self.with.ctes {
            cte.query.validate()?;
        }
        self.main.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qb;

    #[test]
    fn mutation_is_forced_to_return_all() {
        let query = WithQb::new()
            .mutation(
                "p",
                qb::insert("cases.priority")
                    .set("dc", 1i64)
                    .set("name", "High")
                    .returning("id"),
            )
            .unwrap()
            .select(qb::select("p").column("p.id").column("p.name"));
        assert_eq!(
            query.to_sql(),
            "WITH p AS (INSERT INTO cases.priority (dc, name) VALUES ($1, $2) RETURNING *) \
             SELECT p.id, p.name FROM p"
        );
    }

    #[test]
    fn prelude_ctes_share_numbering() {
        let query = WithQb::new()
            .with(
                "reset_initial",
                qb::update("cases.status_condition")
                    .set("initial", false)
                    .eq("dc", 1i64)
                    .eq("status_id", 2i64)
                    .raw("initial"),
            )
            .unwrap()
            .mutation(
                "s",
                qb::update("cases.status_condition")
                    .set("initial", true)
                    .eq("dc", 1i64)
                    .eq("id", 5i64),
            )
            .unwrap()
            .select(qb::select("s").column("s.id"));
        let built = query.build().unwrap();
        assert_eq!(
            built.sql,
            "WITH reset_initial AS (UPDATE cases.status_condition SET initial = $1 \
             WHERE dc = $2 AND status_id = $3 AND initial), \
             s AS (UPDATE cases.status_condition SET initial = $4 WHERE dc = $5 AND id = $6 RETURNING *) \
             SELECT s.id FROM s"
        );
        assert_eq!(built.params.len(), 6);
    }

    #[test]
    fn invalid_cte_name_is_rejected() {
        assert!(WithQb::new().with("p; drop", qb::select("t")).is_err());
    }

    #[test]
    fn validation_reaches_ctes() {
        let query = WithQb::new()
            .mutation("p", qb::update("t").eq("id", 1i64))
            .unwrap()
            .select(qb::select("p"));
        assert!(query.build().is_err());
    }
}
