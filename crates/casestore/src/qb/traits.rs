//! Trait definitions for query builders.

use crate::client::GenericClient;
use crate::error::StoreResult;
use crate::qb::param::ParamList;
use tokio_postgres::Row;

/// Base trait for all query builders.
///
/// Builders render into a shared [`ParamList`], so one statement can be
/// assembled from several builders (CTE bodies followed by a SELECT) with a
/// single placeholder sequence. The trait is object safe.
pub trait SqlQb: Send + Sync {
    /// Render SQL, appending parameters to `params`.
    fn build_into(&self, params: &mut ParamList) -> String;

    /// Validate builder state before execution.
    fn validate(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Debug helper to get the SQL string.
    fn to_sql(&self) -> String {
        self.build_into(&mut ParamList::new())
    }

    /// Validate and render into a standalone statement.
    fn build(&self) -> StoreResult<BuiltQuery> {
        self.validate()?;
        let mut params = ParamList::new();
        let sql = self.build_into(&mut params);
        Ok(BuiltQuery::new(sql, params))
    }
}

/// Trait for mutation builders (INSERT/UPDATE/DELETE).
pub trait MutationQb: SqlQb {
    /// Replace the RETURNING list with `RETURNING *`.
    fn returning_all(self) -> Self
    where
        Self: Sized;

    /// Whether the statement has a RETURNING clause.
    fn has_returning(&self) -> bool;
}

/// A rendered statement ready to run.
#[derive(Debug, Clone)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: ParamList,
    tag: Option<String>,
}

impl BuiltQuery {
    /// Create a new built query.
    pub fn new(sql: String, params: ParamList) -> Self {
        Self {
            sql,
            params,
            tag: None,
        }
    }

    /// Attach an observability tag such as `postgres.priority.create`.
    pub fn tagged(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    /// Execute and return all rows.
    pub async fn fetch_all(&self, conn: &impl GenericClient) -> StoreResult<Vec<Row>> {
        let params = self.params.as_refs();
        match &self.tag {
            Some(tag) => conn.query_tagged(tag, &self.sql, &params).await,
            None => conn.query(&self.sql, &params).await,
        }
    }

    /// Execute and return the first row, if any.
    pub async fn fetch_opt(&self, conn: &impl GenericClient) -> StoreResult<Option<Row>> {
        let params = self.params.as_refs();
        match &self.tag {
            Some(tag) => conn.query_opt_tagged(tag, &self.sql, &params).await,
            None => conn.query_opt(&self.sql, &params).await,
        }
    }

    /// Execute and return the first row; zero rows is `NotFound`.
    pub async fn fetch_one(&self, conn: &impl GenericClient) -> StoreResult<Row> {
        let params = self.params.as_refs();
        match &self.tag {
            Some(tag) => conn.query_one_tagged(tag, &self.sql, &params).await,
            None => conn.query_one(&self.sql, &params).await,
        }
    }

    /// Execute and return the affected row count.
    pub async fn execute(&self, conn: &impl GenericClient) -> StoreResult<u64> {
        let params = self.params.as_refs();
        match &self.tag {
            Some(tag) => conn.execute_tagged(tag, &self.sql, &params).await,
            None => conn.execute(&self.sql, &params).await,
        }
    }
}
