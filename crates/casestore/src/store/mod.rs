//! Entity stores.
//!
//! Each store pairs a static [`Projection`] with the statements of one
//! entity. Statements are assembled by pure `build_*` functions (covered by
//! unit tests on their SQL) and executed by thin async methods that tag the
//! statement and translate driver errors into ids of the form
//! `postgres.<entity>.<operation>.<step>`.

pub mod catalog;
pub mod comment;
pub mod priority;
pub mod sla_condition;
pub mod status_condition;

pub use catalog::{Catalog, CatalogInput, CatalogStore, Service};
pub use comment::{Comment, CommentInput, CommentStore};
pub use priority::{Priority, PriorityInput, PriorityStore};
pub use sla_condition::{SlaCondition, SlaConditionInput, SlaConditionStore};
pub use status_condition::{StatusCondition, StatusConditionInput, StatusConditionStore};

use crate::client::GenericClient;
use crate::config::StoreConfig;
use crate::cte::{WithQb, WithSelectQb};
use crate::error::{ConstraintMessages, ErrorTranslator, StoreError, StoreResult};
use crate::filter::{
    FieldType, FilterCompiler, FilterExpr, ValueEncoders, apply_filters_to_query, field_type,
};
use crate::ident::ColumnRef;
use crate::options::{SearchOptions, UpdateOptions};
use crate::paging::{ListResult, Paging, PagingLimits, apply_sort};
use crate::projection::{LookupJoin, Projection, ProjectionCtx, ScanPlan};
use crate::qb::{Expr, MutationQb, Param, SelectQb, SqlQb};
use crate::sql_text::qualify;
use std::sync::Arc;

/// Dependencies shared by every entity store.
#[derive(Debug, Clone, Default)]
pub struct StoreContext {
    translator: Arc<ErrorTranslator>,
    paging: PagingLimits,
}

impl StoreContext {
    pub fn new(translator: ErrorTranslator, paging: PagingLimits) -> Self {
        Self {
            translator: Arc::new(translator),
            paging,
        }
    }

    pub fn from_config(config: &StoreConfig, messages: ConstraintMessages) -> Self {
        Self::new(ErrorTranslator::new(messages), config.paging_limits())
    }

    pub fn paging_limits(&self) -> &PagingLimits {
        &self.paging
    }

    pub(crate) fn paging(&self, opts: &SearchOptions) -> Paging {
        Paging::new(opts.page, opts.size, &self.paging)
    }

    pub(crate) fn translate(&self, err: StoreError, id: &str) -> StoreError {
        self.translator.translate(err, id)
    }

    /// Run a SELECT and scan every row through `plan`.
    pub(crate) async fn fetch_all<T: Default>(
        &self,
        conn: &impl GenericClient,
        query: &impl SqlQb,
        plan: &ScanPlan<T>,
        entity: &str,
        op: &str,
    ) -> StoreResult<Vec<T>> {
        let built = query.build()?.tagged(tag(entity, op));
        let rows = built
            .fetch_all(conn)
            .await
            .map_err(|e| self.translate(e, &step_id(entity, op, "exec")))?;
        plan.scan_all(&rows)
    }

    /// Run a statement expected to yield one row; zero rows is `NotFound`.
    pub(crate) async fn fetch_one<T: Default>(
        &self,
        conn: &impl GenericClient,
        query: &impl SqlQb,
        plan: &ScanPlan<T>,
        entity: &str,
        op: &str,
    ) -> StoreResult<T> {
        let built = query.build()?.tagged(tag(entity, op));
        let row = built
            .fetch_opt(conn)
            .await
            .map_err(|e| self.translate(e, &step_id(entity, op, "exec")))?
            .ok_or_else(|| {
                StoreError::not_found(step_id(entity, op, "not_found"), format!("{entity} not found"))
            })?;
        plan.scan(&row)
    }

    /// Run a statement and return the affected row count.
    pub(crate) async fn execute(
        &self,
        conn: &impl GenericClient,
        query: &impl SqlQb,
        entity: &str,
        op: &str,
    ) -> StoreResult<u64> {
        query
            .build()?
            .tagged(tag(entity, op))
            .execute(conn)
            .await
            .map_err(|e| self.translate(e, &step_id(entity, op, "exec")))
    }

    /// Run a prepared list and trim it to a page.
    pub(crate) async fn fetch_page<T: Default>(
        &self,
        conn: &impl GenericClient,
        list: ListPlan<T>,
        entity: &str,
    ) -> StoreResult<ListResult<T>> {
        let items = self
            .fetch_all(conn, &list.qb, &list.plan, entity, "list")
            .await?;
        Ok(list.paging.finish(items))
    }
}

/// `postgres.<entity>.<op>`, the statement tag.
pub(crate) fn tag(entity: &str, op: &str) -> String {
    format!("postgres.{entity}.{op}")
}

/// `postgres.<entity>.<op>.<step>`, the error id.
pub(crate) fn step_id(entity: &str, op: &str, step: &str) -> String {
    format!("postgres.{entity}.{op}.{step}")
}

/// Lookup of a user name through `directory.wbt_user`.
pub(crate) const fn user_join(alias: &'static str, fk: &'static str) -> LookupJoin {
    LookupJoin {
        table: "directory.wbt_user",
        alias,
        fk,
        name: "name",
    }
}

/// Append `mutation` to `with` as CTE `name` and select the projected
/// `fields` from it.
pub(crate) fn compose<T, M: MutationQb + 'static>(
    with: WithQb,
    projection: &Projection<T>,
    name: &str,
    mutation: M,
    user_id: i64,
    fields: &[String],
) -> StoreResult<(WithSelectQb, ScanPlan<T>)> {
    let ctx = ProjectionCtx::new(name, user_id);
    let (select, plan) = projection.build_columns(SelectQb::new(name), &ctx, fields)?;
    Ok((with.mutation(name, mutation)?.select(select), plan))
}

/// Reject update masks naming fields that cannot be written.
pub(crate) fn check_mask(opts: &UpdateOptions, mutable: &[&str]) -> StoreResult<()> {
    match opts.mask.iter().find(|f| !mutable.contains(&f.as_str())) {
        Some(field) => Err(StoreError::invalid_argument(
            "store.mask.unknown_field",
            format!("field cannot be updated: {field}"),
        )),
        None => Ok(()),
    }
}

/// Static description of an entity's list query.
pub(crate) struct ListSpec<T: 'static> {
    /// Base table
    pub table: &'static str,
    /// Root alias
    pub alias: &'static str,
    pub projection: &'static Projection<T>,
    /// Sortable columns
    pub sort_fields: &'static [&'static str],
    pub default_sort: &'static str,
    /// Column matched by [`SearchOptions::search`]
    pub search_column: Option<&'static str>,
    /// Filterable root columns and their types, shared by flat filters and
    /// bare filter-tree columns. Lookup fields are filtered as `fk.id` or
    /// `fk.<name column>`.
    pub filter_fields: &'static [(&'static str, FieldType)],
    /// Flat filter names handled by the entity itself
    pub named_filters: &'static [&'static str],
    pub encoders: Option<&'static ValueEncoders>,
}

/// A list query ready for entity-specific conditions.
pub(crate) struct ListPlan<T> {
    pub qb: SelectQb,
    pub plan: ScanPlan<T>,
    pub paging: Paging,
}

impl<T: 'static> ListSpec<T> {
    /// Projection, tenant scope, ids, search, filters, sort and paging.
    pub(crate) fn build(
        &self,
        opts: &SearchOptions,
        paging: Paging,
    ) -> StoreResult<ListPlan<T>> {
        let ctx = ProjectionCtx::new(self.alias, opts.auth.user_id());
        let base = SelectQb::new(&format!("{} {}", self.table, self.alias));
        let (mut qb, plan) = self.projection.build_columns(base, &ctx, &opts.fields)?;

        qb.push_where(Expr::eq(self.col("dc"), opts.auth.domain_id()));
        if !opts.ids.is_empty() {
            qb.push_where(Expr::any(self.col("id"), opts.ids.clone()));
        }
        if let (Some(column), Some(pattern)) = (self.search_column, opts.search_pattern()) {
            qb.push_where(Expr::template(
                format!("{} ILIKE ?", self.col(column)),
                vec![Param::new(pattern)],
            ));
        }

        let plain: Vec<_> = opts
            .filters
            .iter()
            .filter(|f| !self.named_filters.contains(&f.field.as_str()))
            .cloned()
            .collect();
        apply_filters_to_query(&mut qb, self.alias, &plain, self.filter_fields)?;

        if let Some(tree) = &opts.filter {
            let tree = self.typed_tree(tree)?;
            let joins = self.projection.joins(self.alias);
            let mut compiler = FilterCompiler::new(self.alias, &joins);
            if let Some(encoders) = self.encoders {
                compiler = compiler.with_encoders(encoders);
            }
            compiler.apply(&tree, &mut qb)?;
        }

        apply_sort(
            &mut qb,
            self.alias,
            &opts.sort,
            self.sort_fields,
            self.default_sort,
        )?;
        paging.apply(&mut qb);

        Ok(ListPlan { qb, plan, paging })
    }

    pub(crate) fn col(&self, column: &str) -> String {
        qualify(self.alias, column)
    }

    /// Copy of `tree` whose leaves name known columns and carry values of
    /// the column's type.
    fn typed_tree(&self, tree: &FilterExpr) -> StoreResult<FilterExpr> {
        let mut tree = tree.clone();
        for leaf in tree.leaves_mut() {
            let column = ColumnRef::parse(&leaf.column)?;
            let kind = match &column.fk {
                None => field_type(self.filter_fields, &column.column)?,
                Some(fk) => self.lookup_column_type(fk, &column.column)?,
            };
            leaf.value = kind.coerce(&leaf.column, leaf.comparison, &leaf.value)?;
        }
        Ok(tree)
    }

    fn lookup_column_type(&self, fk: &str, column: &str) -> StoreResult<FieldType> {
        let join = self.projection.lookup_join(fk).ok_or_else(|| {
            StoreError::invalid_argument(
                "store.filter.join",
                format!("no join defined for '{fk}'"),
            )
        })?;
        match column {
            "id" => Ok(FieldType::Int),
            name if name == join.name => Ok(FieldType::Text),
            _ => Err(StoreError::invalid_argument(
                "store.filter.unknown_field",
                format!("unknown filter field: {fk}.{column}"),
            )),
        }
    }
}
