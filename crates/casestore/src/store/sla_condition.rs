//! Conditions of an SLA and the priorities they apply to.
//!
//! The priority set lives in `cases.priority_sla_condition`. Writing a
//! condition takes several statements: the parent row (the SLA on create,
//! the condition on update) is checked and locked in the caller's domain, the
//! link rows are reconciled, then the condition row is written and projected,
//! so the projected `priorities` already reflect the new set. All of them
//! need one transaction, which is why those methods take `&Transaction`.
//!
//! Only priorities of the caller's domain can be linked.

use super::{ListPlan, ListSpec, StoreContext, check_mask, compose, step_id, user_join};
use crate::client::GenericClient;
use crate::cte::{WithQb, WithSelectQb};
use crate::error::{StoreError, StoreResult};
use crate::filter::FieldType;
use crate::options::{CreateOptions, DeleteOptions, SearchOptions, UpdateOptions};
use crate::paging::{ListResult, Paging};
use crate::projection::{Lookup, Projection, ProjectionCtx, ScanPlan, scan};
use crate::qb::{self, DeleteQb, Expr, InsertQb, SelectQb, SqlQb};
use crate::rbac::Auther;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use tokio_postgres::Transaction;

const ENTITY: &str = "sla_condition";
const TABLE: &str = "cases.sla_condition";
const LINKS: &str = "cases.priority_sla_condition";
const PRIORITIES: &str = "cases.priority";
const SLAS: &str = "cases.sla";
const ALIAS: &str = "c";

const MUTABLE: &[&str] = &["name", "reaction_time", "resolution_time", "priorities"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SlaCondition {
    pub id: i64,
    pub sla_id: i64,
    pub name: String,
    /// Minutes
    pub reaction_time: i64,
    /// Minutes
    pub resolution_time: i64,
    pub priorities: Vec<Lookup>,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<Lookup>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<Lookup>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SlaConditionInput {
    pub name: String,
    pub reaction_time: i64,
    pub resolution_time: i64,
    /// Priority ids
    #[serde(default)]
    pub priorities: Vec<i64>,
}

static SLA_CONDITION: LazyLock<Projection<SlaCondition>> = LazyLock::new(|| {
    Projection::<SlaCondition>::builder()
        .required(&["id"])
        .defaults(&["id", "name", "reaction_time", "resolution_time", "priorities"])
        .column("id", "id", |c, row, i| {
            c.id = scan::get(row, i)?;
            Ok(())
        })
        .column("sla_id", "sla_id", |c, row, i| {
            c.sla_id = scan::get(row, i)?;
            Ok(())
        })
        .column("name", "name", |c, row, i| {
            c.name = scan::get(row, i)?;
            Ok(())
        })
        .column("reaction_time", "reaction_time", |c, row, i| {
            c.reaction_time = scan::get(row, i)?;
            Ok(())
        })
        .column("resolution_time", "resolution_time", |c, row, i| {
            c.resolution_time = scan::get(row, i)?;
            Ok(())
        })
        .children(
            "priorities",
            |ctx| {
                format!(
                    "SELECT json_agg(json_build_object('id', pr.id, 'name', pr.name) ORDER BY pr.name) \
                     FROM cases.priority_sla_condition psc \
                     JOIN cases.priority pr ON pr.id = psc.priority_id AND pr.dc = psc.dc \
                     WHERE psc.sla_condition_id = {} AND psc.dc = {}",
                    ctx.col("id"),
                    ctx.col("dc")
                )
            },
            |c, row, i| {
                c.priorities = scan::children(row, i)?;
                Ok(())
            },
        )
        .column("created_at", "created_at", |c, row, i| {
            c.created_at = scan::get(row, i)?;
            Ok(())
        })
        .lookup("created_by", user_join("cb", "created_by"), |c, row, i| {
            c.created_by = scan::lookup(row, i)?;
            Ok(())
        })
        .column("updated_at", "updated_at", |c, row, i| {
            c.updated_at = scan::get(row, i)?;
            Ok(())
        })
        .lookup("updated_by", user_join("ub", "updated_by"), |c, row, i| {
            c.updated_by = scan::lookup(row, i)?;
            Ok(())
        })
        .build()
});

fn list_spec() -> ListSpec<SlaCondition> {
    ListSpec {
        table: TABLE,
        alias: ALIAS,
        projection: &SLA_CONDITION,
        sort_fields: &["id", "name", "reaction_time", "resolution_time", "created_at"],
        default_sort: "name",
        search_column: Some("name"),
        filter_fields: &[
            ("id", FieldType::Int),
            ("name", FieldType::Text),
            ("reaction_time", FieldType::Int),
            ("resolution_time", FieldType::Int),
            ("created_at", FieldType::Timestamp),
        ],
        named_filters: &[],
        encoders: None,
    }
}

pub(crate) fn build_list(
    sla_id: i64,
    opts: &SearchOptions,
    paging: Paging,
) -> StoreResult<ListPlan<SlaCondition>> {
    let mut list = list_spec().build(opts, paging)?;
    list.qb.push_where(Expr::eq("c.sla_id", sla_id));
    Ok(list)
}

/// Projection of one condition by id.
pub(crate) fn build_get(
    auth: &dyn Auther,
    id: i64,
    fields: &[String],
) -> StoreResult<(SelectQb, ScanPlan<SlaCondition>)> {
    let ctx = ProjectionCtx::new(ALIAS, auth.user_id());
    let base = SelectQb::new(&format!("{TABLE} {ALIAS}"));
    let (mut qb, plan) = SLA_CONDITION.build_columns(base, &ctx, fields)?;
    qb.push_where(Expr::eq("c.dc", auth.domain_id()));
    qb.push_where(Expr::eq("c.id", id));
    Ok((qb, plan))
}

/// Lock condition `id` of domain `dc`; no row means it does not exist there.
pub(crate) fn build_lock(dc: i64, id: i64) -> SelectQb {
    SelectQb::new(&format!("{TABLE} {ALIAS}"))
        .column("c.id")
        .eq("c.dc", dc)
        .eq("c.id", id)
        .lock("UPDATE")
}

/// SLA `sla_id` of domain `dc`, key-share locked so it cannot vanish before
/// the condition referencing it is inserted.
pub(crate) fn build_sla_check(dc: i64, sla_id: i64) -> SelectQb {
    SelectQb::new(&format!("{SLAS} s"))
        .column("s.id")
        .eq("s.dc", dc)
        .eq("s.id", sla_id)
        .lock("KEY SHARE")
}

/// Which of `priorities` exist in domain `dc`.
pub(crate) fn build_known_priorities(dc: i64, priorities: &[i64]) -> SelectQb {
    SelectQb::new(&format!("{PRIORITIES} pr"))
        .column("pr.id")
        .eq("pr.dc", dc)
        .any("pr.id", priorities.to_vec())
}

/// Statements reconciling the link rows of `cond_id` with `priorities`:
/// stale links are deleted, missing ones inserted. The insert only picks
/// priorities and a condition of domain `dc`.
pub(crate) fn build_set_priorities(
    dc: i64,
    cond_id: i64,
    priorities: &[i64],
) -> (DeleteQb, Option<InsertQb>) {
    let stale = qb::delete(LINKS)
        .eq("dc", dc)
        .eq("sla_condition_id", cond_id)
        .and_expr(Expr::not_all("priority_id", priorities.to_vec()));
    if priorities.is_empty() {
        return (stale, None);
    }
    let source = SelectQb::new(&format!("{PRIORITIES} pr"))
        .column("pr.dc")
        .column("sc.id")
        .column("pr.id")
        .inner_join(&format!("{TABLE} sc"), "sc.dc = pr.dc")
        .eq("sc.id", cond_id)
        .eq("pr.dc", dc)
        .any("pr.id", priorities.to_vec());
    let insert = qb::insert(LINKS)
        .select_from(&["dc", "sla_condition_id", "priority_id"], source)
        .on_conflict_do_nothing("sla_condition_id, priority_id");
    (stale, Some(insert))
}

pub(crate) fn build_insert(sla_id: i64, opts: &CreateOptions, input: &SlaConditionInput) -> InsertQb {
    let user_id = opts.auth.user_id();
    qb::insert(TABLE)
        .set("dc", opts.auth.domain_id())
        .set("sla_id", sla_id)
        .set("name", input.name.clone())
        .set("reaction_time", input.reaction_time)
        .set("resolution_time", input.resolution_time)
        .set("created_by", user_id)
        .set("updated_by", user_id)
        .set_raw("created_at", "now()")
        .set_raw("updated_at", "now()")
        .returning("id")
}

pub(crate) fn build_update(
    opts: &UpdateOptions,
    id: i64,
    input: &SlaConditionInput,
) -> StoreResult<(WithSelectQb, ScanPlan<SlaCondition>)> {
    check_mask(opts, MUTABLE)?;
    let user_id = opts.auth.user_id();
    let mut update = qb::update(TABLE);
    if opts.writes("name") {
        update = update.set("name", input.name.clone());
    }
    if opts.writes("reaction_time") {
        update = update.set("reaction_time", input.reaction_time);
    }
    if opts.writes("resolution_time") {
        update = update.set("resolution_time", input.resolution_time);
    }
    let update = update
        .set("updated_by", user_id)
        .set_raw("updated_at", "now()")
        .eq("dc", opts.auth.domain_id())
        .eq("id", id);
    compose(WithQb::new(), &SLA_CONDITION, ALIAS, update, user_id, &opts.fields)
}

/// Store of `cases.sla_condition`.
#[derive(Debug, Clone, Default)]
pub struct SlaConditionStore {
    ctx: StoreContext,
}

impl SlaConditionStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self { ctx }
    }

    /// Fail with `NotFound` when `query` yields no row.
    async fn require(
        &self,
        tx: &Transaction<'_>,
        query: &SelectQb,
        op: &str,
        what: &str,
    ) -> StoreResult<()> {
        let found = query
            .build()?
            .tagged(super::tag(ENTITY, op))
            .fetch_opt(tx)
            .await
            .map_err(|e| self.ctx.translate(e, &step_id(ENTITY, op, "exec")))?;
        match found {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found(
                step_id(ENTITY, op, "not_found"),
                format!("{what} not found"),
            )),
        }
    }

    async fn set_priorities(
        &self,
        tx: &Transaction<'_>,
        dc: i64,
        cond_id: i64,
        priorities: &[i64],
    ) -> StoreResult<()> {
        if !priorities.is_empty() {
            let rows = build_known_priorities(dc, priorities)
                .build()?
                .tagged(super::tag(ENTITY, "priorities"))
                .fetch_all(tx)
                .await
                .map_err(|e| self.ctx.translate(e, &step_id(ENTITY, "priorities", "exec")))?;
            let known = rows
                .iter()
                .map(|row| scan::get::<i64>(row, 0))
                .collect::<StoreResult<Vec<_>>>()?;
            let unknown: Vec<i64> = priorities
                .iter()
                .copied()
                .filter(|id| !known.contains(id))
                .collect();
            if !unknown.is_empty() {
                return Err(StoreError::invalid_argument(
                    step_id(ENTITY, "priorities", "unknown"),
                    format!("unknown priorities: {unknown:?}"),
                ));
            }
        }

        let (stale, insert) = build_set_priorities(dc, cond_id, priorities);
        self.ctx.execute(tx, &stale, ENTITY, "priorities").await?;
        if let Some(insert) = insert {
            self.ctx.execute(tx, &insert, ENTITY, "priorities").await?;
        }
        Ok(())
    }

    /// Insert a condition with its priorities.
    ///
    /// `sla_id` must be an SLA of the caller's domain, and every priority a
    /// priority of that domain.
    pub async fn create(
        &self,
        tx: &Transaction<'_>,
        sla_id: i64,
        opts: &CreateOptions,
        input: &SlaConditionInput,
    ) -> StoreResult<SlaCondition> {
        let dc = opts.auth.domain_id();
        self.require(tx, &build_sla_check(dc, sla_id), "create", "sla")
            .await?;

        let row = build_insert(sla_id, opts, input)
            .build()?
            .tagged(super::tag(ENTITY, "create"))
            .fetch_one(tx)
            .await
            .map_err(|e| self.ctx.translate(e, &step_id(ENTITY, "create", "insert")))?;
        let id: i64 = scan::get(&row, 0)?;

        self.set_priorities(tx, dc, id, &input.priorities).await?;

        let (query, plan) = build_get(opts.auth.as_ref(), id, &opts.fields)?;
        self.ctx.fetch_one(tx, &query, &plan, ENTITY, "create").await
    }

    /// Conditions of SLA `sla_id`.
    pub async fn list(
        &self,
        conn: &impl GenericClient,
        sla_id: i64,
        opts: &SearchOptions,
    ) -> StoreResult<ListResult<SlaCondition>> {
        let list = build_list(sla_id, opts, self.ctx.paging(opts))?;
        self.ctx.fetch_page(conn, list, ENTITY).await
    }

    /// Update the masked fields of condition `id`.
    ///
    /// The condition is locked first, so an id outside the caller's domain
    /// is `NotFound` before anything is written. When the mask names
    /// `priorities`, the link rows are reconciled next; the condition is then
    /// updated and projected by a final statement.
    pub async fn update(
        &self,
        tx: &Transaction<'_>,
        opts: &UpdateOptions,
        id: i64,
        input: &SlaConditionInput,
    ) -> StoreResult<SlaCondition> {
        let (query, plan) = build_update(opts, id, input)?;
        let dc = opts.auth.domain_id();
        self.require(tx, &build_lock(dc, id), "update", "sla condition")
            .await?;
        if opts.writes("priorities") {
            self.set_priorities(tx, dc, id, &input.priorities).await?;
        }
        self.ctx.fetch_one(tx, &query, &plan, ENTITY, "update").await
    }

    /// Delete by id list; link rows go with them.
    pub async fn delete(&self, conn: &impl GenericClient, opts: &DeleteOptions) -> StoreResult<u64> {
        if opts.ids.is_empty() {
            return Err(StoreError::invalid_argument(
                step_id(ENTITY, "delete", "ids"),
                "no ids to delete",
            ));
        }
        let query = qb::delete(TABLE)
            .eq("dc", opts.auth.domain_id())
            .any("id", opts.ids.clone());
        let deleted = self.ctx.execute(conn, &query, ENTITY, "delete").await?;
        if deleted == 0 {
            return Err(StoreError::not_found(
                step_id(ENTITY, "delete", "not_found"),
                "no sla condition deleted",
            ));
        }
        Ok(deleted)
    }
}
