//! Conditions of a case status.
//!
//! Within one status exactly one condition is `initial` and at least one is
//! `final`. Both rules are enforced inside the mutating statement:
//!
//! - `reset_initial` clears the flag on the other conditions when a
//!   condition becomes initial;
//! - `ensure_final` counts the other final conditions, and a write that
//!   would remove the last one matches zero rows;
//! - the first condition of a status is created initial and final;
//! - the initial condition can neither be deleted nor un-flagged.

use super::{ListPlan, ListSpec, StoreContext, check_mask, compose, step_id, user_join};
use crate::client::GenericClient;
use crate::cte::{WithQb, WithSelectQb};
use crate::error::{StoreError, StoreResult};
use crate::filter::FieldType;
use crate::options::{CreateOptions, DeleteOptions, SearchOptions, UpdateOptions};
use crate::paging::{ListResult, Paging};
use crate::projection::{Lookup, Projection, ScanPlan, scan};
use crate::qb::{self, Expr, Param, SelectQb, UpdateQb};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const ENTITY: &str = "status_condition";
const TABLE: &str = "cases.status_condition";
const ALIAS: &str = "s";

const MUTABLE: &[&str] = &["name", "description", "initial", "final"];

const STATUS_OF: &str = "status_id = (SELECT status_id FROM cases.status_condition WHERE dc = ? AND id = ?)";
const KEEPS_FINAL: &str = "(NOT final OR (SELECT n FROM ensure_final) > 0)";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatusCondition {
    pub id: i64,
    pub status_id: i64,
    pub name: String,
    pub description: String,
    pub initial: bool,
    #[serde(rename = "final")]
    pub is_final: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<Lookup>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<Lookup>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusConditionInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub initial: bool,
    #[serde(default, rename = "final")]
    pub is_final: bool,
}

static STATUS_CONDITION: LazyLock<Projection<StatusCondition>> = LazyLock::new(|| {
    Projection::<StatusCondition>::builder()
        .required(&["id"])
        .defaults(&["id", "name", "description", "initial", "final"])
        .column("id", "id", |s, row, i| {
            s.id = scan::get(row, i)?;
            Ok(())
        })
        .column("status_id", "status_id", |s, row, i| {
            s.status_id = scan::get(row, i)?;
            Ok(())
        })
        .column("name", "name", |s, row, i| {
            s.name = scan::get(row, i)?;
            Ok(())
        })
        .column("description", "description", |s, row, i| {
            s.description = scan::get::<Option<String>>(row, i)?.unwrap_or_default();
            Ok(())
        })
        .column("initial", "initial", |s, row, i| {
            s.initial = scan::get(row, i)?;
            Ok(())
        })
        .column("final", "final", |s, row, i| {
            s.is_final = scan::get(row, i)?;
            Ok(())
        })
        .column("created_at", "created_at", |s, row, i| {
            s.created_at = scan::get(row, i)?;
            Ok(())
        })
        .lookup("created_by", user_join("cb", "created_by"), |s, row, i| {
            s.created_by = scan::lookup(row, i)?;
            Ok(())
        })
        .column("updated_at", "updated_at", |s, row, i| {
            s.updated_at = scan::get(row, i)?;
            Ok(())
        })
        .lookup("updated_by", user_join("ub", "updated_by"), |s, row, i| {
            s.updated_by = scan::lookup(row, i)?;
            Ok(())
        })
        .build()
});

fn list_spec() -> ListSpec<StatusCondition> {
    ListSpec {
        table: TABLE,
        alias: ALIAS,
        projection: &STATUS_CONDITION,
        sort_fields: &["id", "name", "initial", "final", "created_at", "updated_at"],
        default_sort: "name",
        search_column: Some("name"),
        filter_fields: &[
            ("id", FieldType::Int),
            ("name", FieldType::Text),
            ("initial", FieldType::Bool),
            ("final", FieldType::Bool),
        ],
        named_filters: &[],
        encoders: None,
    }
}

pub(crate) fn build_list(
    status_id: i64,
    opts: &SearchOptions,
    paging: Paging,
) -> StoreResult<ListPlan<StatusCondition>> {
    let mut list = list_spec().build(opts, paging)?;
    list.qb.push_where(Expr::eq("s.status_id", status_id));
    Ok(list)
}

/// `UPDATE ... SET initial = false` on the current initial condition of the
/// status, except `keep`.
fn reset_initial(dc: i64, status: Expr, keep: Option<i64>) -> UpdateQb {
    let mut reset = qb::update(TABLE)
        .set_raw("initial", "false")
        .eq("dc", dc)
        .and_expr(status)
        .raw("initial");
    if let Some(id) = keep {
        reset = reset.and_expr(Expr::ne("id", id));
    }
    reset
}

/// Count of final conditions of the status outside `ids`.
fn ensure_final(dc: i64, status: Expr, ids: Vec<i64>) -> SelectQb {
    qb::select(TABLE)
        .column("count(*) AS n")
        .eq("dc", dc)
        .and_expr(status)
        .raw("final")
        .and_expr(Expr::not_all("id", ids))
}

fn first_of_status(flag: bool, dc: i64, status_id: i64) -> Expr {
    Expr::template(
        "? OR NOT EXISTS(SELECT 1 FROM cases.status_condition WHERE dc = ? AND status_id = ?)",
        vec![Param::new(flag), Param::new(dc), Param::new(status_id)],
    )
}

pub(crate) fn build_create(
    status_id: i64,
    opts: &CreateOptions,
    input: &StatusConditionInput,
) -> StoreResult<(WithSelectQb, ScanPlan<StatusCondition>)> {
    let dc = opts.auth.domain_id();
    let user_id = opts.auth.user_id();

    let mut with = WithQb::new();
    if input.initial {
        with = with.with(
            "reset_initial",
            reset_initial(dc, Expr::eq("status_id", status_id), None),
        )?;
    }

    let insert = qb::insert(TABLE)
        .set("dc", dc)
        .set("status_id", status_id)
        .set("name", input.name.clone())
        .set("description", input.description.clone())
        .set_expr("initial", first_of_status(input.initial, dc, status_id))
        .set_expr("final", first_of_status(input.is_final, dc, status_id))
        .set("created_by", user_id)
        .set("updated_by", user_id)
        .set_raw("created_at", "now()")
        .set_raw("updated_at", "now()");
    compose(with, &STATUS_CONDITION, ALIAS, insert, user_id, &opts.fields)
}

pub(crate) fn build_update(
    opts: &UpdateOptions,
    id: i64,
    input: &StatusConditionInput,
) -> StoreResult<(WithSelectQb, ScanPlan<StatusCondition>)> {
    check_mask(opts, MUTABLE)?;
    let dc = opts.auth.domain_id();
    let user_id = opts.auth.user_id();
    let status_of = || Expr::template(STATUS_OF, vec![Param::new(dc), Param::new(id)]);

    let mut with = WithQb::new();
    let mut update = qb::update(TABLE);
    if opts.writes("name") {
        update = update.set("name", input.name.clone());
    }
    if opts.writes("description") {
        update = update.set("description", input.description.clone());
    }
    if opts.writes("initial") {
        update = update.set("initial", input.initial);
        if input.initial {
            with = with.with("reset_initial", reset_initial(dc, status_of(), Some(id)))?;
        } else {
            update = update.raw("NOT initial");
        }
    }
    if opts.writes("final") {
        update = update.set("final", input.is_final);
        if !input.is_final {
            with = with.with("ensure_final", ensure_final(dc, status_of(), vec![id]))?;
            update = update.raw(KEEPS_FINAL);
        }
    }
    let update = update
        .set("updated_by", user_id)
        .set_raw("updated_at", "now()")
        .eq("dc", dc)
        .eq("id", id);
    compose(with, &STATUS_CONDITION, ALIAS, update, user_id, &opts.fields)
}

pub(crate) fn build_delete(
    status_id: i64,
    opts: &DeleteOptions,
) -> StoreResult<(WithSelectQb, ScanPlan<StatusCondition>)> {
    if opts.ids.is_empty() {
        return Err(StoreError::invalid_argument(
            step_id(ENTITY, "delete", "ids"),
            "no ids to delete",
        ));
    }
    let dc = opts.auth.domain_id();
    let with = WithQb::new().with(
        "ensure_final",
        ensure_final(dc, Expr::eq("status_id", status_id), opts.ids.clone()),
    )?;
    let delete = qb::delete(TABLE)
        .eq("dc", dc)
        .eq("status_id", status_id)
        .any("id", opts.ids.clone())
        .raw("NOT initial")
        .raw(KEEPS_FINAL);
    compose(
        with,
        &STATUS_CONDITION,
        ALIAS,
        delete,
        opts.auth.user_id(),
        &opts.fields,
    )
}

/// Store of `cases.status_condition`.
#[derive(Debug, Clone, Default)]
pub struct StatusConditionStore {
    ctx: StoreContext,
}

impl StatusConditionStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self { ctx }
    }

    pub async fn create(
        &self,
        conn: &impl GenericClient,
        status_id: i64,
        opts: &CreateOptions,
        input: &StatusConditionInput,
    ) -> StoreResult<StatusCondition> {
        let (query, plan) = build_create(status_id, opts, input)?;
        self.ctx.fetch_one(conn, &query, &plan, ENTITY, "create").await
    }

    /// Conditions of status `status_id`.
    pub async fn list(
        &self,
        conn: &impl GenericClient,
        status_id: i64,
        opts: &SearchOptions,
    ) -> StoreResult<ListResult<StatusCondition>> {
        let list = build_list(status_id, opts, self.ctx.paging(opts))?;
        self.ctx.fetch_page(conn, list, ENTITY).await
    }

    /// Zero matched rows means the condition is missing or the write would
    /// break the initial/final rules; both are `NotFound`.
    pub async fn update(
        &self,
        conn: &impl GenericClient,
        opts: &UpdateOptions,
        id: i64,
        input: &StatusConditionInput,
    ) -> StoreResult<StatusCondition> {
        let (query, plan) = build_update(opts, id, input)?;
        self.ctx.fetch_one(conn, &query, &plan, ENTITY, "update").await
    }

    /// Delete conditions of a status and return their projections.
    pub async fn delete(
        &self,
        conn: &impl GenericClient,
        status_id: i64,
        opts: &DeleteOptions,
    ) -> StoreResult<Vec<StatusCondition>> {
        let (query, plan) = build_delete(status_id, opts)?;
        let deleted = self.ctx.fetch_all(conn, &query, &plan, ENTITY, "delete").await?;
        if deleted.is_empty() {
            return Err(StoreError::not_found(
                step_id(ENTITY, "delete", "not_found"),
                "no status condition deleted",
            ));
        }
        Ok(deleted)
    }
}
