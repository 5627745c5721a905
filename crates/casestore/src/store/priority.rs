//! Case priorities.

use super::{
    ListPlan, ListSpec, StoreContext, check_mask, compose, step_id, user_join,
};
use crate::client::GenericClient;
use crate::cte::{WithQb, WithSelectQb};
use crate::error::{StoreError, StoreResult};
use crate::filter::FieldType;
use crate::options::{CreateOptions, DeleteOptions, SearchOptions, UpdateOptions, required_int_filter};
use crate::paging::{ListResult, Paging};
use crate::projection::{Lookup, Projection, ScanPlan, scan};
use crate::qb::{self, DeleteQb, Expr, Param};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const ENTITY: &str = "priority";
const TABLE: &str = "cases.priority";
const ALIAS: &str = "p";

const MUTABLE: &[&str] = &["name", "description", "color"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Priority {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub color: String,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<Lookup>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<Lookup>,
}

/// Writable fields of a priority.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PriorityInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub color: String,
}

static PRIORITY: LazyLock<Projection<Priority>> = LazyLock::new(|| {
    Projection::<Priority>::builder()
        .required(&["id"])
        .defaults(&["id", "name", "description", "color"])
        .column("id", "id", |p, row, i| {
            p.id = scan::get(row, i)?;
            Ok(())
        })
        .column("name", "name", |p, row, i| {
            p.name = scan::get(row, i)?;
            Ok(())
        })
        .column("description", "description", |p, row, i| {
            p.description = scan::get::<Option<String>>(row, i)?.unwrap_or_default();
            Ok(())
        })
        .column("color", "color", |p, row, i| {
            p.color = scan::get(row, i)?;
            Ok(())
        })
        .column("created_at", "created_at", |p, row, i| {
            p.created_at = scan::get(row, i)?;
            Ok(())
        })
        .lookup("created_by", user_join("cb", "created_by"), |p, row, i| {
            p.created_by = scan::lookup(row, i)?;
            Ok(())
        })
        .column("updated_at", "updated_at", |p, row, i| {
            p.updated_at = scan::get(row, i)?;
            Ok(())
        })
        .lookup("updated_by", user_join("ub", "updated_by"), |p, row, i| {
            p.updated_by = scan::lookup(row, i)?;
            Ok(())
        })
        .build()
});

fn list_spec() -> ListSpec<Priority> {
    ListSpec {
        table: TABLE,
        alias: ALIAS,
        projection: &PRIORITY,
        sort_fields: &["id", "name", "description", "color", "created_at", "updated_at"],
        default_sort: "name",
        search_column: Some("name"),
        filter_fields: &[
            ("id", FieldType::Int),
            ("name", FieldType::Text),
            ("description", FieldType::Text),
            ("color", FieldType::Text),
            ("created_at", FieldType::Timestamp),
            ("created_by", FieldType::Int),
            ("updated_at", FieldType::Timestamp),
            ("updated_by", FieldType::Int),
        ],
        named_filters: &["not_in_sla", "in_sla_cond"],
        encoders: None,
    }
}

pub(crate) fn build_list(opts: &SearchOptions, paging: Paging) -> StoreResult<ListPlan<Priority>> {
    let mut list = list_spec().build(opts, paging)?;

    // Priorities linked to an SLA condition.
    if opts.filter_value("in_sla_cond").is_some() {
        let cond_id = required_int_filter(opts, "in_sla_cond")?;
        list.qb.push_where(Expr::template(
            "EXISTS(SELECT 1 FROM cases.priority_sla_condition psc \
             WHERE psc.priority_id = p.id AND psc.sla_condition_id = ?)",
            vec![Param::new(cond_id)],
        ));
    }
    // Priorities not yet used by any condition of an SLA.
    if opts.filter_value("not_in_sla").is_some() {
        let sla_id = required_int_filter(opts, "not_in_sla")?;
        list.qb.push_where(Expr::template(
            "NOT EXISTS(SELECT 1 FROM cases.priority_sla_condition psc \
             JOIN cases.sla_condition sc ON sc.id = psc.sla_condition_id \
             WHERE psc.priority_id = p.id AND sc.sla_id = ?)",
            vec![Param::new(sla_id)],
        ));
    }
    Ok(list)
}

pub(crate) fn build_create(
    opts: &CreateOptions,
    input: &PriorityInput,
) -> StoreResult<(WithSelectQb, ScanPlan<Priority>)> {
    let user_id = opts.auth.user_id();
    let insert = qb::insert(TABLE)
        .set("dc", opts.auth.domain_id())
        .set("name", input.name.clone())
        .set("description", input.description.clone())
        .set("color", input.color.clone())
        .set("created_by", user_id)
        .set("updated_by", user_id)
        .set_raw("created_at", "now()")
        .set_raw("updated_at", "now()");
    compose(WithQb::new(), &PRIORITY, ALIAS, insert, user_id, &opts.fields)
}

pub(crate) fn build_update(
    opts: &UpdateOptions,
    id: i64,
    input: &PriorityInput,
) -> StoreResult<(WithSelectQb, ScanPlan<Priority>)> {
    check_mask(opts, MUTABLE)?;
    let user_id = opts.auth.user_id();
    let mut update = qb::update(TABLE);
    if opts.writes("name") {
        update = update.set("name", input.name.clone());
    }
    if opts.writes("description") {
        update = update.set("description", input.description.clone());
    }
    if opts.writes("color") {
        update = update.set("color", input.color.clone());
    }
    let update = update
        .set("updated_by", user_id)
        .set_raw("updated_at", "now()")
        .eq("dc", opts.auth.domain_id())
        .eq("id", id);
    compose(WithQb::new(), &PRIORITY, ALIAS, update, user_id, &opts.fields)
}

pub(crate) fn build_delete(opts: &DeleteOptions) -> StoreResult<DeleteQb> {
    if opts.ids.is_empty() {
        return Err(StoreError::invalid_argument(
            step_id(ENTITY, "delete", "ids"),
            "no ids to delete",
        ));
    }
    Ok(qb::delete(TABLE)
        .eq("dc", opts.auth.domain_id())
        .any("id", opts.ids.clone()))
}

/// Store of `cases.priority`.
#[derive(Debug, Clone, Default)]
pub struct PriorityStore {
    ctx: StoreContext,
}

impl PriorityStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self { ctx }
    }

    /// Insert a priority and return the requested fields of the new row.
    pub async fn create(
        &self,
        conn: &impl GenericClient,
        opts: &CreateOptions,
        input: &PriorityInput,
    ) -> StoreResult<Priority> {
        let (query, plan) = build_create(opts, input)?;
        self.ctx.fetch_one(conn, &query, &plan, ENTITY, "create").await
    }

    pub async fn list(
        &self,
        conn: &impl GenericClient,
        opts: &SearchOptions,
    ) -> StoreResult<ListResult<Priority>> {
        let list = build_list(opts, self.ctx.paging(opts))?;
        self.ctx.fetch_page(conn, list, ENTITY).await
    }

    /// One priority by id.
    pub async fn get(
        &self,
        conn: &impl GenericClient,
        opts: &SearchOptions,
        id: i64,
    ) -> StoreResult<Priority> {
        let mut opts = opts.clone().ids(vec![id]).page(1, 1);
        opts.filters.clear();
        opts.filter = None;
        let list = build_list(&opts, self.ctx.paging(&opts))?;
        self.ctx
            .fetch_all(conn, &list.qb, &list.plan, ENTITY, "get")
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(step_id(ENTITY, "get", "not_found"), "priority not found"))
    }

    /// Update the masked fields of priority `id`.
    pub async fn update(
        &self,
        conn: &impl GenericClient,
        opts: &UpdateOptions,
        id: i64,
        input: &PriorityInput,
    ) -> StoreResult<Priority> {
        let (query, plan) = build_update(opts, id, input)?;
        self.ctx.fetch_one(conn, &query, &plan, ENTITY, "update").await
    }

    /// Delete by id list. Returns how many rows went away; none is `NotFound`.
    pub async fn delete(&self, conn: &impl GenericClient, opts: &DeleteOptions) -> StoreResult<u64> {
        let query = build_delete(opts)?;
        let deleted = self.ctx.execute(conn, &query, ENTITY, "delete").await?;
        if deleted == 0 {
            return Err(StoreError::not_found(
                step_id(ENTITY, "delete", "not_found"),
                "no priority deleted",
            ));
        }
        Ok(deleted)
    }
}
