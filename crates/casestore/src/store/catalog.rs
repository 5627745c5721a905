//! Service catalogs.
//!
//! Catalogs and their services share `cases.service_catalog`: a row with
//! a NULL `catalog_id` is a catalog, other rows are services of the catalog
//! they point to. A catalog projects its services as JSON children.

use super::{ListPlan, ListSpec, StoreContext, check_mask, compose, step_id, user_join};
use crate::client::GenericClient;
use crate::cte::{WithQb, WithSelectQb};
use crate::error::{StoreError, StoreResult};
use crate::filter::{FieldType, ValueEncoders, encode_timestamp};
use crate::options::{CreateOptions, DeleteOptions, SearchOptions, UpdateOptions};
use crate::paging::{ListResult, Paging};
use crate::projection::{Lookup, LookupJoin, Projection, ScanPlan, scan};
use crate::qb::{self, Expr};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const ENTITY: &str = "service_catalog";
const TABLE: &str = "cases.service_catalog";
const ALIAS: &str = "c";

const MUTABLE: &[&str] = &["name", "code", "description", "state", "sla", "status"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Catalog {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub description: String,
    /// Enabled
    pub state: bool,
    pub sla: Option<Lookup>,
    pub status: Option<Lookup>,
    pub services: Vec<Service>,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<Lookup>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<Lookup>,
}

/// Service entry as projected inside its catalog.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub code: String,
    pub state: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CatalogInput {
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub state: bool,
    pub sla_id: i64,
    pub status_id: i64,
}

static CATALOG: LazyLock<Projection<Catalog>> = LazyLock::new(|| {
    Projection::<Catalog>::builder()
        .required(&["id"])
        .defaults(&["id", "name", "code", "state", "sla", "status"])
        .column("id", "id", |c, row, i| {
            c.id = scan::get(row, i)?;
            Ok(())
        })
        .column("name", "name", |c, row, i| {
            c.name = scan::get(row, i)?;
            Ok(())
        })
        .column("code", "code", |c, row, i| {
            c.code = scan::get::<Option<String>>(row, i)?.unwrap_or_default();
            Ok(())
        })
        .column("description", "description", |c, row, i| {
            c.description = scan::get::<Option<String>>(row, i)?.unwrap_or_default();
            Ok(())
        })
        .column("state", "state", |c, row, i| {
            c.state = scan::get(row, i)?;
            Ok(())
        })
        .lookup(
            "sla",
            LookupJoin {
                table: "cases.sla",
                alias: "sla",
                fk: "sla_id",
                name: "name",
            },
            |c, row, i| {
                c.sla = scan::lookup(row, i)?;
                Ok(())
            },
        )
        .lookup(
            "status",
            LookupJoin {
                table: "cases.status",
                alias: "st",
                fk: "status_id",
                name: "name",
            },
            |c, row, i| {
                c.status = scan::lookup(row, i)?;
                Ok(())
            },
        )
        .children(
            "services",
            |ctx| {
                format!(
                    "SELECT json_agg(json_build_object('id', sv.id, 'name', sv.name, \
                     'code', COALESCE(sv.code, ''), 'state', sv.state) ORDER BY sv.name) \
                     FROM cases.service_catalog sv WHERE sv.catalog_id = {}",
                    ctx.col("id")
                )
            },
            |c, row, i| {
                c.services = scan::children(row, i)?;
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

static ENCODERS: LazyLock<ValueEncoders> = LazyLock::new(|| {
    ValueEncoders::new()
        .register("created_at", encode_timestamp)
        .register("updated_at", encode_timestamp)
});

fn list_spec() -> ListSpec<Catalog> {
    ListSpec {
        table: TABLE,
        alias: ALIAS,
        projection: &CATALOG,
        sort_fields: &["id", "name", "code", "state", "created_at", "updated_at"],
        default_sort: "name",
        search_column: Some("name"),
        filter_fields: &[
            ("id", FieldType::Int),
            ("name", FieldType::Text),
            ("code", FieldType::Text),
            ("description", FieldType::Text),
            ("state", FieldType::Bool),
            ("created_at", FieldType::Timestamp),
            ("updated_at", FieldType::Timestamp),
        ],
        named_filters: &[],
        encoders: Some(&*ENCODERS),
    }
}

pub(crate) fn build_list(opts: &SearchOptions, paging: Paging) -> StoreResult<ListPlan<Catalog>> {
    let mut list = list_spec().build(opts, paging)?;
    list.qb.push_where(Expr::is_null("c.catalog_id"));
    Ok(list)
}

pub(crate) fn build_create(
    opts: &CreateOptions,
    input: &CatalogInput,
) -> StoreResult<(WithSelectQb, ScanPlan<Catalog>)> {
    let user_id = opts.auth.user_id();
    let insert = qb::insert(TABLE)
        .set("dc", opts.auth.domain_id())
        .set("name", input.name.clone())
        .set("code", input.code.clone())
        .set("description", input.description.clone())
        .set("state", input.state)
        .set("sla_id", input.sla_id)
        .set("status_id", input.status_id)
        .set("created_by", user_id)
        .set("updated_by", user_id)
        .set_raw("created_at", "now()")
        .set_raw("updated_at", "now()");
    compose(WithQb::new(), &CATALOG, ALIAS, insert, user_id, &opts.fields)
}

pub(crate) fn build_update(
    opts: &UpdateOptions,
    id: i64,
    input: &CatalogInput,
) -> StoreResult<(WithSelectQb, ScanPlan<Catalog>)> {
    check_mask(opts, MUTABLE)?;
    let user_id = opts.auth.user_id();
    let mut update = qb::update(TABLE);
    if opts.writes("name") {
        update = update.set("name", input.name.clone());
    }
    if opts.writes("code") {
        update = update.set("code", input.code.clone());
    }
    if opts.writes("description") {
        update = update.set("description", input.description.clone());
    }
    if opts.writes("state") {
        update = update.set("state", input.state);
    }
    if opts.writes("sla") {
        update = update.set("sla_id", input.sla_id);
    }
    if opts.writes("status") {
        update = update.set("status_id", input.status_id);
    }
    let update = update
        .set("updated_by", user_id)
        .set_raw("updated_at", "now()")
        .eq("dc", opts.auth.domain_id())
        .eq("id", id)
        .and_expr(Expr::is_null("catalog_id"));
    compose(WithQb::new(), &CATALOG, ALIAS, update, user_id, &opts.fields)
}

/// Delete catalogs by id, projecting the deleted rows.
pub(crate) fn build_delete(opts: &DeleteOptions) -> StoreResult<(WithSelectQb, ScanPlan<Catalog>)> {
    if opts.ids.is_empty() {
        return Err(StoreError::invalid_argument(
            step_id(ENTITY, "delete", "ids"),
            "no ids to delete",
        ));
    }
    let delete = qb::delete(TABLE)
        .eq("dc", opts.auth.domain_id())
        .any("id", opts.ids.clone())
        .and_expr(Expr::is_null("catalog_id"));
    compose(
        WithQb::new(),
        &CATALOG,
        ALIAS,
        delete,
        opts.auth.user_id(),
        &opts.fields,
    )
}

/// Store of catalogs in `cases.service_catalog`.
#[derive(Debug, Clone, Default)]
pub struct CatalogStore {
    ctx: StoreContext,
}

impl CatalogStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self { ctx }
    }

    pub async fn create(
        &self,
        conn: &impl GenericClient,
        opts: &CreateOptions,
        input: &CatalogInput,
    ) -> StoreResult<Catalog> {
        let (query, plan) = build_create(opts, input)?;
        self.ctx.fetch_one(conn, &query, &plan, ENTITY, "create").await
    }

    /// Catalogs of the caller's domain. Filters may reach the SLA and status
    /// through `sla.<column>` and `status.<column>`.
    pub async fn list(
        &self,
        conn: &impl GenericClient,
        opts: &SearchOptions,
    ) -> StoreResult<ListResult<Catalog>> {
        let list = build_list(opts, self.ctx.paging(opts))?;
        self.ctx.fetch_page(conn, list, ENTITY).await
    }

    pub async fn update(
        &self,
        conn: &impl GenericClient,
        opts: &UpdateOptions,
        id: i64,
        input: &CatalogInput,
    ) -> StoreResult<Catalog> {
        let (query, plan) = build_update(opts, id, input)?;
        self.ctx.fetch_one(conn, &query, &plan, ENTITY, "update").await
    }

    /// Delete catalogs; services go with them. Returns the deleted catalogs.
    pub async fn delete(
        &self,
        conn: &impl GenericClient,
        opts: &DeleteOptions,
    ) -> StoreResult<Vec<Catalog>> {
        let (query, plan) = build_delete(opts)?;
        let deleted = self.ctx.fetch_all(conn, &query, &plan, ENTITY, "delete").await?;
        if deleted.is_empty() {
            return Err(StoreError::not_found(
                step_id(ENTITY, "delete", "not_found"),
                "no catalog deleted",
            ));
        }
        Ok(deleted)
    }
}
