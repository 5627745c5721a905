//! Comments on a case.
//!
//! Comments carry a version counter. Updates are conditional on the version
//! named by the client's [`Etag`](crate::options::Etag) and on authorship,
//! and bump the version; a stale etag matches no row and surfaces as
//! `NotFound`. Access to the parent case is checked through `cases.case_acl`
//! when the caller requires it.

use super::{ListPlan, ListSpec, StoreContext, check_mask, compose, step_id, user_join};
use crate::client::GenericClient;
use crate::cte::{WithQb, WithSelectQb};
use crate::error::{StoreError, StoreResult};
use crate::filter::FieldType;
use crate::options::{CreateOptions, DeleteOptions, SearchOptions, UpdateOptions};
use crate::paging::{ListResult, Paging};
use crate::projection::{Lookup, Projection, ScanPlan, scan};
use crate::qb::{self, DeleteQb, Expr, Param};
use crate::rbac::{Access, Auther, rbac_condition};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

const ENTITY: &str = "case_comment";
const TABLE: &str = "cases.case_comment";
const ALIAS: &str = "c";
/// Alias of the table inside UPDATE/DELETE statements.
const ROW_ALIAS: &str = "cc";

const RBAC_SCOPE: &str = "cases";
const ACL_TABLE: &str = "cases.case_acl";

const MUTABLE: &[&str] = &["text"];

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Comment {
    pub id: i64,
    pub ver: i32,
    /// `id.ver`, echoed back on update
    pub etag: String,
    pub case_id: i64,
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
    pub created_by: Option<Lookup>,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<Lookup>,
    /// Updated after creation
    pub edited: bool,
    /// Written by the caller
    pub can_edit: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CommentInput {
    pub text: String,
}

static COMMENT: LazyLock<Projection<Comment>> = LazyLock::new(|| {
    Projection::<Comment>::builder()
        .required(&["id", "ver", "etag"])
        .defaults(&["id", "etag", "text", "created_at", "created_by", "edited", "can_edit"])
        .column("id", "id", |c, row, i| {
            c.id = scan::get(row, i)?;
            Ok(())
        })
        .column("ver", "ver", |c, row, i| {
            c.ver = scan::get(row, i)?;
            Ok(())
        })
        .computed(
            "etag",
            |ctx| Expr::raw(format!("{}::text || '.' || {}::text", ctx.col("id"), ctx.col("ver"))),
            |c, row, i| {
                c.etag = scan::get(row, i)?;
                Ok(())
            },
        )
        .column("case_id", "case_id", |c, row, i| {
            c.case_id = scan::get(row, i)?;
            Ok(())
        })
        .column("text", "text", |c, row, i| {
            c.text = scan::get(row, i)?;
            Ok(())
        })
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
        .computed(
            "edited",
            |ctx| Expr::raw(format!("{} > {}", ctx.col("updated_at"), ctx.col("created_at"))),
            |c, row, i| {
                c.edited = scan::get(row, i)?;
                Ok(())
            },
        )
        .computed(
            "can_edit",
            |ctx| {
                Expr::template(
                    format!("{} = ?", ctx.col("created_by")),
                    vec![Param::new(ctx.user_id)],
                )
            },
            |c, row, i| {
                c.can_edit = scan::get(row, i)?;
                Ok(())
            },
        )
        .build()
});

fn list_spec() -> ListSpec<Comment> {
    ListSpec {
        table: TABLE,
        alias: ALIAS,
        projection: &COMMENT,
        sort_fields: &["id", "created_at", "updated_at"],
        default_sort: "-created_at",
        search_column: Some("text"),
        filter_fields: &[
            ("id", FieldType::Int),
            ("text", FieldType::Text),
            ("created_at", FieldType::Timestamp),
            ("created_by", FieldType::Int),
            ("updated_at", FieldType::Timestamp),
        ],
        named_filters: &[],
        encoders: None,
    }
}

fn case_access(auth: &dyn Auther, access: Access, case_column: &str) -> Option<Expr> {
    rbac_condition(auth, RBAC_SCOPE, access, ACL_TABLE, case_column)
}

pub(crate) fn build_list(
    case_id: i64,
    opts: &SearchOptions,
    paging: Paging,
) -> StoreResult<ListPlan<Comment>> {
    let mut list = list_spec().build(opts, paging)?;
    list.qb.push_where(Expr::eq("c.case_id", case_id));
    if let Some(acl) = case_access(opts.auth.as_ref(), Access::READ, "c.case_id") {
        list.qb.push_where(acl);
    }
    Ok(list)
}

pub(crate) fn build_create(
    case_id: i64,
    opts: &CreateOptions,
    input: &CommentInput,
) -> StoreResult<(WithSelectQb, ScanPlan<Comment>)> {
    if input.text.trim().is_empty() {
        return Err(StoreError::invalid_argument(
            step_id(ENTITY, "create", "text"),
            "comment text is empty",
        ));
    }
    let user_id = opts.auth.user_id();
    let insert = qb::insert(TABLE)
        .set("dc", opts.auth.domain_id())
        .set("case_id", case_id)
        .set("text", input.text.clone())
        .set("created_by", user_id)
        .set("updated_by", user_id)
        .set_raw("created_at", "now()")
        .set_raw("updated_at", "now()");
    compose(WithQb::new(), &COMMENT, ALIAS, insert, user_id, &opts.fields)
}

/// Update guarded by `id`, `ver`, authorship and write access to the case.
pub(crate) fn build_update(
    opts: &UpdateOptions,
    input: &CommentInput,
) -> StoreResult<(WithSelectQb, ScanPlan<Comment>)> {
    check_mask(opts, MUTABLE)?;
    let Some(etag) = opts.etag else {
        return Err(StoreError::invalid_argument(
            step_id(ENTITY, "update", "etag"),
            "etag is required",
        ));
    };
    let user_id = opts.auth.user_id();
    let mut update = qb::update(&format!("{TABLE} {ROW_ALIAS}"))
        .set("text", input.text.clone())
        .set_raw("ver", "cc.ver + 1")
        .set("updated_by", user_id)
        .set_raw("updated_at", "now()")
        .eq("cc.dc", opts.auth.domain_id())
        .eq("cc.id", etag.id)
        .eq("cc.ver", etag.ver)
        .eq("cc.created_by", user_id);
    if let Some(acl) = case_access(opts.auth.as_ref(), Access::WRITE, "cc.case_id") {
        update = update.and_expr(acl);
    }
    compose(WithQb::new(), &COMMENT, ALIAS, update, user_id, &opts.fields)
}

/// Delete of the caller's own comments among `ids`.
pub(crate) fn build_delete(opts: &DeleteOptions) -> StoreResult<DeleteQb> {
    if opts.ids.is_empty() {
        return Err(StoreError::invalid_argument(
            step_id(ENTITY, "delete", "ids"),
            "no ids to delete",
        ));
    }
    let mut delete = qb::delete(&format!("{TABLE} {ROW_ALIAS}"))
        .eq("cc.dc", opts.auth.domain_id())
        .any("cc.id", opts.ids.clone())
        .eq("cc.created_by", opts.auth.user_id());
    if let Some(acl) = case_access(opts.auth.as_ref(), Access::WRITE, "cc.case_id") {
        delete = delete.and_expr(acl);
    }
    Ok(delete)
}

/// Store of `cases.case_comment`.
#[derive(Debug, Clone, Default)]
pub struct CommentStore {
    ctx: StoreContext,
}

impl CommentStore {
    pub fn new(ctx: StoreContext) -> Self {
        Self { ctx }
    }

    /// Publish a comment on case `case_id`.
    pub async fn create(
        &self,
        conn: &impl GenericClient,
        case_id: i64,
        opts: &CreateOptions,
        input: &CommentInput,
    ) -> StoreResult<Comment> {
        let (query, plan) = build_create(case_id, opts, input)?;
        self.ctx.fetch_one(conn, &query, &plan, ENTITY, "create").await
    }

    /// Comments of case `case_id`, newest first unless sorted otherwise.
    pub async fn list(
        &self,
        conn: &impl GenericClient,
        case_id: i64,
        opts: &SearchOptions,
    ) -> StoreResult<ListResult<Comment>> {
        let list = build_list(case_id, opts, self.ctx.paging(opts))?;
        self.ctx.fetch_page(conn, list, ENTITY).await
    }

    /// Replace the text of the comment named by `opts.etag`.
    ///
    /// A missing row, a stale version and someone else's comment are all
    /// reported as `NotFound`.
    pub async fn update(
        &self,
        conn: &impl GenericClient,
        opts: &UpdateOptions,
        input: &CommentInput,
    ) -> StoreResult<Comment> {
        let (query, plan) = build_update(opts, input)?;
        self.ctx.fetch_one(conn, &query, &plan, ENTITY, "update").await
    }

    pub async fn delete(&self, conn: &impl GenericClient, opts: &DeleteOptions) -> StoreResult<u64> {
        let query = build_delete(opts)?;
        let deleted = self.ctx.execute(conn, &query, ENTITY, "delete").await?;
        if deleted == 0 {
            return Err(StoreError::not_found(
                step_id(ENTITY, "delete", "not_found"),
                "no comment deleted",
            ));
        }
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Etag;
    use crate::qb::SqlQb;
    use crate::rbac::AuthContext;
    use crate::store::test_support::{auth, debug_params, search};
    use std::sync::Arc;

    fn checked_auth() -> Arc<dyn Auther> {
        Arc::new(
            AuthContext::new(1, 10)
                .with_roles(vec![10, 77])
                .with_rbac_scope("cases"),
        )
    }

    #[test]
    fn computed_fields_follow_the_root_alias() {
        let opts = search().fields(&["edited", "can_edit"]);
        let list = build_list(3, &opts, Paging { page: 1, size: 20 }).unwrap();
        let built = list.qb.build().unwrap();
        assert_eq!(
            built.sql,
            "SELECT c.id, c.ver, c.id::text || '.' || c.ver::text, c.updated_at > c.created_at, c.created_by = $1 \
             FROM cases.case_comment c WHERE c.dc = $2 AND c.case_id = $3 \
             ORDER BY c.created_at DESC, c.id ASC LIMIT 21"
        );
        assert_eq!(debug_params(&built.params), vec!["10", "1", "3"]);
    }

    #[test]
    fn list_checks_case_access_when_required() {
        let opts = SearchOptions::new(checked_auth()).fields(&["text"]);
        let list = build_list(3, &opts, Paging { page: 1, size: 20 }).unwrap();
        let built = list.qb.build().unwrap();
        assert!(built.sql.ends_with(
            "WHERE c.dc = $1 AND c.case_id = $2 AND EXISTS(SELECT 1 FROM cases.case_acl acl \
             WHERE acl.dc = $3 AND acl.object = c.case_id AND acl.subject = ANY($4) \
             AND acl.access & $5::smallint = $6::smallint) ORDER BY c.created_at DESC, c.id ASC LIMIT 21"
        ));
        assert_eq!(
            debug_params(&built.params),
            vec!["1", "3", "1", "[10, 77]", "4", "4"]
        );
    }

    #[test]
    fn update_is_conditional_on_version_and_author() {
        let opts = UpdateOptions::new(auth(), &["text"]).etag(Etag::new(7, 2));
        let input = CommentInput { text: "fixed".into() };
        let (query, plan) = build_update(&opts, &input).unwrap();
        let built = query.build().unwrap();
        assert_eq!(
            built.sql,
            "WITH c AS (UPDATE cases.case_comment cc SET text = $1, ver = cc.ver + 1, updated_by = $2, \
             updated_at = now() WHERE cc.dc = $3 AND cc.id = $4 AND cc.ver = $5 AND cc.created_by = $6 \
             RETURNING *) SELECT c.id, c.ver, c.id::text || '.' || c.ver::text, c.text FROM c"
        );
        assert_eq!(
            debug_params(&built.params),
            vec!["\"fixed\"", "10", "1", "7", "2", "10"]
        );
        assert_eq!(plan.fields(), &["id", "ver", "etag", "text"]);
    }

    #[test]
    fn update_needs_etag() {
        let opts = UpdateOptions::new(auth(), &[]);
        let err = build_update(&opts, &CommentInput { text: "x".into() })
            .err()
            .unwrap();
        assert!(err.is_invalid_argument());
        assert_eq!(err.id(), "postgres.case_comment.update.etag");
    }

    #[test]
    fn update_with_rbac_checks_write_access() {
        let opts = UpdateOptions::new(checked_auth(), &["id"]).etag(Etag::new(7, 2));
        let (query, _) = build_update(&opts, &CommentInput { text: "x".into() }).unwrap();
        let built = query.build().unwrap();
        assert!(built.sql.contains("acl.object = cc.case_id"));
        // WRITE bit twice at the end of the ACL predicate.
        assert_eq!(debug_params(&built.params)[8..], ["2", "2"]);
    }

    #[test]
    fn blank_comment_is_rejected() {
        let opts = CreateOptions::new(auth(), &[]);
        let err = build_create(1, &opts, &CommentInput { text: "  ".into() })
            .err()
            .unwrap();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn delete_only_own_comments() {
        let opts = DeleteOptions::new(auth(), vec![7]);
        assert_eq!(
            build_delete(&opts).unwrap().to_sql(),
            "DELETE FROM cases.case_comment cc WHERE cc.dc = $1 AND cc.id = ANY($2) AND cc.created_by = $3"
        );
    }
}
