mod common;

use casestore::projection::Lookup;
use casestore::store::{CommentInput, CommentStore};
use casestore::{
    AuthContext, Auther, CreateOptions, DeleteOptions, Etag, SearchOptions, StoreResult,
    UpdateOptions,
};
use std::sync::Arc;

const CASE: i64 = 5;

fn text(t: &str) -> CommentInput {
    CommentInput { text: t.into() }
}

#[tokio::test]
async fn versioned_updates() -> StoreResult<()> {
    let Some(mut client) = common::connect("versioned_updates").await else {
        return Ok(());
    };
    let tx = client.transaction().await?;
    common::install_schema(&tx).await;
    let store = CommentStore::new(common::ctx());

    let opts = CreateOptions::new(common::ann(), &["ver", "text", "can_edit"]);
    let created = store.create(&tx, CASE, &opts, &text("first")).await?;
    assert_eq!(created.ver, 1);
    assert_eq!(created.etag, format!("{}.1", created.id));
    assert!(created.can_edit);

    let etag: Etag = created.etag.parse()?;
    let opts = UpdateOptions::new(common::ann(), &["ver", "text"]).etag(etag);
    let updated = store.update(&tx, &opts, &text("second")).await?;
    assert_eq!(updated.ver, 2);
    assert_eq!(updated.text, "second");
    assert_eq!(updated.etag, format!("{}.2", created.id));

    // The old etag is stale now.
    let err = store.update(&tx, &opts, &text("third")).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(err.id(), "postgres.case_comment.update.not_found");

    // Only the author edits.
    let etag: Etag = updated.etag.parse()?;
    let opts = UpdateOptions::new(common::bob(), &[]).etag(etag);
    assert!(store.update(&tx, &opts, &text("bob")).await.unwrap_err().is_not_found());

    let seen_by_bob = store
        .list(
            &tx,
            CASE,
            &SearchOptions::new(common::bob()).fields(&["text", "can_edit", "created_by"]),
        )
        .await?;
    assert_eq!(seen_by_bob.items.len(), 1);
    assert!(!seen_by_bob.items[0].can_edit);
    assert_eq!(seen_by_bob.items[0].created_by, Some(Lookup::new(10, "Ann")));

    let err = store
        .delete(&tx, &DeleteOptions::new(common::bob(), vec![created.id]))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    let deleted = store
        .delete(&tx, &DeleteOptions::new(common::ann(), vec![created.id]))
        .await?;
    assert_eq!(deleted, 1);
    Ok(())
}

#[tokio::test]
async fn case_acl_limits_visibility() -> StoreResult<()> {
    let Some(mut client) = common::connect("case_acl_limits_visibility").await else {
        return Ok(());
    };
    let tx = client.transaction().await?;
    common::install_schema(&tx).await;
    let store = CommentStore::new(common::ctx());

    let bob = store
        .create(&tx, CASE, &CreateOptions::new(common::bob(), &[]), &text("from bob"))
        .await?;
    assert_eq!(bob.created_by.map(|u| u.name).as_deref(), Some("Bob, Jr."));

    let checked: Arc<dyn Auther> = Arc::new(
        AuthContext::new(1, 10)
            .with_roles(vec![10, 100])
            .with_rbac_scope("cases"),
    );
    let hidden = store
        .list(&tx, CASE, &SearchOptions::new(checked.clone()))
        .await?;
    assert!(hidden.items.is_empty());

    // Read access through role 100.
    tx.execute(
        "INSERT INTO cases.case_acl (dc, object, subject, access) VALUES (1, $1, 100, 4)",
        &[&CASE],
    )
    .await?;
    let visible = store
        .list(&tx, CASE, &SearchOptions::new(checked))
        .await?;
    assert_eq!(visible.items.len(), 1);
    assert_eq!(visible.items[0].id, bob.id);
    Ok(())
}
