mod common;

use casestore::projection::Lookup;
use casestore::store::{CatalogInput, CatalogStore};
use casestore::{
    Comparison, CreateOptions, DeleteOptions, FilterExpr, SearchOptions, StoreResult,
    UpdateOptions,
};

#[tokio::test]
async fn catalog_with_services() -> StoreResult<()> {
    let Some(mut client) = common::connect("catalog_with_services").await else {
        return Ok(());
    };
    let tx = client.transaction().await?;
    common::install_schema(&tx).await;
    let store = CatalogStore::new(common::ctx());

    let input = CatalogInput {
        name: "IT".into(),
        code: "it".into(),
        description: String::new(),
        state: true,
        sla_id: 1,
        status_id: 1,
    };
    let opts = CreateOptions::new(common::ann(), &["name", "sla", "status", "services"]);
    let catalog = store.create(&tx, &opts, &input).await?;
    assert_eq!(catalog.sla, Some(Lookup::new(1, "Gold")));
    assert_eq!(catalog.status, Some(Lookup::new(1, "Open")));
    assert!(catalog.services.is_empty());

    tx.execute(
        "INSERT INTO cases.service_catalog (dc, catalog_id, name, code, state, created_at, updated_at) \
         VALUES (1, $1, 'VPN', 'vpn', true, now(), now()), (1, $1, 'Email', NULL, false, now(), now())",
        &[&catalog.id],
    )
    .await?;

    let by_sla = |name: &str| {
        SearchOptions::new(common::ann())
            .fields(&["name", "services"])
            .filter_tree(FilterExpr::leaf("sla.name", Comparison::Eq, name))
    };
    let gold = store.list(&tx, &by_sla("Gold")).await?;
    assert_eq!(gold.items.len(), 1);
    let services: Vec<&str> = gold.items[0].services.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(services, ["Email", "VPN"]);
    assert_eq!(gold.items[0].services[0].code, "");
    assert!(store.list(&tx, &by_sla("Silver")).await?.items.is_empty());

    let opts = UpdateOptions::new(common::ann(), &["sla"]).mask(&["sla"]);
    let moved = store
        .update(&tx, &opts, catalog.id, &CatalogInput { sla_id: 2, ..input })
        .await?;
    assert_eq!(moved.sla, Some(Lookup::new(2, "Silver")));
    assert_eq!(store.list(&tx, &by_sla("Silver")).await?.items.len(), 1);

    let deleted = store
        .delete(&tx, &DeleteOptions::new(common::ann(), vec![catalog.id]).fields(&["name"]))
        .await?;
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].name, "IT");
    let row = tx
        .query_one("SELECT count(*) FROM cases.service_catalog", &[])
        .await?;
    assert_eq!(row.get::<_, i64>(0), 0);

    let err = store
        .delete(&tx, &DeleteOptions::new(common::ann(), vec![catalog.id]))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
    Ok(())
}
