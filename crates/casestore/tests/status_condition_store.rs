mod common;

use casestore::store::{StatusConditionInput, StatusConditionStore};
use casestore::{CreateOptions, DeleteOptions, SearchOptions, StoreResult, UpdateOptions};

const OPEN: i64 = 1;

fn condition(name: &str, initial: bool, is_final: bool) -> StatusConditionInput {
    StatusConditionInput {
        name: name.into(),
        description: String::new(),
        initial,
        is_final,
    }
}

#[tokio::test]
async fn initial_and_final_rules() -> StoreResult<()> {
    let Some(mut client) = common::connect("initial_and_final_rules").await else {
        return Ok(());
    };
    let tx = client.transaction().await?;
    common::install_schema(&tx).await;
    let store = StatusConditionStore::new(common::ctx());
    let create = CreateOptions::new(common::ann(), &["name", "initial", "final"]);

    // The first condition of a status is both initial and final.
    let new = store
        .create(&tx, OPEN, &create, &condition("New", false, false))
        .await?;
    assert!(new.initial);
    assert!(new.is_final);

    // A new initial condition takes the flag over.
    let work = store
        .create(&tx, OPEN, &create, &condition("Work", true, false))
        .await?;
    assert!(work.initial);
    assert!(!work.is_final);

    let list = store
        .list(&tx, OPEN, &SearchOptions::new(common::ann()).fields(&["name", "initial"]))
        .await?;
    let initial: Vec<&str> = list
        .items
        .iter()
        .filter(|c| c.initial)
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(initial, ["Work"]);

    // The initial condition cannot be deleted.
    let err = store
        .delete(&tx, OPEN, &DeleteOptions::new(common::ann(), vec![work.id]))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    // Nor can the last final one lose its flag.
    let unset_final = UpdateOptions::new(common::ann(), &["final"]).mask(&["final"]);
    let err = store
        .update(&tx, &unset_final, new.id, &condition("", false, false))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let done = store
        .create(&tx, OPEN, &create, &condition("Done", false, true))
        .await?;
    assert!(done.is_final);

    let new = store
        .update(&tx, &unset_final, new.id, &condition("", false, false))
        .await?;
    assert!(!new.is_final);

    // Switching the initial flag through update resets the previous one.
    let make_initial = UpdateOptions::new(common::ann(), &["initial"]).mask(&["initial"]);
    let new = store
        .update(&tx, &make_initial, new.id, &condition("", true, false))
        .await?;
    assert!(new.initial);
    let list = store
        .list(&tx, OPEN, &SearchOptions::new(common::ann()).fields(&["initial"]))
        .await?;
    assert_eq!(list.items.iter().filter(|c| c.initial).count(), 1);

    // Done is now the only final condition; Work is neither.
    let err = store
        .delete(&tx, OPEN, &DeleteOptions::new(common::ann(), vec![done.id]))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let deleted = store
        .delete(
            &tx,
            OPEN,
            &DeleteOptions::new(common::ann(), vec![work.id]).fields(&["name"]),
        )
        .await?;
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0].name, "Work");
    Ok(())
}
