#![allow(dead_code)]

use casestore::{AuthContext, Auther, ConstraintMessages, PagingLimits, StoreContext};
use std::sync::Arc;
use tokio_postgres::{Client, NoTls, Transaction};

const SCHEMA: &str = include_str!("schema.sql");

/// Connect to `DATABASE_URL`, or `None` when it is not set.
pub async fn connect(test: &str) -> Option<Client> {
    dotenvy::dotenv().ok();
    let Ok(url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL is not set; skipping {test}");
        return None;
    };
    let (client, connection) = tokio_postgres::connect(&url, NoTls)
        .await
        .expect("connect to DATABASE_URL");
    tokio::spawn(async move {
        let _ = connection.await;
    });
    Some(client)
}

/// Create the fixture tables inside `tx`. Nothing is committed; dropping the
/// transaction removes them again.
pub async fn install_schema(tx: &Transaction<'_>) {
    tx.batch_execute(SCHEMA).await.expect("install fixture schema");
}

pub fn ctx() -> StoreContext {
    let messages = ConstraintMessages::builder()
        .register("priority_dc_name_uindex", "priority name must be unique")
        .register(
            "priority_sla_condition_priority_fk",
            "priority does not exist",
        )
        .build();
    StoreContext::new(
        casestore::ErrorTranslator::new(messages),
        PagingLimits {
            default_size: 10,
            max_size: 100,
        },
    )
}

/// User 10 of domain 1.
pub fn ann() -> Arc<dyn Auther> {
    Arc::new(AuthContext::new(1, 10))
}

/// User 11 of domain 1.
pub fn bob() -> Arc<dyn Auther> {
    Arc::new(AuthContext::new(1, 11))
}

/// User 20 of domain 2.
pub fn eve() -> Arc<dyn Auther> {
    Arc::new(AuthContext::new(2, 20))
}
