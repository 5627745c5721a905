//! Transaction helper.
//!
//! Single-statement store methods accept any [`GenericClient`](crate::GenericClient),
//! so they run the same inside or outside a transaction. Methods that issue
//! several statements take `&tokio_postgres::Transaction` instead; open one
//! with [`transaction!`](crate::transaction!).
//!
//! ```ignore
//! let mut client = pool.get().await?;
//! let cond = casestore::transaction!(&mut client, tx, {
//!     store.update(&tx, &opts, input).await
//! })?;
//! ```

/// Runs the block inside a database transaction.
///
/// - Begins a transaction via `$client.transaction().await`.
/// - Commits when the block yields `Ok(_)`.
/// - Rolls back when it yields `Err(_)`, returning the block's error.
///
/// The block must evaluate to `casestore::StoreResult<T>`. If the block
/// panics or the future is dropped, the transaction is dropped uncommitted
/// and the server rolls it back.
#[macro_export]
macro_rules! transaction {
    ($client:expr, $tx:ident, $body:block) => {{
        let $tx = ($client)
            .transaction()
            .await
            .map_err($crate::StoreError::from)?;

        let __casestore_tx_result: $crate::StoreResult<_> = async { $body }.await;
        match __casestore_tx_result {
            Ok(value) => {
                $tx.commit().await.map_err($crate::StoreError::from)?;
                Ok(value)
            }
            Err(error) => match $tx.rollback().await {
                Ok(()) => Err(error),
                Err(rollback_err) => Err($crate::StoreError::internal(
                    "store.transaction.rollback",
                    format!("{error} (rollback failed: {rollback_err})"),
                )),
            },
        }
    }};
}
