//! Connection pool construction.

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use deadpool_postgres::{Manager, ManagerConfig, Pool, PoolBuilder, RecyclingMethod};
use tokio_postgres::Socket;
use tokio_postgres::tls::{MakeTlsConnect, TlsConnect};

/// Create a `NoTls` pool sized by `database.max_connections`.
///
/// ```ignore
/// let config = StoreConfig::load("casestore.toml")?;
/// let pool = casestore::create_pool(&config)?;
/// let client = pool.get().await?;
/// ```
pub fn create_pool(config: &StoreConfig) -> StoreResult<Pool> {
    create_pool_with_tls(config, tokio_postgres::NoTls)
}

/// Create a pool using a custom TLS connector.
pub fn create_pool_with_tls<T>(config: &StoreConfig, tls: T) -> StoreResult<Pool>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let max_size = config.database.max_connections;
    build_pool(&config.database.url, tls, |builder| builder.max_size(max_size))
}

fn build_pool<T>(
    database_url: &str,
    tls: T,
    configure: impl FnOnce(PoolBuilder) -> PoolBuilder,
) -> StoreResult<Pool>
where
    T: MakeTlsConnect<Socket> + Clone + Sync + Send + 'static,
    T::Stream: Sync + Send,
    T::TlsConnect: Sync + Send,
    <T::TlsConnect as TlsConnect<Socket>>::Future: Send,
{
    let pg_config: tokio_postgres::Config = database_url
        .parse()
        .map_err(|e: tokio_postgres::Error| StoreError::Config(format!("invalid database url: {e}")))?;

    let manager = Manager::from_config(
        pg_config,
        tls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );
    configure(Pool::builder(manager))
        .build()
        .map_err(|e| StoreError::Pool(e.to_string()))
}
