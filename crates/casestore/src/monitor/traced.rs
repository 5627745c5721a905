use super::{MonitorConfig, TARGET, loggable_sql};
use crate::client::GenericClient;
use crate::error::{StoreError, StoreResult};
use std::future::Future;
use std::time::Instant;
use tokio_postgres::Row;
use tokio_postgres::types::ToSql;

/// A [`GenericClient`] that traces every statement and enforces a timeout.
pub struct TracedClient<C> {
    client: C,
    config: MonitorConfig,
}

impl<C: GenericClient> TracedClient<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            config: MonitorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn inner(&self) -> &C {
        &self.client
    }

    pub fn into_inner(self) -> C {
        self.client
    }

    /// Run `future` with tracing around it and the configured timeout.
    async fn observe<T, F>(
        &self,
        tag: Option<&str>,
        sql: &str,
        param_count: usize,
        future: F,
    ) -> StoreResult<T>
    where
        F: Future<Output = StoreResult<T>> + Send,
    {
        let tag = tag.unwrap_or("-");
        tracing::debug!(
            target: TARGET,
            tag,
            param_count,
            sql = %loggable_sql(sql, self.config.max_sql_length),
            "executing statement"
        );

        let start = Instant::now();
        let result = match self.config.query_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, future).await {
                Ok(result) => result,
                Err(_) => {
                    if let Some(token) = self.client.cancel_token() {
                        tokio::spawn(async move {
                            let _ = token.cancel_query(tokio_postgres::NoTls).await;
                        });
                    }
                    Err(StoreError::Timeout(timeout))
                }
            },
            None => future.await,
        };
        let elapsed = start.elapsed();

        match &result {
            Ok(_) => {
                tracing::debug!(target: TARGET, tag, ?elapsed, "statement finished");
                if let Some(threshold) = self.config.slow_query_threshold {
                    if elapsed > threshold {
                        tracing::warn!(
                            target: TARGET,
                            tag,
                            ?elapsed,
                            ?threshold,
                            sql = %loggable_sql(sql, self.config.max_sql_length),
                            "slow statement"
                        );
                    }
                }
            }
            Err(error) => {
                tracing::error!(target: TARGET, tag, ?elapsed, %error, "statement failed");
            }
        }
        result
    }
}

impl<C: GenericClient> GenericClient for TracedClient<C> {
    async fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> StoreResult<Vec<Row>> {
        self.observe(None, sql, params.len(), self.client.query(sql, params))
            .await
    }

    async fn query_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> StoreResult<Vec<Row>> {
        self.observe(Some(tag), sql, params.len(), self.client.query(sql, params))
            .await
    }

    async fn execute(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> StoreResult<u64> {
        self.observe(None, sql, params.len(), self.client.execute(sql, params))
            .await
    }

    async fn execute_tagged(
        &self,
        tag: &str,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> StoreResult<u64> {
        self.observe(Some(tag), sql, params.len(), self.client.execute(sql, params))
            .await
    }

    fn cancel_token(&self) -> Option<tokio_postgres::CancelToken> {
        self.client.cancel_token()
    }
}
