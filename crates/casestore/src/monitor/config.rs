use std::time::Duration;

/// Settings of a [`TracedClient`](super::TracedClient).
///
/// The default has no timeout, no slow-query warning and truncates logged
/// SQL to 200 bytes.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Statements running longer are cancelled and fail with
    /// [`StoreError::Timeout`](crate::StoreError::Timeout).
    pub query_timeout: Option<Duration>,
    /// Statements running longer are logged at `warn`.
    pub slow_query_threshold: Option<Duration>,
    /// Logged SQL is cut to this many bytes. `None` logs it whole.
    pub max_sql_length: Option<usize>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            query_timeout: None,
            slow_query_threshold: None,
            max_sql_length: Some(200),
        }
    }
}

impl MonitorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = Some(timeout);
        self
    }

    pub fn with_slow_query_threshold(mut self, threshold: Duration) -> Self {
        self.slow_query_threshold = Some(threshold);
        self
    }

    pub fn with_max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Log SQL untruncated.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }
}
