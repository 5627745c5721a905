//! Statement tracing and timeouts.
//!
//! [`TracedClient`] wraps any [`GenericClient`](crate::GenericClient) and
//! emits `tracing` events under the `casestore.sql` target:
//!
//! - `debug` before a statement runs: tag, parameter count, compacted SQL
//! - `debug` after it completes, with the elapsed time
//! - `warn` when it ran past the slow-query threshold
//! - `error` when it failed or timed out
//!
//! ```rust,ignore
//! use casestore::monitor::{MonitorConfig, TracedClient};
//! use std::time::Duration;
//!
//! let client = TracedClient::new(pool.get().await?).with_config(
//!     MonitorConfig::new()
//!         .with_query_timeout(Duration::from_secs(30))
//!         .with_slow_query_threshold(Duration::from_millis(500)),
//! );
//! ```

mod config;
mod traced;


pub use config::MonitorConfig;
pub use traced::TracedClient;

/// Tracing target of statement events.
pub const TARGET: &str = "casestore.sql";

/// Compacted `sql` cut to at most `max` bytes, as it appears in events.
pub(crate) fn loggable_sql(sql: &str, max: Option<usize>) -> String {
    truncate_sql(&crate::sql_text::minify(sql), max).into_owned()
}

/// Cut `sql` to at most `max` bytes on a char boundary.
pub(crate) fn truncate_sql(sql: &str, max: Option<usize>) -> std::borrow::Cow<'_, str> {
    match max {
        Some(max) if sql.len() > max => {
            let mut end = max;
            while end > 0 && !sql.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}...", &sql[..end]).into()
        }
        _ => sql.into(),
    }
}
