//! Error types for casestore

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Stable error kind, independent of the message and identifier.
///
/// Transport layers map these to their own status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidArgument,
    UniqueViolation,
    ForeignKeyViolation,
    CheckViolation,
    NotNullViolation,
    Internal,
}

/// Error types for store operations.
///
/// Every variant carries an identifier such as `postgres.priority.create.exec`
/// (store errors) or `store.projection.unknown_field` (engine errors).
#[derive(Debug, Error)]
pub enum StoreError {
    /// Zero rows returned or affected
    #[error("[{id}] not found: {message}")]
    NotFound { id: String, message: String },

    /// Bad client input: unknown field, comparator, nesting depth, missing option
    #[error("[{id}] invalid argument: {message}")]
    InvalidArgument { id: String, message: String },

    /// Unique constraint violation
    #[error("[{id}] already exists: {message}")]
    UniqueViolation {
        id: String,
        constraint: Option<String>,
        message: String,
    },

    /// Foreign key constraint violation
    #[error("[{id}] foreign key violation: {message}")]
    ForeignKeyViolation {
        id: String,
        constraint: Option<String>,
        message: String,
    },

    /// Check constraint violation
    #[error("[{id}] check violation: {message}")]
    CheckViolation {
        id: String,
        constraint: Option<String>,
        message: String,
    },

    /// NOT NULL constraint violation
    #[error("[{id}] not null violation: {message}")]
    NotNullViolation {
        id: String,
        column: Option<String>,
        message: String,
    },

    /// Connection failure, query build failure, unexpected scan failure
    #[error("[{id}] internal: {message}")]
    Internal { id: String, message: String },

    /// Driver error not yet classified by an [`ErrorTranslator`]
    #[error("Query error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(std::time::Duration),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Pool error
    #[cfg(feature = "pool")]
    #[error("Pool error: {0}")]
    Pool(String),
}

impl StoreError {
    /// Create a not found error
    pub fn not_found(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::NotFound {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Internal {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Create a scan/decode error for a specific column
    pub fn decode(column: &str, message: impl std::fmt::Display) -> Self {
        Self::internal(
            "store.scan.decode",
            format!("column '{column}': {message}"),
        )
    }

    /// Stable identifier of this error.
    pub fn id(&self) -> &str {
        match self {
            Self::NotFound { id, .. }
            | Self::InvalidArgument { id, .. }
            | Self::UniqueViolation { id, .. }
            | Self::ForeignKeyViolation { id, .. }
            | Self::CheckViolation { id, .. }
            | Self::NotNullViolation { id, .. }
            | Self::Internal { id, .. } => id,
            Self::Database(_) => "store.database",
            Self::Timeout(_) => "store.timeout",
            Self::Config(_) => "store.config",
            #[cfg(feature = "pool")]
            Self::Pool(_) => "store.pool",
        }
    }

    /// Kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::InvalidArgument { .. } | Self::Config(_) => ErrorKind::InvalidArgument,
            Self::UniqueViolation { .. } => ErrorKind::UniqueViolation,
            Self::ForeignKeyViolation { .. } => ErrorKind::ForeignKeyViolation,
            Self::CheckViolation { .. } => ErrorKind::CheckViolation,
            Self::NotNullViolation { .. } => ErrorKind::NotNullViolation,
            _ => ErrorKind::Internal,
        }
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is an invalid argument error
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Check if this is a unique violation error
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::UniqueViolation { .. })
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

#[cfg(feature = "pool")]
impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        Self::Pool(err.to_string())
    }
}

/// Human-readable messages attached to named database constraints.
///
/// Built once at process start and immutable afterwards.
///
/// ```ignore
/// let messages = ConstraintMessages::builder()
///     .register("priority_dc_name_uindex", "priority name must be unique")
///     .build();
/// ```
#[derive(Debug, Clone, Default)]
pub struct ConstraintMessages {
    messages: HashMap<String, String>,
}

impl ConstraintMessages {
    /// Start registering constraint messages.
    pub fn builder() -> ConstraintMessagesBuilder {
        ConstraintMessagesBuilder::default()
    }

    /// Message registered for `constraint`, if any.
    pub fn get(&self, constraint: &str) -> Option<&str> {
        self.messages.get(constraint).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Write-once registration of constraint messages.
#[derive(Debug, Default)]
#[must_use]
pub struct ConstraintMessagesBuilder {
    messages: HashMap<String, String>,
}

impl ConstraintMessagesBuilder {
    /// Register a message for a constraint name.
    ///
    /// # Panics
    /// Registering the same constraint name twice is a programming error and panics.
    pub fn register(mut self, constraint: impl Into<String>, message: impl Into<String>) -> Self {
        let constraint = constraint.into();
        if self.messages.contains_key(&constraint) {
            panic!("constraint message for '{constraint}' is already registered");
        }
        self.messages.insert(constraint, message.into());
        self
    }

    pub fn build(self) -> ConstraintMessages {
        ConstraintMessages {
            messages: self.messages,
        }
    }
}

static KEY_DETAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Key \((?P<column>[^)]+)\)=\((?P<value>.*)\)").expect("valid regex")
});

/// Parse the `Key (col)=(val)` part of a Postgres error detail.
pub fn parse_key_detail(detail: &str) -> Option<(String, String)> {
    let caps = KEY_DETAIL.captures(detail)?;
    Some((caps["column"].to_string(), caps["value"].to_string()))
}

/// Turns driver errors into classified [`StoreError`]s.
#[derive(Debug, Clone, Default)]
pub struct ErrorTranslator {
    messages: ConstraintMessages,
}

impl ErrorTranslator {
    pub fn new(messages: ConstraintMessages) -> Self {
        Self { messages }
    }

    /// Classify `err` and stamp it with `id`.
    ///
    /// Errors that are already classified pass through untouched.
    pub fn translate(&self, err: StoreError, id: &str) -> StoreError {
        match err {
            StoreError::Database(db) => self.translate_db(db, id),
            other => other,
        }
    }

    fn translate_db(&self, err: tokio_postgres::Error, id: &str) -> StoreError {
        let id = id.to_string();
        let Some(db_err) = err.as_db_error() else {
            return StoreError::internal(id, err.to_string());
        };

        let constraint = db_err.constraint().map(str::to_string);
        let registered = constraint
            .as_deref()
            .and_then(|c| self.messages.get(c))
            .map(str::to_string);
        let from_detail = db_err.detail().and_then(parse_key_detail);

        match db_err.code().code() {
            "23505" => {
                let message = registered.unwrap_or_else(|| match from_detail {
                    Some((column, value)) => format!("{column} '{value}' already exists"),
                    None => db_err.message().to_string(),
                });
                StoreError::UniqueViolation {
                    id,
                    constraint,
                    message,
                }
            }
            "23503" => {
                let message = registered.unwrap_or_else(|| match from_detail {
                    Some((column, value)) => {
                        format!("{column} '{value}' references a missing record")
                    }
                    None => db_err.message().to_string(),
                });
                StoreError::ForeignKeyViolation {
                    id,
                    constraint,
                    message,
                }
            }
            "23514" => StoreError::CheckViolation {
                id,
                message: registered.unwrap_or_else(|| db_err.message().to_string()),
                constraint,
            },
            "23502" => {
                let column = db_err.column().map(str::to_string);
                let message = registered.unwrap_or_else(|| match &column {
                    Some(column) => format!("{column} is required"),
                    None => db_err.message().to_string(),
                });
                StoreError::NotNullViolation {
                    id,
                    column,
                    message,
                }
            }
            _ => StoreError::internal(id, db_err.message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_detail_extracts_column_and_value() {
        let parsed = parse_key_detail("Key (dc, name)=(1, Urgent) already exists.");
        assert_eq!(
            parsed,
            Some(("dc, name".to_string(), "1, Urgent".to_string()))
        );
    }

    #[test]
    fn key_detail_without_match_is_none() {
        assert_eq!(parse_key_detail("Failing row contains (1, null)."), None);
    }

    #[test]
    fn registry_lookup() {
        let messages = ConstraintMessages::builder()
            .register("priority_dc_name_uindex", "priority name must be unique")
            .build();
        assert_eq!(
            messages.get("priority_dc_name_uindex"),
            Some("priority name must be unique")
        );
        assert_eq!(messages.get("other"), None);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn registry_rejects_duplicates() {
        let _ = ConstraintMessages::builder()
            .register("c1", "first")
            .register("c1", "second");
    }

    #[test]
    fn classified_errors_pass_through() {
        let translator = ErrorTranslator::default();
        let err = translator.translate(
            StoreError::not_found("postgres.priority.delete.exec", "no rows"),
            "ignored",
        );
        assert!(err.is_not_found());
        assert_eq!(err.id(), "postgres.priority.delete.exec");
    }

    #[test]
    fn kinds() {
        assert_eq!(
            StoreError::invalid_argument("x", "y").kind(),
            ErrorKind::InvalidArgument
        );
        assert_eq!(StoreError::internal("x", "y").kind(), ErrorKind::Internal);
        assert_eq!(
            StoreError::Timeout(std::time::Duration::from_secs(1)).kind(),
            ErrorKind::Internal
        );
    }
}
