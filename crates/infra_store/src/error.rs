//! Store error types
//!
//! Runtime errors of the PostgreSQL backend. Specification errors from the
//! kernel convert in via `From<QueryError>`; sqlx errors are classified
//! into variants by PostgreSQL error code so callers can branch on meaning
//! instead of parsing messages.

use core_query::QueryError;
use thiserror::Error;

/// Errors that can occur during store operations
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invalid query specification (unknown column, bad pager, closure
    /// handed to the store-evaluated path)
    #[error("invalid query specification: {0}")]
    Spec(#[from] QueryError),

    /// Requested entity absent
    #[error("entity not found: {0}")]
    NotFound(String),

    /// A relation name the entity does not declare, rejected when the
    /// include plan is built
    #[error("invalid relation: {0}")]
    InvalidRelation(String),

    /// Result row could not be mapped onto the target record type
    #[error("row mapping failed: {0}")]
    Mapping(String),

    /// Optimistic-concurrency conflict that outlived the retry policy
    ///
    /// Single conflicts never surface; the save loop absorbs and retries
    /// them. This variant appears only when the policy's attempt budget is
    /// exhausted.
    #[error("concurrency conflict unresolved after {attempts} attempts")]
    Concurrency { attempts: u32 },

    /// Query execution failed (syntax, constraint machinery, connectivity
    /// mid-flight)
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Failed to establish a database connection
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// No available connections
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// Transaction begin/commit failure
    #[error("transaction failed: {0}")]
    TransactionFailed(String),

    /// Unique constraint violation
    #[error("duplicate entry: {0}")]
    DuplicateEntry(String),

    /// Foreign key constraint violation
    #[error("foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// Check constraint violation
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// The caller's cancellation token fired while a read was in flight
    #[error("operation cancelled")]
    Cancelled,
}

impl StoreError {
    /// Not-found error for a specific entity table and key
    pub fn not_found(table: &str, key: impl std::fmt::Display) -> Self {
        StoreError::NotFound(format!("{} with key '{}' not found", table, key))
    }

    pub fn invalid_relation(table: &str, relation: &str) -> Self {
        StoreError::InvalidRelation(format!(
            "{} does not declare relation '{}'",
            table, relation
        ))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            StoreError::DuplicateEntry(_)
                | StoreError::ForeignKeyViolation(_)
                | StoreError::ConstraintViolation(_)
        )
    }

    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            StoreError::ConnectionFailed(_) | StoreError::PoolExhausted
        )
    }
}

/// Classifies sqlx errors by PostgreSQL error code
///
/// https://www.postgresql.org/docs/current/errcodes-appendix.html
impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => StoreError::NotFound("record not found".to_string()),
            sqlx::Error::PoolTimedOut => StoreError::PoolExhausted,
            sqlx::Error::ColumnNotFound(column) => {
                StoreError::Mapping(format!("result set has no column '{}'", column))
            }
            sqlx::Error::ColumnDecode { index, source } => {
                StoreError::Mapping(format!("failed to decode column {}: {}", index, source))
            }
            sqlx::Error::TypeNotFound { type_name } => {
                StoreError::Mapping(format!("unknown store type '{}'", type_name))
            }
            sqlx::Error::Io(e) => StoreError::ConnectionFailed(e.to_string()),
            sqlx::Error::Tls(e) => StoreError::ConnectionFailed(e.to_string()),
            sqlx::Error::Database(db_err) => {
                if let Some(code) = db_err.code() {
                    match code.as_ref() {
                        "23505" => StoreError::DuplicateEntry(db_err.message().to_string()),
                        "23503" => StoreError::ForeignKeyViolation(db_err.message().to_string()),
                        "23514" => StoreError::ConstraintViolation(db_err.message().to_string()),
                        _ => StoreError::QueryFailed(db_err.message().to_string()),
                    }
                } else {
                    StoreError::QueryFailed(db_err.message().to_string())
                }
            }
            other => StoreError::QueryFailed(other.to_string()),
        }
    }
}
