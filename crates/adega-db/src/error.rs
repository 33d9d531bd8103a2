//! # Database Error Types
//!
//! Error types for database operations and stock transactions.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)          CoreError (adega-core)            │
//! │       │                                   │                             │
//! │       ▼                                   ▼                             │
//! │  DbError (this module) ◄──────────── DbError::Domain                   │
//! │       │                                                                 │
//! │       ├── is_stock_shortage() → "restock or sell less"                 │
//! │       └── is_retryable()      → "system busy, try again"               │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## SQLite Result Codes
//! sqlx reports the extended SQLite result code as a string:
//!
//! | Code   | Name                       | Maps to              |
//! |--------|----------------------------|----------------------|
//! | `5`    | `SQLITE_BUSY` (timed out)  | `StorageUnavailable` |
//! | `517`  | `SQLITE_BUSY_SNAPSHOT`     | `TransactionConflict`|
//! | `6`    | `SQLITE_LOCKED`            | `TransactionConflict`|
//! | `2067` | `SQLITE_CONSTRAINT_UNIQUE` | `UniqueViolation`    |
//! | `787`  | `SQLITE_CONSTRAINT_FOREIGNKEY` | `ForeignKeyViolation` |

use adega_core::CoreError;
use thiserror::Error;

/// Database operation errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// A domain rule rejected the operation. Nothing was written.
    #[error(transparent)]
    Domain(#[from] CoreError),

    /// Entity not found in database.
    ///
    /// ## When This Occurs
    /// - `fetch_one` returns no rows
    /// - ID doesn't exist
    /// - Soft-deleted record
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// Unique constraint violation.
    ///
    /// ## When This Occurs
    /// - Second active variant of the same type for a product
    /// - Duplicate receipt number
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    /// Foreign key constraint violation.
    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// The store could not be reached in time.
    ///
    /// ## When This Occurs
    /// - No pooled connection became free before the acquire timeout
    /// - Another writer held the database lock past the busy timeout
    ///
    /// The operation did not run. Retry it as a whole.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A concurrent writer invalidated this transaction's snapshot.
    ///
    /// The transaction was rolled back. Retry it as a whole.
    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    /// Database connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Migration failed.
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// Configuration could not be read or is invalid.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Query execution failed.
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Internal database error.
    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a NotFound error for a given entity type and ID.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Creates a UniqueViolation error.
    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Infrastructure failure: the caller should retry the whole operation
    /// and must not assume anything about stock.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DbError::StorageUnavailable(_) | DbError::TransactionConflict(_)
        )
    }

    /// Not enough stock: the operator should restock or reduce the quantity.
    pub fn is_stock_shortage(&self) -> bool {
        matches!(self, DbError::Domain(err) if err.is_stock_shortage())
    }

    /// The wrapped domain error, if any.
    pub fn as_domain(&self) -> Option<&CoreError> {
        match self {
            DbError::Domain(err) => Some(err),
            _ => None,
        }
    }
}

/// Convert sqlx errors to DbError.
///
/// ## Error Mapping
/// ```text
/// sqlx::Error::RowNotFound    → DbError::NotFound
/// sqlx::Error::Database       → result code, then message
/// sqlx::Error::PoolTimedOut   → DbError::StorageUnavailable
/// sqlx::Error::PoolClosed     → DbError::ConnectionFailed
/// Other                       → DbError::Internal
/// ```
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => DbError::NotFound {
                entity: "Record".to_string(),
                id: "unknown".to_string(),
            },

            sqlx::Error::Database(db_err) => {
                let msg = db_err.message().to_string();
                let code = db_err.code().map(|c| c.into_owned()).unwrap_or_default();

                match code.as_str() {
                    "5" | "261" | "773" => return DbError::StorageUnavailable(msg),
                    "6" | "262" | "517" => return DbError::TransactionConflict(msg),
                    _ => {}
                }

                // UNIQUE constraint: "UNIQUE constraint failed: <table>.<column>"
                if msg.contains("UNIQUE constraint failed") {
                    let field = msg
                        .split("UNIQUE constraint failed: ")
                        .nth(1)
                        .unwrap_or("unknown")
                        .to_string();
                    DbError::UniqueViolation {
                        field,
                        value: "unknown".to_string(),
                    }
                } else if msg.contains("FOREIGN KEY constraint failed") {
                    DbError::ForeignKeyViolation { message: msg }
                } else if msg.contains("database is locked") {
                    DbError::StorageUnavailable(msg)
                } else {
                    DbError::QueryFailed(msg)
                }
            }

            sqlx::Error::PoolTimedOut => {
                DbError::StorageUnavailable("timed out waiting for a connection".to_string())
            }

            sqlx::Error::PoolClosed => DbError::ConnectionFailed("Pool is closed".to_string()),

            sqlx::Error::Io(io) => DbError::StorageUnavailable(io.to_string()),

            _ => DbError::Internal(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

impl From<adega_core::ValidationError> for DbError {
    fn from(err: adega_core::ValidationError) -> Self {
        DbError::Domain(CoreError::Validation(err))
    }
}

impl From<toml::de::Error> for DbError {
    fn from(err: toml::de::Error) -> Self {
        DbError::InvalidConfig(err.to_string())
    }
}

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        DbError::InvalidConfig(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Unit Tests
// =============================================================================
