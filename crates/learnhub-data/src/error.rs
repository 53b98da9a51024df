//! Structured error handling for the data layer
//!
//! Every database failure carries the operation it happened in. Provisioning
//! decisions never compare error strings: they go through [`ErrorClass`].

use std::fmt;
use thiserror::Error;

/// Result type alias for database operations
pub type DatabaseResult<T> = std::result::Result<T, DatabaseError>;

/// Which memoised pool an operation ran against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    /// `DATABASE_URL`, usually through a pooling proxy
    Primary,
    /// `DIRECT_URL`, bypassing the proxy
    Direct,
}

impl PoolKind {
    /// Environment variable that holds this pool's connection string
    pub const fn env_var(self) -> &'static str {
        match self {
            Self::Primary => "DATABASE_URL",
            Self::Direct => "DIRECT_URL",
        }
    }
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primary => write!(f, "primary"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

/// Database operation type for error context
#[derive(Debug, Clone)]
pub enum DatabaseOperation {
    Ping { pool: PoolKind },
    ProvisionStatement { definition: String, index: usize },
    RelationExists { relation: String },
    UpsertRow { table: String, key: String },
    CountRows { table: String },
    DeleteRows { table: String },
    Query { description: String },
    Transaction { description: String },
}

impl fmt::Display for DatabaseOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ping { pool } => write!(f, "ping(pool={pool})"),
            Self::ProvisionStatement { definition, index } => {
                write!(f, "provision({definition}, statement={index})")
            }
            Self::RelationExists { relation } => write!(f, "relation_exists({relation})"),
            Self::UpsertRow { table, key } => write!(f, "upsert({table}, key={key})"),
            Self::CountRows { table } => write!(f, "count({table})"),
            Self::DeleteRows { table } => write!(f, "delete({table})"),
            Self::Query { description } => write!(f, "query({description})"),
            Self::Transaction { description } => write!(f, "transaction({description})"),
        }
    }
}

/// How a failure should be treated by idempotent provisioning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The object is already provisioned; continue
    AlreadyExists,
    /// Connection-level or contention failure; a rerun may succeed
    Transient,
    /// Anything else; abort
    Fatal,
}

/// Catalog constraint violated when two sessions race on `CREATE TABLE IF NOT EXISTS`
const PG_TYPE_NAME_INDEX: &str = "pg_type_typname_nsp_index";

/// Classify a Postgres SQLSTATE code
///
/// `constraint` is only consulted for `23505` (`unique_violation`), which is
/// an "already exists" signal only when raised on the type-name catalog index.
pub fn classify_sqlstate(code: &str, constraint: Option<&str>) -> ErrorClass {
    match code {
        // duplicate_table, duplicate_object, duplicate_schema,
        // duplicate_function, duplicate_database
        "42P07" | "42710" | "42P06" | "42723" | "42P04" => ErrorClass::AlreadyExists,
        "23505" if constraint == Some(PG_TYPE_NAME_INDEX) => ErrorClass::AlreadyExists,
        // serialization_failure, deadlock_detected, too_many_connections,
        // admin_shutdown, crash_shutdown, cannot_connect_now
        "40001" | "40P01" | "53300" | "57P01" | "57P02" | "57P03" => ErrorClass::Transient,
        c if c.starts_with("08") => ErrorClass::Transient,
        _ => ErrorClass::Fatal,
    }
}

/// Comprehensive database error with operation context
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Required configuration missing or invalid
    #[error("Database configuration error: {message}")]
    Configuration { message: String },

    /// Connection string could not be parsed
    #[error("Invalid connection string for {pool} pool ({redacted_url}): {source}")]
    InvalidConnectionString {
        pool: PoolKind,
        redacted_url: String,
        #[source]
        source: sqlx::Error,
    },

    /// No connection became available within the acquire timeout
    #[error("Timed out acquiring a connection for operation '{operation}'")]
    PoolTimedOut {
        operation: Box<DatabaseOperation>,
        #[source]
        source: sqlx::Error,
    },

    /// Query execution error
    #[error("Query failed for operation '{operation}': {message}")]
    QueryFailed {
        operation: Box<DatabaseOperation>,
        message: String,
        sqlstate: Option<String>,
        constraint: Option<String>,
        #[source]
        source: Option<sqlx::Error>,
    },

    /// Integrity constraint violation (SQLSTATE class `23`)
    #[error(
        "Constraint violation in operation '{operation}' ({name}): {message}",
        name = .constraint.as_deref().unwrap_or("unnamed")
    )]
    ConstraintViolation {
        operation: Box<DatabaseOperation>,
        sqlstate: String,
        constraint: Option<String>,
        message: String,
        #[source]
        source: sqlx::Error,
    },

    /// Transaction rolled back
    #[error("Transaction rolled back for operation '{operation}': {reason}")]
    TransactionRollback {
        operation: Box<DatabaseOperation>,
        reason: String,
        #[source]
        source: Option<Box<DatabaseError>>,
    },

    /// Batch operation partial failure
    #[error(
        "Batch operation '{operation}' partially failed: {successful_count}/{total_count} succeeded"
    )]
    BatchOperationFailed {
        operation: Box<DatabaseOperation>,
        total_count: usize,
        successful_count: usize,
        failed_items: Vec<String>,
    },

    /// Migration error, including a ledger that no longer matches the embedded files
    #[error("Database migration {target} failed: {message}")]
    MigrationFailed {
        target: String,
        message: String,
        #[source]
        source: sqlx::migrate::MigrateError,
    },

    /// A provisioning definition is unusable
    #[error("Invalid schema definition '{name}': {message}")]
    InvalidDefinition { name: String, message: String },

    /// Failed to read a definition file
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl DatabaseError {
    /// Configuration error for a missing environment variable
    pub fn missing_env(var: &str) -> Self {
        Self::Configuration {
            message: format!("{var} is not set"),
        }
    }

    /// Wrap a `sqlx::Error` with operation context, keeping the SQLSTATE
    pub fn from_sqlx(operation: DatabaseOperation, source: sqlx::Error) -> Self {
        if matches!(source, sqlx::Error::PoolTimedOut) {
            return Self::PoolTimedOut {
                operation: Box::new(operation),
                source,
            };
        }

        let (sqlstate, constraint) = source.as_database_error().map_or((None, None), |db| {
            (
                db.code().map(std::borrow::Cow::into_owned),
                db.constraint().map(str::to_string),
            )
        });

        if let Some(code) = sqlstate.as_deref().filter(|c| c.starts_with("23")) {
            return Self::ConstraintViolation {
                operation: Box::new(operation),
                sqlstate: code.to_string(),
                constraint,
                message: source.to_string(),
                source,
            };
        }

        Self::QueryFailed {
            operation: Box::new(operation),
            message: source.to_string(),
            sqlstate,
            constraint,
            source: Some(source),
        }
    }

    /// SQLSTATE reported by the server, if any
    pub fn sqlstate(&self) -> Option<&str> {
        match self {
            Self::QueryFailed { sqlstate, .. } => sqlstate.as_deref(),
            Self::ConstraintViolation { sqlstate, .. } => Some(sqlstate),
            _ => None,
        }
    }

    /// Classify this error for provisioning decisions
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::QueryFailed {
                sqlstate: Some(code),
                constraint,
                ..
            } => classify_sqlstate(code, constraint.as_deref()),
            Self::ConstraintViolation {
                sqlstate,
                constraint,
                ..
            } => classify_sqlstate(sqlstate, constraint.as_deref()),
            Self::QueryFailed {
                source: Some(sqlx::Error::Io(_) | sqlx::Error::PoolClosed),
                ..
            }
            | Self::PoolTimedOut { .. } => ErrorClass::Transient,
            _ => ErrorClass::Fatal,
        }
    }

    pub fn is_already_exists(&self) -> bool {
        self.class() == ErrorClass::AlreadyExists
    }
}

/// Extension trait for converting sqlx errors with context
#[allow(clippy::result_large_err)]
pub trait DatabaseErrorExt<T> {
    /// Convert to `DatabaseError` with operation context
    ///
    /// # Errors
    /// Returns `DatabaseError` carrying the operation and SQLSTATE
    fn map_db_err(self, operation: DatabaseOperation) -> DatabaseResult<T>;
}

impl<T> DatabaseErrorExt<T> for std::result::Result<T, sqlx::Error> {
    fn map_db_err(self, operation: DatabaseOperation) -> DatabaseResult<T> {
        self.map_err(|e| DatabaseError::from_sqlx(operation, e))
    }
}
