//! Repository traits for provisioning, seeding and cleanup
//!
//! The workflows in this crate are written against these traits so they can
//! run against Postgres ([`crate::DbRepository`]) or in memory
//! ([`crate::MockRepository`]).

use async_trait::async_trait;

use crate::error::DatabaseResult;
use crate::models::{TableDeletion, UpsertOutcome, UpsertRow};
use crate::tables::AppTable;

/// Executes DDL statements
#[async_trait]
pub trait SchemaExecutor: Send + Sync {
    /// Execute one statement of a definition
    async fn execute_statement(
        &self,
        definition: &str,
        index: usize,
        statement: &str,
    ) -> DatabaseResult<()>;

    /// Whether a relation such as `app.users` exists
    async fn relation_exists(&self, qualified_name: &str) -> DatabaseResult<bool>;
}

/// Writes reference rows
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Insert the row, or update it in place when its natural key exists
    async fn upsert(&self, row: &UpsertRow) -> DatabaseResult<UpsertOutcome>;
}

/// Counts and bulk-deletes table contents
#[async_trait]
pub trait CleanupStore: Send + Sync {
    /// Rows in `table`, or `None` when the table does not exist
    async fn count_rows(&self, table: AppTable) -> DatabaseResult<Option<i64>>;

    /// Delete every row of `tables`, in order, as one atomic unit
    ///
    /// Either every table is emptied or none is.
    async fn delete_all(&self, tables: &[AppTable]) -> DatabaseResult<Vec<TableDeletion>>;
}
