//! Destructive cleanup of user data and, optionally, marketing leads
//!
//! Deletes run in dependency order inside one transaction. Row counts are
//! gathered before and after so the caller can show what changed.

use futures::future::try_join_all;

use crate::error::{DatabaseError, DatabaseResult};
use crate::models::{TableCount, TableDeletion};
use crate::tables::AppTable;
use crate::traits::CleanupStore;

/// User-owned tables, children before parents
pub const USER_DATA_TABLES: [AppTable; 6] = [
    AppTable::UserRoles,
    AppTable::UserCourses,
    AppTable::Sessions,
    AppTable::Accounts,
    AppTable::Users,
    AppTable::AnonymousUserActivity,
];

/// Which tables a cleanup empties
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupPlan {
    tables: Vec<AppTable>,
    includes_leads: bool,
}

impl CleanupPlan {
    /// User data only; lead tables are left alone
    pub fn users() -> Self {
        Self {
            tables: USER_DATA_TABLES.to_vec(),
            includes_leads: false,
        }
    }

    /// User data followed by every lead table
    pub fn with_leads() -> Self {
        Self {
            tables: USER_DATA_TABLES
                .into_iter()
                .chain(AppTable::LEADS)
                .collect(),
            includes_leads: true,
        }
    }

    pub fn new(clear_leads: bool) -> Self {
        if clear_leads {
            Self::with_leads()
        } else {
            Self::users()
        }
    }

    pub fn tables(&self) -> &[AppTable] {
        &self.tables
    }

    pub const fn includes_leads(&self) -> bool {
        self.includes_leads
    }
}

/// Tables whose counts are shown around a cleanup
pub fn reported_tables() -> Vec<AppTable> {
    USER_DATA_TABLES.into_iter().chain(AppTable::LEADS).collect()
}

/// Count every table concurrently
///
/// A table that has not been provisioned is reported with no count.
///
/// # Errors
///
/// Returns the first failing count
pub async fn count_tables<S>(store: &S, tables: &[AppTable]) -> DatabaseResult<Vec<TableCount>>
where
    S: CleanupStore + ?Sized,
{
    try_join_all(tables.iter().map(|&table| async move {
        let rows = store.count_rows(table).await?;
        Ok::<_, DatabaseError>(TableCount { table, rows })
    }))
    .await
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupReport {
    pub before: Vec<TableCount>,
    pub deleted: Vec<TableDeletion>,
    pub after: Vec<TableCount>,
}

impl CleanupReport {
    pub fn total_deleted(&self) -> u64 {
        self.deleted.iter().map(|d| d.deleted).sum()
    }

    pub fn rows_after(&self, table: AppTable) -> Option<i64> {
        self.after.iter().find(|c| c.table == table).and_then(|c| c.rows)
    }

    pub fn rows_before(&self, table: AppTable) -> Option<i64> {
        self.before.iter().find(|c| c.table == table).and_then(|c| c.rows)
    }
}

/// Count, delete according to `plan`, count again
///
/// # Errors
///
/// Returns count failures, or the rollback error if any delete failed; in
/// that case no table was modified
pub async fn run_cleanup<S>(store: &S, plan: &CleanupPlan) -> DatabaseResult<CleanupReport>
where
    S: CleanupStore + ?Sized,
{
    let reported = reported_tables();
    let before = count_tables(store, &reported).await?;

    tracing::warn!(
        tables = plan.tables().len(),
        include_leads = plan.includes_leads(),
        "Deleting all rows"
    );
    let deleted = store.delete_all(plan.tables()).await?;
    for deletion in &deleted {
        tracing::info!(table = %deletion.table, rows = deletion.deleted, "Cleared table");
    }

    let after = count_tables(store, &reported).await?;
    Ok(CleanupReport {
        before,
        deleted,
        after,
    })
}
