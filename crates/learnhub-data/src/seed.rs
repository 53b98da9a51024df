//! Reference-row seeding
//!
//! Rows are upserted on their natural key, so a seed can be rerun freely.
//! A failing record is logged and collected; whether the batch goes on
//! depends on [`SeedPolicy`].

use crate::error::{DatabaseError, DatabaseOperation, DatabaseResult};
use crate::models::{Course, Role, UpsertOutcome, UpsertRow, UserProfile};
use crate::tables::AppTable;
use crate::traits::ReferenceStore;

/// A record that maps onto one upsert
pub trait SeedRecord {
    fn to_row(&self) -> UpsertRow;
}

impl SeedRecord for Course {
    fn to_row(&self) -> UpsertRow {
        UpsertRow::new(AppTable::Courses, &["slug"])
            .column("slug", self.slug.as_str())
            .column("title", self.title.as_str())
            .column("subtitle", self.subtitle.as_deref())
            .column("description", self.description.as_str())
            .column("level", self.level.as_str())
            .column("duration_weeks", self.duration_weeks)
            .column("price_cents", self.price_cents)
            .column("is_published", self.is_published)
            .column("sort_order", self.sort_order)
    }
}

impl SeedRecord for Role {
    fn to_row(&self) -> UpsertRow {
        UpsertRow::new(AppTable::Roles, &["name"])
            .column("name", self.name.as_str())
            .column("display_name", self.display_name.as_str())
            .column("description", self.description.as_deref())
    }
}

impl SeedRecord for UserProfile {
    fn to_row(&self) -> UpsertRow {
        UpsertRow::new(AppTable::UserProfiles, &["user_id"])
            .column("user_id", self.user_id)
            .column("email", self.email.as_deref())
            .column("full_name", self.full_name.as_deref())
            .column("avatar_url", self.avatar_url.as_deref())
    }
}

/// Build the upsert statement for a row
///
/// Placeholders follow column order. Non-key columns are overwritten from
/// `EXCLUDED` and `updated_at` is refreshed. The single returned column,
/// `inserted`, is true when the row did not exist before.
pub fn build_upsert_sql(row: &UpsertRow) -> String {
    let columns: Vec<&str> = row.columns.iter().map(|(name, _)| *name).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${i}")).collect();

    let mut assignments: Vec<String> = columns
        .iter()
        .filter(|column| !row.key_columns.contains(column))
        .map(|column| format!("{column} = EXCLUDED.{column}"))
        .collect();
    assignments.push("updated_at = now()".to_string());

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {} RETURNING (xmax = 0) AS inserted",
        row.table.qualified(),
        columns.join(", "),
        placeholders.join(", "),
        row.key_columns.join(", "),
        assignments.join(", "),
    )
}

/// How a batch reacts to a failing record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedPolicy {
    /// Stop at the first failure instead of continuing with the next record
    pub fail_fast: bool,
}

impl SeedPolicy {
    pub const fn fail_fast() -> Self {
        Self { fail_fast: true }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedFailure {
    pub key: String,
    pub message: String,
}

/// Per-batch seeding outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub total: usize,
    pub inserted: usize,
    pub updated: usize,
    pub failures: Vec<SeedFailure>,
    /// The batch stopped early under a fail-fast policy
    pub aborted: bool,
}

impl SeedReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub const fn succeeded(&self) -> usize {
        self.inserted.saturating_add(self.updated)
    }

    /// Fold another batch into this one
    pub fn merge(&mut self, other: Self) {
        self.total = self.total.saturating_add(other.total);
        self.inserted = self.inserted.saturating_add(other.inserted);
        self.updated = self.updated.saturating_add(other.updated);
        self.failures.extend(other.failures);
        self.aborted |= other.aborted;
    }

    /// Turn a report with failures into `BatchOperationFailed`
    ///
    /// # Errors
    ///
    /// Returns `BatchOperationFailed` listing the failed keys
    pub fn into_result(self, table: AppTable) -> DatabaseResult<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(DatabaseError::BatchOperationFailed {
            operation: Box::new(DatabaseOperation::UpsertRow {
                table: table.qualified(),
                key: "batch".to_string(),
            }),
            total_count: self.total,
            successful_count: self.succeeded(),
            failed_items: self.failures.into_iter().map(|f| f.key).collect(),
        })
    }
}

/// Upsert every record through `store`
pub async fn seed_records<S, R>(store: &S, records: &[R], policy: SeedPolicy) -> SeedReport
where
    S: ReferenceStore + ?Sized,
    R: SeedRecord + Sync,
{
    let mut report = SeedReport {
        total: records.len(),
        ..SeedReport::default()
    };

    for record in records {
        let row = record.to_row();
        let key = row.natural_key();

        match store.upsert(&row).await {
            Ok(UpsertOutcome::Inserted) => {
                tracing::info!(table = %row.table, key = %key, "Inserted");
                report.inserted = report.inserted.saturating_add(1);
            }
            Ok(UpsertOutcome::Updated) => {
                tracing::info!(table = %row.table, key = %key, "Updated");
                report.updated = report.updated.saturating_add(1);
            }
            Err(e) => {
                tracing::error!(table = %row.table, key = %key, error = %e, "Upsert failed");
                report.failures.push(SeedFailure {
                    key,
                    message: e.to_string(),
                });
                if policy.fail_fast {
                    report.aborted = true;
                    break;
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::course_catalog;
    use crate::mock::MockRepository;
    use crate::models::SqlValue;

    fn text_value<'a>(row: &'a UpsertRow, column: &str) -> Option<&'a str> {
        match row.value(column) {
            Some(SqlValue::Text(Some(v))) => Some(v.as_str()),
            _ => None,
        }
    }

    fn sample_role(name: &str) -> Role {
        Role {
            name: name.to_string(),
            display_name: name.to_uppercase(),
            description: None,
        }
    }

    #[test]
    fn test_upsert_sql_for_roles() {
        let sql = build_upsert_sql(&sample_role("admin").to_row());
        assert_eq!(
            sql,
            "INSERT INTO app.roles (name, display_name, description) VALUES ($1, $2, $3) \
             ON CONFLICT (name) DO UPDATE SET display_name = EXCLUDED.display_name, \
             description = EXCLUDED.description, updated_at = now() \
             RETURNING (xmax = 0) AS inserted"
        );
    }

    #[test]
    fn test_upsert_sql_never_overwrites_key() {
        let catalog = course_catalog();
        let sql = build_upsert_sql(&catalog[0].to_row());
        assert!(sql.contains("ON CONFLICT (slug)"));
        assert!(!sql.contains("slug = EXCLUDED.slug"));
        assert!(sql.contains("title = EXCLUDED.title"));
    }

    #[tokio::test]
    async fn test_second_seed_updates_in_place() {
        let repo = MockRepository::new();
        let catalog = course_catalog();

        let first = seed_records(&repo, &catalog, SeedPolicy::default()).await;
        assert_eq!(first.inserted, catalog.len());

        let mut renamed = catalog.clone();
        renamed[0].title = "AI Foundations (2nd edition)".to_string();
        let second = seed_records(&repo, &renamed, SeedPolicy::default()).await;

        assert_eq!(second.inserted, 0);
        assert_eq!(second.updated, catalog.len());
        assert_eq!(repo.row_count(AppTable::Courses), catalog.len());
        let stored = repo.stored_row(AppTable::Courses, &renamed[0].slug).unwrap();
        assert_eq!(text_value(&stored, "title"), Some("AI Foundations (2nd edition)"));
    }

    #[tokio::test]
    async fn test_failures_are_collected_and_batch_continues() {
        let repo = MockRepository::new();
        repo.fail_upsert_for("editor");
        let roles = vec![sample_role("admin"), sample_role("editor"), sample_role("viewer")];

        let report = seed_records(&repo, &roles, SeedPolicy::default()).await;

        assert_eq!(report.inserted, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].key, "editor");
        assert!(!report.aborted);
        assert!(matches!(
            report.into_result(AppTable::Roles),
            Err(DatabaseError::BatchOperationFailed { successful_count: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_fail_fast_stops_at_first_failure() {
        let repo = MockRepository::new();
        repo.fail_upsert_for("editor");
        let roles = vec![sample_role("admin"), sample_role("editor"), sample_role("viewer")];

        let report = seed_records(&repo, &roles, SeedPolicy::fail_fast()).await;

        assert!(report.aborted);
        assert_eq!(report.inserted, 1);
        assert_eq!(repo.row_count(AppTable::Roles), 1);
    }
}
