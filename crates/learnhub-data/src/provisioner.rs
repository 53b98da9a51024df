//! Idempotent schema provisioning
//!
//! A definition is applied statement by statement. Statements that fail
//! because their object already exists are skipped; any other failure stops
//! the definition. Running a definition twice leaves the schema unchanged.

use std::fmt;

use crate::error::{DatabaseError, DatabaseResult, ErrorClass};
use crate::statements::split_statements;
use crate::tables::SchemaDefinition;
use crate::traits::SchemaExecutor;

/// Outcome of provisioning one definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub definition: String,
    /// Whether the definition's table existed beforehand (`None` when it has no table)
    pub target_existed: Option<bool>,
    /// Statements that executed successfully
    pub applied: usize,
    /// Statements skipped because their object already existed
    pub skipped: usize,
}

impl ProvisionReport {
    pub const fn statements(&self) -> usize {
        self.applied.saturating_add(self.skipped)
    }

    /// Nothing new was created: the table was present or every statement was skipped
    pub const fn already_provisioned(&self) -> bool {
        matches!(self.target_existed, Some(true)) || (self.applied == 0 && self.skipped > 0)
    }
}

impl fmt::Display for ProvisionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.already_provisioned() {
            write!(f, "{}: already exists, skipped", self.definition)?;
        } else {
            write!(f, "{}: created", self.definition)?;
        }
        write!(
            f,
            " ({} applied, {} already present)",
            self.applied, self.skipped
        )
    }
}

/// Apply one definition
///
/// # Errors
///
/// Returns `InvalidDefinition` for a definition without statements, or the
/// first statement error that is not an "already exists" error
pub async fn provision<E>(executor: &E, definition: &SchemaDefinition) -> DatabaseResult<ProvisionReport>
where
    E: SchemaExecutor + ?Sized,
{
    let statements = split_statements(&definition.sql);
    if statements.is_empty() {
        return Err(DatabaseError::InvalidDefinition {
            name: definition.name.to_string(),
            message: "no SQL statements found".to_string(),
        });
    }

    let target_existed = match definition.target {
        Some(table) => Some(executor.relation_exists(&table.qualified()).await?),
        None => None,
    };

    let mut report = ProvisionReport {
        definition: definition.name.to_string(),
        target_existed,
        applied: 0,
        skipped: 0,
    };

    for (index, statement) in statements.iter().enumerate() {
        match executor
            .execute_statement(&definition.name, index, statement)
            .await
        {
            Ok(()) => report.applied = report.applied.saturating_add(1),
            Err(e) if e.class() == ErrorClass::AlreadyExists => {
                tracing::info!(
                    definition = %definition.name,
                    statement = index,
                    sqlstate = e.sqlstate().unwrap_or_default(),
                    "Object already exists, skipped"
                );
                report.skipped = report.skipped.saturating_add(1);
            }
            Err(e) => {
                tracing::error!(
                    definition = %definition.name,
                    statement = index,
                    error = %e,
                    "Provisioning statement failed"
                );
                return Err(e);
            }
        }
    }

    tracing::info!(
        definition = %report.definition,
        applied = report.applied,
        skipped = report.skipped,
        "{report}"
    );

    Ok(report)
}

/// Apply several definitions in order, stopping at the first failure
///
/// # Errors
///
/// Returns the first error from [`provision`]
pub async fn provision_all<E>(
    executor: &E,
    definitions: &[SchemaDefinition],
) -> DatabaseResult<Vec<ProvisionReport>>
where
    E: SchemaExecutor + ?Sized,
{
    let mut reports = Vec::with_capacity(definitions.len());
    for definition in definitions {
        reports.push(provision(executor, definition).await?);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockRepository;
    use crate::tables::AppTable;
    use std::borrow::Cow;

    #[tokio::test]
    async fn test_first_run_creates_table() {
        let repo = MockRepository::new();
        let report = provision(&repo, &AppTable::Courses.definition()).await.unwrap();

        assert_eq!(report.target_existed, Some(false));
        assert_eq!(report.skipped, 0);
        assert_eq!(report.applied, 4);
        assert!(!report.already_provisioned());
        assert!(repo.relation_exists_sync("app.courses"));
    }

    #[tokio::test]
    async fn test_rerun_skips_existing_objects() {
        let repo = MockRepository::new();
        let definition = AppTable::Courses.definition();
        provision(&repo, &definition).await.unwrap();
        let second = provision(&repo, &definition).await.unwrap();

        assert_eq!(second.target_existed, Some(true));
        // the trigger is dropped and recreated
        assert_eq!(second.skipped, 0);
        assert_eq!(second.applied, 4);
        assert!(second.already_provisioned());
        assert!(second.to_string().contains("already exists, skipped"));
    }

    #[tokio::test]
    async fn test_fatal_error_aborts_definition() {
        let repo = MockRepository::new();
        repo.fail_statements_containing("CREATE INDEX", "42501");

        let err = provision(&repo, &AppTable::Courses.definition())
            .await
            .unwrap_err();
        assert_eq!(err.sqlstate(), Some("42501"));
        assert_eq!(repo.executed_statements().len(), 1);
    }

    #[tokio::test]
    async fn test_definition_without_statements_is_rejected() {
        let repo = MockRepository::new();
        let definition = SchemaDefinition {
            name: Cow::Borrowed("blank"),
            sql: Cow::Borrowed("-- nothing here\n"),
            target: None,
        };
        assert!(matches!(
            provision(&repo, &definition).await,
            Err(DatabaseError::InvalidDefinition { .. })
        ));
    }

    #[tokio::test]
    async fn test_provision_all_applies_in_order() {
        let repo = MockRepository::new();
        let reports = provision_all(&repo, &SchemaDefinition::all()).await.unwrap();

        assert_eq!(reports.len(), 18);
        assert_eq!(reports[0].definition, "base");
        for table in AppTable::ALL {
            assert!(repo.relation_exists_sync(&table.qualified()), "{table}");
        }
    }
}
