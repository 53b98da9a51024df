//! Versioned schema migrations
//!
//! The files under `migrations/` are embedded with `sqlx::migrate!`: the base
//! definition is version 1, then one version per table in creation order.
//! sqlx records applied versions and their checksums in `_sqlx_migrations`
//! and holds a session advisory lock while it runs, so migrations must use a
//! session-mode connection (the direct pool when one is configured).

use std::collections::HashSet;

use sqlx::PgPool;
use sqlx::migrate::{Migrate, MigrateError, Migrator};

use crate::error::{DatabaseError, DatabaseResult};

/// Every migration, embedded at compile time
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Versions applied by this run
    pub applied: Vec<i64>,
    /// Migrations that were already recorded
    pub already_applied: usize,
}

/// Runs [`MIGRATOR`] against one pool
pub struct MigrationLedger<'a> {
    pool: &'a PgPool,
}

impl<'a> MigrationLedger<'a> {
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Apply every pending migration, each in its own transaction
    ///
    /// # Errors
    ///
    /// Returns `MigrationFailed` for lock, ledger or statement failures, and
    /// when an applied migration was modified afterwards
    pub async fn run(&self) -> DatabaseResult<MigrationReport> {
        let before: HashSet<i64> = self.applied().await?.into_iter().collect();

        MIGRATOR.run(self.pool).await.map_err(migration_failed)?;

        let mut report = MigrationReport::default();
        for migration in MIGRATOR.iter() {
            if before.contains(&migration.version) {
                report.already_applied = report.already_applied.saturating_add(1);
            } else {
                tracing::info!(
                    version = migration.version,
                    name = %migration.description,
                    "Applied migration"
                );
                report.applied.push(migration.version);
            }
        }

        if report.applied.is_empty() {
            tracing::info!(already_applied = report.already_applied, "Schema is up to date");
        }
        Ok(report)
    }

    /// Versions currently recorded in the ledger, creating it if needed
    ///
    /// # Errors
    ///
    /// Returns `MigrationFailed` when the ledger cannot be read
    pub async fn applied(&self) -> DatabaseResult<Vec<i64>> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| migration_failed(MigrateError::Execute(e)))?;
        conn.ensure_migrations_table()
            .await
            .map_err(migration_failed)?;
        let applied = conn
            .list_applied_migrations()
            .await
            .map_err(migration_failed)?;
        Ok(applied.into_iter().map(|m| m.version).collect())
    }
}

/// Name of the embedded migration with `version`
fn describe(version: i64) -> String {
    MIGRATOR
        .iter()
        .find(|m| m.version == version)
        .map_or_else(|| format!("v{version}"), |m| format!("v{version} ({})", m.description))
}

fn migration_failed(source: MigrateError) -> DatabaseError {
    let target = match &source {
        MigrateError::VersionMismatch(version)
        | MigrateError::VersionMissing(version)
        | MigrateError::Dirty(version) => describe(*version),
        _ => "run".to_string(),
    };
    DatabaseError::MigrationFailed {
        target,
        message: source.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tables::SchemaDefinition;

    #[test]
    fn test_migrations_follow_definition_order() {
        let definitions = SchemaDefinition::all();
        assert_eq!(MIGRATOR.iter().count(), definitions.len());

        for ((migration, definition), version) in MIGRATOR.iter().zip(&definitions).zip(1_i64..) {
            assert_eq!(migration.version, version);
            assert_eq!(migration.description, definition.name.replace('_', " "));
            assert_eq!(migration.sql.trim(), definition.sql.trim());
        }
    }

    #[test]
    fn test_trigger_ddl_is_rerunnable() {
        for migration in MIGRATOR.iter() {
            let creates = migration.sql.matches("CREATE TRIGGER").count();
            let drops = migration.sql.matches("DROP TRIGGER IF EXISTS").count();
            assert_eq!(creates, drops, "v{}", migration.version);
        }
    }

    #[test]
    fn test_modified_migration_names_its_version() {
        let err = migration_failed(MigrateError::VersionMismatch(3));
        assert!(matches!(&err, DatabaseError::MigrationFailed { target, .. } if target == "v3 (users)"));
        assert!(err.to_string().contains("modified"));
    }
}
