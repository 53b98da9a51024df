//! Postgres connectivity and idempotent provisioning for schema `app`
//!
//! - [`PoolManager`] memoises the primary and direct pools.
//! - [`provisioner`] applies table DDL so that reruns are harmless.
//! - [`seed`] upserts reference rows on their natural keys.
//! - [`cleanup`] empties user and lead tables in one transaction.
//! - [`migrations`] applies the same DDL as versioned sqlx migrations.
//! - [`backfill`] copies auth users into `app.user_profiles`.
//!
//! Workflows are written against the traits in [`traits`], implemented by
//! [`DbRepository`] for Postgres and [`MockRepository`] for tests.

pub mod backfill;
pub mod catalog;
pub mod cleanup;
pub mod error;
pub mod migrations;
pub mod mock;
pub mod models;
pub mod pool_manager;
pub mod provisioner;
pub mod repository;
pub mod seed;
pub mod statements;
pub mod tables;
pub mod tls;
pub mod traits;

pub use backfill::{BackfillError, BackfillReport, DirectoryUser, UserDirectory, backfill_profiles};
pub use cleanup::{CleanupPlan, CleanupReport, count_tables, run_cleanup};
pub use error::{
    DatabaseError, DatabaseErrorExt, DatabaseOperation, DatabaseResult, ErrorClass, PoolKind,
    classify_sqlstate,
};
pub use migrations::{MIGRATOR, MigrationLedger, MigrationReport};
pub use mock::MockRepository;
pub use models::{
    Course, CourseLevel, Role, SqlValue, TableCount, TableDeletion, UpsertOutcome, UpsertRow,
    UserProfile,
};
pub use pool_manager::{ConnectionStats, PoolManager, PoolStats};
pub use provisioner::{ProvisionReport, provision, provision_all};
pub use repository::DbRepository;
pub use seed::{SeedPolicy, SeedRecord, SeedReport, build_upsert_sql, seed_records};
pub use statements::split_statements;
pub use tables::{AppTable, SchemaDefinition};
pub use tls::{TlsPolicy, normalize_connection_string, redact_url, requires_tls};
pub use traits::{CleanupStore, ReferenceStore, SchemaExecutor};
