//! Workflows against a real Postgres instance
//!
//! Run with `TEST_DATABASE_URL` set and `cargo test -- --ignored`. The
//! database is modified: use a disposable instance.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use learnhub_data::catalog::course_catalog;
use learnhub_data::{
    AppTable, CleanupPlan, CleanupStore, DbRepository, MIGRATOR, MigrationLedger, PoolKind,
    PoolManager, SchemaDefinition, SeedPolicy, provision_all, run_cleanup, seed_records,
};
use learnhub_test_utils::{get_test_runtime, test_database_config};

fn repository() -> Option<DbRepository> {
    let config = test_database_config()?;
    Some(DbRepository::new(Arc::new(PoolManager::new(config))))
}

#[test]
#[ignore = "requires TEST_DATABASE_URL"]
fn provisioning_twice_succeeds() {
    let Some(repo) = repository() else {
        return;
    };
    get_test_runtime().block_on(async {
        repo.pools().ping(PoolKind::Primary).await.unwrap();

        let definitions = SchemaDefinition::all();
        provision_all(&repo, &definitions).await.unwrap();
        let rerun = provision_all(&repo, &definitions).await.unwrap();

        assert!(
            rerun
                .iter()
                .filter(|r| r.target_existed.is_some())
                .all(|r| r.already_provisioned())
        );
    });
}

#[test]
#[ignore = "requires TEST_DATABASE_URL"]
fn seeding_twice_updates_in_place() {
    let Some(repo) = repository() else {
        return;
    };
    get_test_runtime().block_on(async {
        provision_all(&repo, &SchemaDefinition::all()).await.unwrap();
        let courses = course_catalog();

        let first = seed_records(&repo, &courses, SeedPolicy::default()).await;
        assert!(first.is_success(), "{:?}", first.failures);

        let before = repo.count_rows(AppTable::Courses).await.unwrap();
        let second = seed_records(&repo, &courses, SeedPolicy::default()).await;
        assert_eq!(second.updated, courses.len());
        assert_eq!(repo.count_rows(AppTable::Courses).await.unwrap(), before);
    });
}

#[test]
#[ignore = "requires TEST_DATABASE_URL"]
fn reseeding_with_new_title_updates_the_same_row() {
    let Some(repo) = repository() else {
        return;
    };
    get_test_runtime().block_on(async {
        provision_all(&repo, &SchemaDefinition::all()).await.unwrap();
        let pool = repo.pools().primary().unwrap();

        let mut course = course_catalog().into_iter().next().unwrap();
        course.slug = format!("roundtrip-{}", std::process::id());
        course.title = "First title".to_string();
        seed_records(&repo, std::slice::from_ref(&course), SeedPolicy::default()).await;

        let read = || {
            sqlx::query_as::<_, (String, f64)>(
                "SELECT title, extract(epoch FROM updated_at)::float8 FROM app.courses WHERE slug = $1",
            )
            .bind(course.slug.clone())
            .fetch_all(pool)
        };
        let first = read().await.unwrap();

        tokio::time::sleep(Duration::from_millis(20)).await;
        course.title = "Second title".to_string();
        let report =
            seed_records(&repo, std::slice::from_ref(&course), SeedPolicy::default()).await;
        assert_eq!(report.updated, 1);

        let second = read().await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].0, "Second title");
        assert!(second[0].1 > first[0].1, "updated_at did not advance");

        sqlx::query("DELETE FROM app.courses WHERE slug = $1")
            .bind(&course.slug)
            .execute(pool)
            .await
            .unwrap();
    });
}

#[test]
#[ignore = "requires TEST_DATABASE_URL"]
fn clearing_users_keeps_leads() {
    let Some(repo) = repository() else {
        return;
    };
    get_test_runtime().block_on(async {
        provision_all(&repo, &SchemaDefinition::all()).await.unwrap();
        let leads_before = repo.count_rows(AppTable::DemoRequests).await.unwrap();

        let report = run_cleanup(&repo, &CleanupPlan::users()).await.unwrap();

        assert_eq!(report.rows_after(AppTable::Users), Some(0));
        assert_eq!(report.rows_after(AppTable::DemoRequests), leads_before);
    });
}

#[test]
#[ignore = "requires TEST_DATABASE_URL"]
fn migration_ledger_is_idempotent() {
    let Some(repo) = repository() else {
        return;
    };
    get_test_runtime().block_on(async {
        let pool = repo.pools().migration_pool().unwrap();
        let ledger = MigrationLedger::new(pool);
        let expected = MIGRATOR.iter().count();

        // tables provisioned earlier must not break the first migration run
        provision_all(&repo, &SchemaDefinition::all()).await.unwrap();
        ledger.run().await.unwrap();
        let second = ledger.run().await.unwrap();

        assert!(second.applied.is_empty());
        assert_eq!(second.already_applied, expected);
        assert_eq!(ledger.applied().await.unwrap().len(), expected);
    });
}
