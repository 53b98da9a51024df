//! Subcommand implementations
//!
//! Each command writes its human-readable report to `out` and returns an
//! error when the run should exit non-zero.

use std::future::Future;
use std::io::Write;
use std::time::Duration;

use anyhow::{bail, ensure};
use learnhub_data::cleanup::reported_tables;
use learnhub_data::catalog::{course_catalog, role_catalog};
use learnhub_data::{
    BackfillReport, CleanupPlan, CleanupReport, CleanupStore, MigrationLedger, PoolKind,
    PoolManager, ReferenceStore, SchemaDefinition, SchemaExecutor, SeedPolicy, SeedReport,
    UserDirectory, backfill_profiles, count_tables, provision_all, run_cleanup, seed_records,
};
use learnhub_supabase::KeyRole;
use tracing::info;

use crate::bootstrap::AdminContext;
use crate::cli::{Command, ProvisionArgs, SeedTarget};
use crate::directory::SupabaseDirectory;

/// Definitions selected by `provision` arguments
///
/// Named tables are applied after the base objects, in creation order.
///
/// # Errors
///
/// Returns the read or parse failure of a `--file` definition
pub fn provision_definitions(args: &ProvisionArgs) -> anyhow::Result<Vec<SchemaDefinition>> {
    if args.all {
        return Ok(SchemaDefinition::all());
    }
    if !args.file.is_empty() {
        return args
            .file
            .iter()
            .map(|path| SchemaDefinition::from_file(path).map_err(Into::into))
            .collect();
    }

    let mut tables = args.tables.clone();
    tables.sort_unstable();
    tables.dedup();

    let mut definitions = Vec::with_capacity(tables.len().saturating_add(1));
    definitions.push(SchemaDefinition::base());
    definitions.extend(tables.into_iter().map(learnhub_data::AppTable::definition));
    Ok(definitions)
}

/// Apply `definitions`, printing one line per definition
///
/// # Errors
///
/// Returns the first provisioning failure
pub async fn provision<E, W>(
    executor: &E,
    definitions: &[SchemaDefinition],
    out: &mut W,
) -> anyhow::Result<()>
where
    E: SchemaExecutor + ?Sized,
    W: Write + ?Sized,
{
    let reports = provision_all(executor, definitions).await?;
    for report in &reports {
        writeln!(out, "{report}")?;
    }
    let created = reports.iter().filter(|r| !r.already_provisioned()).count();
    writeln!(
        out,
        "Provisioned {} definition(s): {created} created, {} already present",
        reports.len(),
        reports.len().saturating_sub(created)
    )?;
    Ok(())
}

/// Upsert one reference catalog
///
/// # Errors
///
/// Returns `BatchOperationFailed` when any record could not be written
pub async fn seed<S, W>(
    store: &S,
    target: SeedTarget,
    policy: SeedPolicy,
    out: &mut W,
) -> anyhow::Result<SeedReport>
where
    S: ReferenceStore + ?Sized,
    W: Write + ?Sized,
{
    let report = match target {
        SeedTarget::Courses => seed_records(store, &course_catalog(), policy).await,
        SeedTarget::Roles => seed_records(store, &role_catalog(), policy).await,
    };

    let table = target.table();
    writeln!(
        out,
        "{}: {} inserted, {} updated, {} failed",
        table.qualified(),
        report.inserted,
        report.updated,
        report.failures.len()
    )?;
    for failure in &report.failures {
        writeln!(out, "  {}: {}", failure.key, failure.message)?;
    }
    if report.aborted {
        writeln!(out, "  stopped at the first failure")?;
    }

    Ok(report.into_result(table)?)
}

/// Wait `delay` unless `cancel` completes first
///
/// Returns `true` when the full delay elapsed.
pub async fn grace_period<F>(delay: Duration, cancel: F) -> bool
where
    F: Future<Output = ()>,
{
    tokio::select! {
        () = tokio::time::sleep(delay) => true,
        () = cancel => false,
    }
}

/// Resolves on Ctrl-C; never resolves if the signal cannot be observed
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for Ctrl-C; grace period is not cancellable");
        std::future::pending::<()>().await;
    }
}

fn write_counts<W: Write + ?Sized>(out: &mut W, report: &CleanupReport) -> std::io::Result<()> {
    writeln!(out, "{:<32} {:>10} {:>10}", "table", "before", "after")?;
    for before in &report.before {
        let after = report
            .rows_after(before.table)
            .map_or_else(|| "-".to_string(), |rows| rows.to_string());
        writeln!(
            out,
            "{:<32} {:>10} {after:>10}",
            before.table.qualified(),
            before.rows_label()
        )?;
    }
    Ok(())
}

/// Delete all user rows, and lead rows when `clear_leads` is set
///
/// Lead tables are only cleared after `delay`; completing `cancel` during the
/// delay aborts the run before anything is deleted.
///
/// # Errors
///
/// Returns an error when cancelled, or the count or rollback failure
pub async fn clear_all_users<S, F, W>(
    store: &S,
    clear_leads: bool,
    delay: Duration,
    cancel: F,
    out: &mut W,
) -> anyhow::Result<CleanupReport>
where
    S: CleanupStore + ?Sized,
    F: Future<Output = ()>,
    W: Write + ?Sized,
{
    let plan = CleanupPlan::new(clear_leads);
    if plan.includes_leads() {
        writeln!(
            out,
            "WARNING: lead tables will also be cleared in {}s. Press Ctrl-C to cancel.",
            delay.as_secs()
        )?;
        out.flush()?;
        if !grace_period(delay, cancel).await {
            bail!("Cleanup cancelled; no rows were deleted");
        }
    }

    let report = run_cleanup(store, &plan).await?;
    write_counts(out, &report)?;
    writeln!(
        out,
        "Deleted {} row(s) from {} table(s)",
        report.total_deleted(),
        report.deleted.len()
    )?;
    Ok(report)
}

/// Print row counts for user and lead tables
///
/// # Errors
///
/// Returns the first count failure
pub async fn counts<S, W>(store: &S, out: &mut W) -> anyhow::Result<()>
where
    S: CleanupStore + ?Sized,
    W: Write + ?Sized,
{
    let counts = count_tables(store, &reported_tables()).await?;
    for count in &counts {
        writeln!(out, "{:<32} {:>10}", count.table.qualified(), count.rows_label())?;
    }
    Ok(())
}

/// Apply pending migrations on the migration pool
///
/// # Errors
///
/// Returns pool, lock, modified-migration or statement failures
pub async fn migrate<W>(pools: &PoolManager, out: &mut W) -> anyhow::Result<()>
where
    W: Write + ?Sized,
{
    let pool = pools.migration_pool()?;
    let report = MigrationLedger::new(pool).run().await?;

    for version in &report.applied {
        writeln!(out, "applied v{version}")?;
    }
    writeln!(
        out,
        "{} migration(s) applied, {} already recorded",
        report.applied.len(),
        report.already_applied
    )?;
    Ok(())
}

/// Create or refresh one profile per directory user
///
/// # Errors
///
/// Returns directory failures, or an error when any profile failed
pub async fn backfill<D, S, W>(
    directory: &D,
    store: &S,
    per_page: u32,
    policy: SeedPolicy,
    out: &mut W,
) -> anyhow::Result<BackfillReport>
where
    D: UserDirectory + ?Sized,
    S: ReferenceStore + ?Sized,
    W: Write + ?Sized,
{
    let report = backfill_profiles(directory, store, per_page, policy).await?;
    writeln!(
        out,
        "{} user(s) over {} page(s): {} inserted, {} updated, {} failed",
        report.users_seen,
        report.pages,
        report.profiles.inserted,
        report.profiles.updated,
        report.profiles.failures.len()
    )?;
    for failure in &report.profiles.failures {
        writeln!(out, "  {}: {}", failure.key, failure.message)?;
    }
    ensure!(
        report.profiles.is_success(),
        "{} profile(s) could not be written",
        report.profiles.failures.len()
    );
    Ok(report)
}

/// Ping the configured pools and the Supabase project
///
/// # Errors
///
/// Returns an error naming how many checks failed
pub async fn check<W>(ctx: &AdminContext, out: &mut W) -> anyhow::Result<()>
where
    W: Write + ?Sized,
{
    let mut failures = 0usize;

    for kind in [PoolKind::Primary, PoolKind::Direct] {
        if kind == PoolKind::Direct && !ctx.pools.has_direct() {
            writeln!(out, "{kind} pool: not configured")?;
            continue;
        }
        match ctx.pools.ping(kind).await {
            Ok(()) => writeln!(out, "{kind} pool: ok")?,
            Err(e) => {
                failures = failures.saturating_add(1);
                writeln!(out, "{kind} pool: FAILED ({e})")?;
            }
        }
    }

    for stats in ctx.pools.stats().pools {
        writeln!(
            out,
            "{} pool: {} open, {} idle, {} max",
            stats.kind, stats.size, stats.idle, stats.max
        )?;
    }

    let supabase = ctx.supabase.config();
    if supabase.url.is_none() {
        writeln!(out, "supabase: not configured")?;
    } else {
        let role = if supabase.service_role_key.is_some() {
            KeyRole::Service
        } else {
            KeyRole::Anon
        };
        let outcome = match ctx.supabase.get(role) {
            Ok(client) => client.health().await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(()) => writeln!(out, "supabase ({role}): ok")?,
            Err(e) => {
                failures = failures.saturating_add(1);
                writeln!(out, "supabase ({role}): FAILED ({e})")?;
            }
        }
    }

    ensure!(failures == 0, "{failures} connectivity check(s) failed");
    Ok(())
}

/// Run one subcommand against the wired services
///
/// # Errors
///
/// Returns the command's failure
pub async fn dispatch<W>(command: Command, ctx: &AdminContext, out: &mut W) -> anyhow::Result<()>
where
    W: Write + ?Sized,
{
    let configured_policy = SeedPolicy {
        fail_fast: ctx.config.provisioning.fail_fast,
    };
    info!(command = command.name(), "Running command");

    match command {
        Command::Provision(args) => {
            let definitions = provision_definitions(&args)?;
            provision(&ctx.repository, &definitions, out).await
        }
        Command::Seed(args) => {
            let policy = SeedPolicy {
                fail_fast: args.fail_fast || configured_policy.fail_fast,
            };
            seed(&ctx.repository, args.target, policy, out).await.map(drop)
        }
        Command::ClearAllUsers { clear_leads } => clear_all_users(
            &ctx.repository,
            clear_leads,
            ctx.config.provisioning.clear_leads_delay(),
            ctrl_c(),
            out,
        )
        .await
        .map(drop),
        Command::Counts => counts(&ctx.repository, out).await,
        Command::Migrate => migrate(&ctx.pools, out).await,
        Command::BackfillProfiles {
            per_page,
            fail_fast,
        } => {
            let directory = SupabaseDirectory::new(ctx.supabase.service()?);
            let policy = SeedPolicy {
                fail_fast: fail_fast || configured_policy.fail_fast,
            };
            backfill(&directory, &ctx.repository, per_page, policy, out)
                .await
                .map(drop)
        }
        Command::Check => check(ctx, out).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnhub_data::{AppTable, MockRepository};

    fn output(buffer: Vec<u8>) -> String {
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_named_tables_follow_creation_order() {
        let args = ProvisionArgs {
            tables: vec![AppTable::UserRoles, AppTable::Roles, AppTable::UserRoles],
            all: false,
            file: Vec::new(),
        };
        let definitions = provision_definitions(&args).unwrap();
        let names: Vec<&str> = definitions.iter().map(|d| d.name.as_ref()).collect();
        assert_eq!(names, ["base", "roles", "user_roles"]);
    }

    #[tokio::test]
    async fn test_file_definitions_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit_log.sql");
        std::fs::write(
            &path,
            "CREATE TABLE IF NOT EXISTS app.audit_log (id bigserial PRIMARY KEY);",
        )
        .unwrap();

        let args = ProvisionArgs {
            tables: Vec::new(),
            all: false,
            file: vec![path],
        };
        let definitions = provision_definitions(&args).unwrap();
        assert_eq!(definitions.len(), 1);

        let repo = MockRepository::new();
        provision(&repo, &definitions, &mut Vec::new()).await.unwrap();
        assert!(repo.relation_exists_sync("app.audit_log"));
    }

    #[tokio::test]
    async fn test_provision_rerun_reports_skips() {
        let repo = MockRepository::new();
        let definitions = vec![SchemaDefinition::base(), AppTable::Courses.definition()];

        provision(&repo, &definitions, &mut Vec::new()).await.unwrap();
        let mut out = Vec::new();
        provision(&repo, &definitions, &mut out).await.unwrap();

        let text = output(out);
        assert!(text.contains("courses: already exists, skipped"), "{text}");
    }

    #[tokio::test]
    async fn test_seed_failure_is_an_error() {
        let repo = MockRepository::new();
        repo.fail_upsert_for("learner");

        let mut out = Vec::new();
        let err = seed(&repo, SeedTarget::Roles, SeedPolicy::default(), &mut out)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("app.roles"), "{err}");
        assert!(output(out).contains("1 failed"));
        assert_eq!(repo.row_count(AppTable::Roles), role_catalog().len() - 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_period_elapses() {
        assert!(grace_period(Duration::from_secs(5), std::future::pending()).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_period_cancelled() {
        let cancel = tokio::time::sleep(Duration::from_secs(1));
        assert!(!grace_period(Duration::from_secs(5), cancel).await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_lead_cleanup_deletes_nothing() {
        let repo = MockRepository::new();
        repo.set_row_count(AppTable::Users, 2);
        repo.set_row_count(AppTable::DemoRequests, 7);

        let mut out = Vec::new();
        let err = clear_all_users(&repo, true, Duration::from_secs(5), async {}, &mut out)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("cancelled"));
        assert!(output(out).contains("Press Ctrl-C to cancel"));
        assert_eq!(repo.row_count(AppTable::Users), 2);
        assert_eq!(repo.row_count(AppTable::DemoRequests), 7);
    }

    #[tokio::test]
    async fn test_user_cleanup_skips_grace_period() {
        let repo = MockRepository::new();
        repo.set_row_count(AppTable::Users, 2);
        repo.set_row_count(AppTable::DemoRequests, 7);

        let mut out = Vec::new();
        let report = clear_all_users(
            &repo,
            false,
            Duration::from_secs(3600),
            std::future::pending(),
            &mut out,
        )
        .await
        .unwrap();

        assert_eq!(report.rows_after(AppTable::Users), Some(0));
        assert_eq!(report.rows_after(AppTable::DemoRequests), Some(7));
        assert!(!output(out).contains("WARNING"));
    }

    #[tokio::test]
    async fn test_counts_lists_every_reported_table() {
        let repo = MockRepository::new();
        repo.set_row_count(AppTable::Sessions, 9);

        let mut out = Vec::new();
        counts(&repo, &mut out).await.unwrap();

        let text = output(out);
        assert_eq!(text.lines().count(), reported_tables().len());
        assert!(text.lines().any(|l| l.starts_with("app.sessions") && l.ends_with('9')));
    }

    #[tokio::test]
    async fn test_counts_mark_unprovisioned_tables() {
        let repo = MockRepository::new();
        repo.drop_table(AppTable::PartnerInquiries);

        let mut out = Vec::new();
        counts(&repo, &mut out).await.unwrap();

        let text = output(out);
        assert!(
            text.lines()
                .any(|l| l.starts_with("app.partner_inquiries") && l.ends_with('-')),
            "{text}"
        );
    }
}
