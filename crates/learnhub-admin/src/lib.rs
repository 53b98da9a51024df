//! `learnhub-admin`: one subcommand per database maintenance task
//!
//! Provisioning, seeding, cleanup, migrations and profile backfill run
//! against the pools and clients wired up in [`bootstrap`].

pub mod bootstrap;
pub mod cli;
pub mod commands;
pub mod directory;

pub use bootstrap::AdminContext;
pub use cli::{Cli, Command};

use learnhub_config::ApplicationConfig;

/// Validate configuration, run `command`, close the pools
///
/// # Errors
///
/// Returns configuration errors and the command's failure
pub async fn run<W>(command: Command, config: ApplicationConfig, out: &mut W) -> anyhow::Result<()>
where
    W: std::io::Write + ?Sized,
{
    let ctx = AdminContext::new(config)?;
    let result = commands::dispatch(command, &ctx, out).await;
    ctx.shutdown().await;
    result
}
