//! Command-line surface of `learnhub-admin`

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use learnhub_data::AppTable;

/// Maintenance commands for the learnhub database
#[derive(Parser, Debug)]
#[command(name = "learnhub-admin", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create tables, indexes and triggers; existing objects are skipped
    Provision(ProvisionArgs),

    /// Upsert reference rows on their natural keys
    Seed(SeedArgs),

    /// Delete every user row (and optionally every lead row)
    ClearAllUsers {
        /// Also clear the lead-capture tables, after a short grace period
        #[arg(long)]
        clear_leads: bool,
    },

    /// Print row counts for user and lead tables
    Counts,

    /// Apply pending migrations and record them in the ledger
    Migrate,

    /// Create or refresh one profile per auth user
    BackfillProfiles {
        #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u32).range(1..=1000))]
        per_page: u32,

        /// Stop at the first profile that cannot be written
        #[arg(long)]
        fail_fast: bool,
    },

    /// Ping the configured pools and print their statistics
    Check,
}

impl Command {
    /// Subcommand name as typed on the command line
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Provision(_) => "provision",
            Self::Seed(_) => "seed",
            Self::ClearAllUsers { .. } => "clear-all-users",
            Self::Counts => "counts",
            Self::Migrate => "migrate",
            Self::BackfillProfiles { .. } => "backfill-profiles",
            Self::Check => "check",
        }
    }
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct ProvisionArgs {
    /// Tables to provision, e.g. `courses` or `app.user_roles`
    #[arg(
        value_name = "TABLE",
        required_unless_present_any = ["all", "file"],
        conflicts_with_all = ["all", "file"]
    )]
    pub tables: Vec<AppTable>,

    /// Provision the base objects and every table in creation order
    #[arg(long, conflicts_with = "file")]
    pub all: bool,

    /// Apply DDL from a file; may be repeated
    #[arg(long, value_name = "PATH")]
    pub file: Vec<PathBuf>,
}

#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct SeedArgs {
    #[arg(value_enum)]
    pub target: SeedTarget,

    /// Stop at the first record that cannot be written
    #[arg(long)]
    pub fail_fast: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedTarget {
    Courses,
    Roles,
}

impl SeedTarget {
    pub const fn table(self) -> AppTable {
        match self {
            Self::Courses => AppTable::Courses,
            Self::Roles => AppTable::Roles,
        }
    }
}
