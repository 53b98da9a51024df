//! Configuration loading and service wiring for one admin run

use std::sync::Arc;

use anyhow::Context as _;
use learnhub_config::ApplicationConfig;
use learnhub_config::validation::Validate;
use learnhub_data::{DbRepository, PoolManager};
use learnhub_supabase::SupabaseClients;
use tracing::info;

/// Everything a subcommand may need
///
/// Pools and clients are lazy: a command that never touches Supabase never
/// needs its keys, and no connection is opened until the first query.
pub struct AdminContext {
    pub config: ApplicationConfig,
    pub pools: Arc<PoolManager>,
    pub repository: DbRepository,
    pub supabase: SupabaseClients,
}

impl AdminContext {
    /// Validate `config` and wire the lazy pools and clients
    ///
    /// # Errors
    ///
    /// Returns the first validation failure
    pub fn new(config: ApplicationConfig) -> anyhow::Result<Self> {
        config.validate().context("Invalid configuration")?;
        info!(
            profile = %config.profile,
            database = %config.database.safe_connection_string(),
            direct = config.database.direct_url.is_some(),
            "Configuration loaded"
        );

        let pools = Arc::new(PoolManager::new(config.database.clone()));
        let repository = DbRepository::new(Arc::clone(&pools));
        let supabase = SupabaseClients::new(config.supabase.clone());

        Ok(Self {
            config,
            pools,
            repository,
            supabase,
        })
    }

    /// Close every pool that was opened
    pub async fn shutdown(&self) {
        self.pools.close().await;
    }
}
