//! Cached anon and service clients for one project

use std::sync::Arc;

use learnhub_config::SupabaseConfig;
use once_cell::sync::OnceCell;

use crate::client::{KeyRole, SupabaseClient};
use crate::error::SupabaseResult;

/// Hands out one shared client per key role
///
/// Both handles are built on first request. A failed build is not cached, so
/// fixing the environment and asking again succeeds.
pub struct SupabaseClients {
    config: SupabaseConfig,
    anon: OnceCell<Arc<SupabaseClient>>,
    service: OnceCell<Arc<SupabaseClient>>,
}

impl SupabaseClients {
    pub const fn new(config: SupabaseConfig) -> Self {
        Self {
            config,
            anon: OnceCell::new(),
            service: OnceCell::new(),
        }
    }

    pub const fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    /// Client using the public anonymous key
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the URL or anon key is unset
    pub fn anon(&self) -> SupabaseResult<Arc<SupabaseClient>> {
        self.get(KeyRole::Anon)
    }

    /// Client using the service-role key
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the URL or service-role key is unset
    pub fn service(&self) -> SupabaseResult<Arc<SupabaseClient>> {
        self.get(KeyRole::Service)
    }

    /// Client for `role`
    ///
    /// # Errors
    ///
    /// See [`Self::anon`] and [`Self::service`]
    pub fn get(&self, role: KeyRole) -> SupabaseResult<Arc<SupabaseClient>> {
        let cell = match role {
            KeyRole::Anon => &self.anon,
            KeyRole::Service => &self.service,
        };
        cell.get_or_try_init(|| SupabaseClient::new(&self.config, role).map(Arc::new))
            .map(Arc::clone)
    }

    pub fn is_cached(&self, role: KeyRole) -> bool {
        match role {
            KeyRole::Anon => self.anon.get().is_some(),
            KeyRole::Service => self.service.get().is_some(),
        }
    }

    /// Drop both cached clients; the next request builds fresh ones
    pub fn invalidate(&mut self) {
        self.anon.take();
        self.service.take();
        tracing::debug!("Invalidated cached Supabase clients");
    }
}
