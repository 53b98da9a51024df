//! Hosted backend clients for learnhub maintenance tooling
//!
//! [`SupabaseClients`] hands out cached anon and service-role clients.
//! [`SupabaseClient`] reads rows through the REST surface and lists Auth users
//! through the admin API.

pub mod client;
pub mod error;
pub mod models;
pub mod provider;

pub use client::{KeyRole, SupabaseClient, parse_content_range_total};
pub use error::{SupabaseError, SupabaseResult};
pub use models::AuthUser;
pub use provider::SupabaseClients;
