//! Centralized configuration management for learnhub maintenance tooling
//!
//! Configuration follows a simple hierarchy:
//! 1. Safe defaults (defined as constants)
//! 2. Environment variable overrides
//! 3. Runtime validation
//!
//! Every config struct can be built from an arbitrary lookup closure so that
//! tests never need to mutate the process environment.

pub mod error;
pub mod profile;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use profile::Profile;

use std::fmt;
use std::time::Duration;

// =============================================================================
// SAFE DEFAULTS
// =============================================================================

// Database Configuration
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_DB_IDLE_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_DB_CONNECT_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_DB_APPLICATION_NAME: &str = "learnhub-admin";

// Supabase Configuration
const DEFAULT_SUPABASE_SCHEMA: &str = "app";
const DEFAULT_SUPABASE_TIMEOUT_SECONDS: u64 = 30;

// Telemetry Configuration
const DEFAULT_LOG_LEVEL: &str = "info";

// Provisioning Configuration
const DEFAULT_SEED_FAIL_FAST: bool = false;
const DEFAULT_CLEAR_LEADS_DELAY_SECONDS: u64 = 5;

/// Environment lookup used by every `from_lookup` constructor
pub type EnvLookup<'a> = &'a dyn Fn(&str) -> Option<String>;

fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// First non-empty value among `keys`
fn first_set(lookup: EnvLookup<'_>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn parsed_or<T: std::str::FromStr>(lookup: EnvLookup<'_>, key: &str, default: T) -> T {
    lookup(key)
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Interpret an opt-in flag. Only explicit truthy values enable it.
pub fn parse_flag(value: Option<&str>) -> bool {
    value.is_some_and(|v| {
        matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

/// Mask the password component of a connection URL for logging
///
/// A raw password may contain `/`, `?`, `#` or `@`, so the userinfo is taken
/// to end at the last `@`. A query string containing `@` is masked too.
pub fn redact_connection_url(url: &str) -> String {
    let Some(scheme_end) = url.find("://") else {
        return url.to_string();
    };
    let (prefix, rest) = url.split_at(scheme_end.saturating_add(3));
    let Some((userinfo, host_and_rest)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    let Some((user, _password)) = userinfo.split_once(':') else {
        return url.to_string();
    };
    format!("{prefix}{user}:****@{host_and_rest}")
}

/// Core configuration for the maintenance tooling
#[derive(Debug, Clone)]
pub struct ApplicationConfig {
    /// Deployment posture from `NODE_ENV`
    pub profile: Profile,

    /// Postgres connectivity
    pub database: DatabaseConfig,

    /// Hosted backend (Supabase) connectivity
    pub supabase: SupabaseConfig,

    /// Logging configuration
    pub telemetry: TelemetryConfig,

    /// Seeding and cleanup behaviour
    pub provisioning: ProvisioningConfig,
}

impl ApplicationConfig {
    /// Load configuration from process environment variables with safe defaults
    pub fn from_env() -> Self {
        Self::from_lookup(&process_env)
    }

    /// Load configuration from an arbitrary key/value lookup
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Self {
        let profile = Profile::from_node_env(lookup("NODE_ENV").as_deref());
        Self {
            profile,
            database: DatabaseConfig::from_lookup(lookup, profile),
            supabase: SupabaseConfig::from_lookup(lookup),
            telemetry: TelemetryConfig::from_lookup(lookup),
            provisioning: ProvisioningConfig::from_lookup(lookup),
        }
    }
}

impl validation::Validate for ApplicationConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.database.validate()?;
        self.supabase.validate()?;
        self.telemetry.validate()?;
        self.provisioning.validate()?;
        Ok(())
    }
}

/// Postgres connection configuration
///
/// Both URLs are optional at load time: a missing `DATABASE_URL` is reported
/// by the pool accessor when a pool is first requested.
#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct DatabaseConfig {
    /// Primary connection string (`DATABASE_URL`), usually via a pooling proxy
    #[serde(skip_serializing)]
    pub url: Option<String>,

    /// Direct connection string (`DIRECT_URL`) that bypasses the proxy
    #[serde(skip_serializing)]
    pub direct_url: Option<String>,

    /// Maximum number of connections per pool
    pub max_connections: u32,

    /// Idle timeout in seconds
    pub idle_timeout_seconds: u64,

    /// Connection acquire timeout in seconds
    pub connect_timeout_seconds: u64,

    /// Reported to Postgres as `application_name`
    pub application_name: String,

    /// Skip TLS certificate verification for remote hosts.
    /// Only ever true when explicitly opted into outside production.
    pub relax_tls_verify: bool,
}

impl DatabaseConfig {
    /// Load configuration from environment variables with safe defaults
    pub fn from_env() -> Self {
        let profile = Profile::from_node_env(process_env("NODE_ENV").as_deref());
        Self::from_lookup(&process_env, profile)
    }

    /// Load configuration from an arbitrary lookup
    pub fn from_lookup(lookup: EnvLookup<'_>, profile: Profile) -> Self {
        let url = first_set(lookup, &["DATABASE_URL"]);
        let direct_url = first_set(lookup, &["DIRECT_URL"]);

        let max_connections =
            parsed_or(lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS);
        let idle_timeout_seconds = parsed_or(
            lookup,
            "DB_IDLE_TIMEOUT_SECONDS",
            DEFAULT_DB_IDLE_TIMEOUT_SECONDS,
        );
        let connect_timeout_seconds = parsed_or(
            lookup,
            "DB_CONNECT_TIMEOUT_SECONDS",
            DEFAULT_DB_CONNECT_TIMEOUT_SECONDS,
        );
        let application_name = first_set(lookup, &["DB_APPLICATION_NAME"])
            .unwrap_or_else(|| DEFAULT_DB_APPLICATION_NAME.to_string());

        let requested = parse_flag(lookup("DISABLE_TLS_VERIFY").as_deref());
        let relax_tls_verify = if requested && profile.is_production() {
            tracing::warn!(
                "DISABLE_TLS_VERIFY is set but NODE_ENV=production - keeping certificate verification enabled"
            );
            false
        } else {
            if requested {
                tracing::warn!(
                    "DISABLE_TLS_VERIFY is set - database TLS certificates will NOT be verified (profile: {profile})"
                );
            }
            requested
        };

        Self {
            url,
            direct_url,
            max_connections,
            idle_timeout_seconds,
            connect_timeout_seconds,
            application_name,
            relax_tls_verify,
        }
    }

    /// Configuration with explicit URLs and default pool settings
    pub fn with_urls(url: Option<String>, direct_url: Option<String>) -> Self {
        Self {
            url,
            direct_url,
            max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            idle_timeout_seconds: DEFAULT_DB_IDLE_TIMEOUT_SECONDS,
            connect_timeout_seconds: DEFAULT_DB_CONNECT_TIMEOUT_SECONDS,
            application_name: DEFAULT_DB_APPLICATION_NAME.to_string(),
            relax_tls_verify: false,
        }
    }

    pub const fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Get connection info for logging (NO PASSWORD!)
    pub fn safe_connection_string(&self) -> String {
        self.url
            .as_deref()
            .map_or_else(|| "<DATABASE_URL unset>".to_string(), redact_connection_url)
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &self.url.as_deref().map(redact_connection_url))
            .field(
                "direct_url",
                &self.direct_url.as_deref().map(redact_connection_url),
            )
            .field("max_connections", &self.max_connections)
            .field("idle_timeout_seconds", &self.idle_timeout_seconds)
            .field("connect_timeout_seconds", &self.connect_timeout_seconds)
            .field("application_name", &self.application_name)
            .field("relax_tls_verify", &self.relax_tls_verify)
            .finish()
    }
}

impl validation::Validate for DatabaseConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(url) = &self.url {
            validation::validate_postgres_url(url, "DATABASE_URL")?;
        }
        if let Some(url) = &self.direct_url {
            validation::validate_postgres_url(url, "DIRECT_URL")?;
        }
        validation::validate_range(u64::from(self.max_connections), 1, 100, "max_connections")?;
        validation::validate_range(self.idle_timeout_seconds, 1, 3600, "idle_timeout_seconds")?;
        validation::validate_range(
            self.connect_timeout_seconds,
            1,
            3600,
            "connect_timeout_seconds",
        )?;
        validation::validate_non_empty(&self.application_name, "application_name")?;
        Ok(())
    }
}

/// Supabase project configuration
#[derive(Clone, serde::Serialize, serde::Deserialize)]
pub struct SupabaseConfig {
    /// Project URL (`SUPABASE_URL` or `NEXT_PUBLIC_SUPABASE_URL`)
    pub url: Option<String>,

    /// Public anonymous key
    #[serde(skip_serializing)]
    pub anon_key: Option<String>,

    /// Privileged server-only key
    #[serde(skip_serializing)]
    pub service_role_key: Option<String>,

    /// Disable outbound certificate verification (`ALLOW_INSECURE_TLS_OUTBOUND`)
    pub allow_insecure_tls: bool,

    /// Postgres schema exposed through the REST surface
    pub schema: String,

    /// HTTP request timeout in seconds
    pub timeout_seconds: u64,
}

impl SupabaseConfig {
    /// Load configuration from environment variables with safe defaults
    pub fn from_env() -> Self {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(lookup: EnvLookup<'_>) -> Self {
        let url = first_set(lookup, &["SUPABASE_URL", "NEXT_PUBLIC_SUPABASE_URL"])
            .map(|u| u.trim_end_matches('/').to_string());
        let anon_key = first_set(lookup, &["SUPABASE_ANON_KEY", "NEXT_PUBLIC_SUPABASE_ANON_KEY"]);
        let service_role_key = first_set(lookup, &["SUPABASE_SERVICE_ROLE_KEY"]);

        let allow_insecure_tls = parse_flag(lookup("ALLOW_INSECURE_TLS_OUTBOUND").as_deref());
        if allow_insecure_tls {
            tracing::warn!(
                "ALLOW_INSECURE_TLS_OUTBOUND is set - outbound HTTPS certificates will NOT be verified"
            );
        }

        let schema = first_set(lookup, &["SUPABASE_DB_SCHEMA"])
            .unwrap_or_else(|| DEFAULT_SUPABASE_SCHEMA.to_string());
        let timeout_seconds = parsed_or(
            lookup,
            "SUPABASE_TIMEOUT_SECONDS",
            DEFAULT_SUPABASE_TIMEOUT_SECONDS,
        );

        Self {
            url,
            anon_key,
            service_role_key,
            allow_insecure_tls,
            schema,
            timeout_seconds,
        }
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("anon_key", &self.anon_key.as_ref().map(|_| "****"))
            .field(
                "service_role_key",
                &self.service_role_key.as_ref().map(|_| "****"),
            )
            .field("allow_insecure_tls", &self.allow_insecure_tls)
            .field("schema", &self.schema)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

impl validation::Validate for SupabaseConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(url) = &self.url {
            validation::validate_http_url(url, "SUPABASE_URL")?;
        }
        validation::validate_non_empty(&self.schema, "schema")?;
        validation::validate_range(self.timeout_seconds, 1, 600, "timeout_seconds")?;
        Ok(())
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TelemetryConfig {
    /// Default level when `RUST_LOG` is unset (trace, debug, info, warn, error)
    pub log_level: String,

    /// Human-readable or JSON lines
    pub log_format: LogFormat,
}

impl TelemetryConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(&process_env)
    }

    pub fn from_lookup(lookup: EnvLookup<'_>) -> Self {
        let log_level = first_set(lookup, &["LEARNHUB_LOG_LEVEL"])
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string());
        let log_format = match lookup("LEARNHUB_LOG_FORMAT")
            .map(|s| s.trim().to_ascii_lowercase())
            .as_deref()
        {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Pretty,
        };
        Self {
            log_level,
            log_format,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogFormat::default(),
        }
    }
}

impl validation::Validate for TelemetryConfig {
    fn validate(&self) -> ConfigResult<()> {
        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(ConfigError::InvalidValue {
                field: "LEARNHUB_LOG_LEVEL".to_string(),
                value: self.log_level.clone(),
                expected: "trace, debug, info, warn, error".to_string(),
            }),
        }
    }
}

/// Seeding and cleanup behaviour
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ProvisioningConfig {
    /// Abort a seed batch at the first failing record
    pub fail_fast: bool,

    /// Grace period before lead tables are cleared
    pub clear_leads_delay_seconds: u64,
}

impl ProvisioningConfig {
    pub fn from_lookup(lookup: EnvLookup<'_>) -> Self {
        let fail_fast = lookup("SEED_FAIL_FAST")
            .map_or(DEFAULT_SEED_FAIL_FAST, |v| parse_flag(Some(&v)));
        let clear_leads_delay_seconds = parsed_or(
            lookup,
            "CLEAR_LEADS_DELAY_SECONDS",
            DEFAULT_CLEAR_LEADS_DELAY_SECONDS,
        );
        Self {
            fail_fast,
            clear_leads_delay_seconds,
        }
    }

    pub const fn clear_leads_delay(&self) -> Duration {
        Duration::from_secs(self.clear_leads_delay_seconds)
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            fail_fast: DEFAULT_SEED_FAIL_FAST,
            clear_leads_delay_seconds: DEFAULT_CLEAR_LEADS_DELAY_SECONDS,
        }
    }
}

impl validation::Validate for ProvisioningConfig {
    fn validate(&self) -> ConfigResult<()> {
        validation::validate_range(
            self.clear_leads_delay_seconds,
            0,
            300,
            "clear_leads_delay_seconds",
        )
    }
}
