//! TLS policy for Postgres connection strings
//!
//! Remote hosts always get TLS. Loopback hosts do not. Certificate
//! verification stays on unless the configuration explicitly relaxes it.

use std::borrow::Cow;
use std::net::{Ipv4Addr, Ipv6Addr};

use sqlx::postgres::PgSslMode;
use url::{Host, Url};

/// Mask the password of a connection string for logs
pub use learnhub_config::redact_connection_url as redact_url;

/// Whether a connection string points at a host that needs TLS
///
/// Only `localhost`, `127.0.0.1` and `::1` are exempt. Unparseable strings and
/// strings without a host are treated as remote.
pub fn requires_tls(connection_string: &str) -> bool {
    let Ok(parsed) = Url::parse(connection_string) else {
        return true;
    };

    match parsed.host() {
        Some(Host::Domain(name)) => !is_loopback_name(name),
        Some(Host::Ipv4(addr)) => addr != Ipv4Addr::LOCALHOST,
        Some(Host::Ipv6(addr)) => addr != Ipv6Addr::LOCALHOST,
        None => true,
    }
}

// `postgres://` is not a special scheme for the url crate, so IPv4 literals
// come back as domains.
fn is_loopback_name(name: &str) -> bool {
    name.eq_ignore_ascii_case("localhost") || name == "127.0.0.1" || name == "[::1]"
}

/// Whether the connection string already carries an `sslmode` parameter
pub fn has_explicit_sslmode(connection_string: &str) -> bool {
    Url::parse(connection_string).map_or_else(
        |_| connection_string.to_ascii_lowercase().contains("sslmode="),
        |parsed| {
            parsed
                .query_pairs()
                .any(|(key, _)| key.eq_ignore_ascii_case("sslmode"))
        },
    )
}

/// Append `sslmode=require` when TLS is needed and no mode is present
///
/// Strings that already have an `sslmode` parameter, or that do not need TLS,
/// come back unchanged.
pub fn normalize_connection_string(connection_string: &str, requires_tls: bool) -> Cow<'_, str> {
    if !requires_tls || has_explicit_sslmode(connection_string) {
        return Cow::Borrowed(connection_string);
    }

    let separator = if connection_string.ends_with('?') || connection_string.ends_with('&') {
        ""
    } else if connection_string.contains('?') {
        "&"
    } else {
        "?"
    };

    Cow::Owned(format!("{connection_string}{separator}sslmode=require"))
}

/// Resolved TLS behaviour for one connection string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlsPolicy {
    pub requires_tls: bool,
    /// The string names an `sslmode` itself; it is left alone
    pub explicit_mode: bool,
    pub verify_certificates: bool,
}

impl TlsPolicy {
    pub fn resolve(connection_string: &str, relax_verification: bool) -> Self {
        Self {
            requires_tls: requires_tls(connection_string),
            explicit_mode: has_explicit_sslmode(connection_string),
            verify_certificates: !relax_verification,
        }
    }

    /// SSL mode to force on the connect options, `None` to keep the string's own
    pub const fn ssl_mode(&self) -> Option<PgSslMode> {
        if self.explicit_mode {
            None
        } else if self.requires_tls {
            if self.verify_certificates {
                Some(PgSslMode::VerifyFull)
            } else {
                Some(PgSslMode::Require)
            }
        } else {
            Some(PgSslMode::Disable)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loopback_hosts_skip_tls() {
        assert!(!requires_tls("postgres://u:p@localhost:5432/db"));
        assert!(!requires_tls("postgres://u:p@LOCALHOST/db"));
        assert!(!requires_tls("postgres://u:p@127.0.0.1:5432/db"));
        assert!(!requires_tls("postgres://u:p@[::1]:5432/db"));
    }

    #[test]
    fn test_remote_and_malformed_hosts_need_tls() {
        assert!(requires_tls(
            "postgres://u:p@aws-0-us-east-1.pooler.supabase.com:6543/postgres"
        ));
        assert!(requires_tls("postgres://u:p@127.0.0.2/db"));
        assert!(requires_tls("not a url"));
        assert!(requires_tls("postgres:///db"));
    }

    #[test]
    fn test_normalize_appends_query() {
        let out = normalize_connection_string("postgres://u:p@db.example.com/postgres", true);
        assert_eq!(out, "postgres://u:p@db.example.com/postgres?sslmode=require");
    }

    #[test]
    fn test_normalize_extends_existing_query() {
        let out = normalize_connection_string(
            "postgres://u:p@db.example.com/postgres?pgbouncer=true",
            true,
        );
        assert_eq!(
            out,
            "postgres://u:p@db.example.com/postgres?pgbouncer=true&sslmode=require"
        );
    }

    #[test]
    fn test_normalize_keeps_explicit_mode() {
        let url = "postgres://u:p@db.example.com/postgres?sslmode=disable";
        let out = normalize_connection_string(url, true);
        assert!(matches!(out, Cow::Borrowed(_)));
        assert_eq!(out.matches("sslmode").count(), 1);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let once = normalize_connection_string("postgres://u:p@db.example.com/db", true).into_owned();
        let twice = normalize_connection_string(&once, true);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_leaves_local_untouched() {
        let url = "postgres://u:p@localhost/db";
        assert_eq!(normalize_connection_string(url, false), url);
    }

    #[test]
    fn test_policy_modes() {
        let remote = "postgres://u:p@db.example.com/db";
        assert!(matches!(
            TlsPolicy::resolve(remote, false).ssl_mode(),
            Some(PgSslMode::VerifyFull)
        ));
        assert!(matches!(
            TlsPolicy::resolve(remote, true).ssl_mode(),
            Some(PgSslMode::Require)
        ));
        assert!(matches!(
            TlsPolicy::resolve("postgres://u:p@localhost/db", false).ssl_mode(),
            Some(PgSslMode::Disable)
        ));
        assert!(
            TlsPolicy::resolve("postgres://u:p@db.example.com/db?sslmode=prefer", false)
                .ssl_mode()
                .is_none()
        );
    }
}
