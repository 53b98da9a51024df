//! Configuration validation framework

use crate::{ConfigError, ConfigResult};
use regex::Regex;

/// Get HTTP(S) URL validation regex - returns None if regex compilation fails
fn get_http_url_regex() -> Option<&'static Regex> {
    static URL_REGEX: std::sync::OnceLock<Option<Regex>> = std::sync::OnceLock::new();
    URL_REGEX
        .get_or_init(|| Regex::new(r"^https?://[^\s/$.?#].[^\s]*$").ok())
        .as_ref()
}

/// Get Postgres URL validation regex - returns None if regex compilation fails
fn get_postgres_url_regex() -> Option<&'static Regex> {
    static PG_REGEX: std::sync::OnceLock<Option<Regex>> = std::sync::OnceLock::new();
    PG_REGEX
        .get_or_init(|| Regex::new(r"^postgres(ql)?://[^\s]+$").ok())
        .as_ref()
}

/// Trait for validating configuration values
pub trait Validate {
    /// Validate this configuration object
    ///
    /// # Errors
    /// Returns validation errors if the configuration is invalid
    fn validate(&self) -> ConfigResult<()>;
}

fn match_or_prefix(
    regex: Option<&Regex>,
    value: &str,
    prefixes: &[&str],
    field_name: &str,
) -> ConfigResult<()> {
    let ok = regex.map_or_else(
        || prefixes.iter().any(|p| value.starts_with(p)),
        |re| re.is_match(value),
    );
    if ok {
        Ok(())
    } else {
        Err(ConfigError::InvalidUrl {
            field: field_name.to_string(),
            url: value.to_string(),
        })
    }
}

/// Validate an HTTP(S) URL string
///
/// # Errors
/// Returns `ConfigError::InvalidUrl` if the URL format is invalid
pub fn validate_http_url(url: &str, field_name: &str) -> ConfigResult<()> {
    match_or_prefix(
        get_http_url_regex(),
        url,
        &["http://", "https://"],
        field_name,
    )
}

/// Validate a Postgres connection URL
///
/// Only the scheme and absence of whitespace are checked; the password is
/// never echoed back in the error.
///
/// # Errors
/// Returns `ConfigError::InvalidUrl` if the URL does not use a postgres scheme
pub fn validate_postgres_url(url: &str, field_name: &str) -> ConfigResult<()> {
    match_or_prefix(
        get_postgres_url_regex(),
        url,
        &["postgres://", "postgresql://"],
        field_name,
    )
    .map_err(|_| ConfigError::InvalidUrl {
        field: field_name.to_string(),
        url: "<redacted>".to_string(),
    })
}

/// Validate a value is within a range
///
/// # Errors
/// Returns `ConfigError::OutOfRange` if value is outside the specified range
pub fn validate_range(value: u64, min: u64, max: u64, field_name: &str) -> ConfigResult<()> {
    if value < min || value > max {
        Err(ConfigError::OutOfRange {
            field: field_name.to_string(),
            value,
            min,
            max,
        })
    } else {
        Ok(())
    }
}

/// Validate a string is not empty
///
/// # Errors
/// Returns `ConfigError::MissingField` if the string is empty or whitespace-only
pub fn validate_non_empty(value: &str, field_name: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        Err(ConfigError::MissingField {
            field: field_name.to_string(),
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_url_validation() {
        assert!(validate_http_url("https://abc.supabase.co", "url").is_ok());
        assert!(validate_http_url("ftp://abc", "url").is_err());
    }

    #[test]
    fn test_postgres_url_error_is_redacted() {
        let err = validate_postgres_url("mysql://u:hunter2@h/db", "DATABASE_URL").unwrap_err();
        assert!(!err.to_string().contains("hunter2"));
        assert!(validate_postgres_url("postgresql://u:p@h:5432/db", "DATABASE_URL").is_ok());
    }

    #[test]
    fn test_range_validation() {
        assert!(validate_range(5, 1, 100, "max_connections").is_ok());
        assert!(validate_range(0, 1, 100, "max_connections").is_err());
    }
}
