//! Error types for the Supabase client layer

use thiserror::Error;

/// Result type alias for Supabase operations
pub type SupabaseResult<T> = Result<T, SupabaseError>;

/// Errors raised while building clients or talking to the project API
#[derive(Error, Debug)]
pub enum SupabaseError {
    #[error("Supabase configuration error: {message}")]
    Configuration { message: String },

    #[error("{operation} requires the service-role client")]
    ServiceRoleRequired { operation: &'static str },

    #[error("Invalid table name '{table}'")]
    InvalidTable { table: String },

    #[error("HTTP request failed during {operation}: {source}")]
    Http {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Supabase API error during {operation} (status {status}): {message}")]
    Api {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("Failed to decode response for {operation}: {message}")]
    Decode { operation: String, message: String },
}

impl SupabaseError {
    /// Configuration error naming the unset variable
    pub fn missing_env(var: &str) -> Self {
        Self::Configuration {
            message: format!("{var} is not set"),
        }
    }

    pub(crate) fn http(operation: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Http {
            operation: operation.into(),
            source,
        }
    }

    /// HTTP status of an API error
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_env_names_variable() {
        let err = SupabaseError::missing_env("SUPABASE_URL");
        assert_eq!(
            err.to_string(),
            "Supabase configuration error: SUPABASE_URL is not set"
        );
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_api_error_display() {
        let err = SupabaseError::Api {
            operation: "select app.courses".to_string(),
            status: 401,
            message: "Invalid API key".to_string(),
        };
        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("Invalid API key"));
    }
}
