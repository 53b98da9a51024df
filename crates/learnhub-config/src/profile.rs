//! Runtime profile derived from `NODE_ENV`

/// Deployment posture of the current process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
pub enum Profile {
    /// Local development - default when `NODE_ENV` is unset or unknown
    #[serde(rename = "development")]
    #[default]
    Development,

    /// Automated test runs
    #[serde(rename = "test")]
    Test,

    /// Production posture - insecure TLS shortcuts are refused
    #[serde(rename = "production")]
    Production,
}

impl Profile {
    /// Resolve the profile from an optional `NODE_ENV` value
    pub fn from_node_env(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    pub const fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Development => "development",
            Self::Test => "test",
            Self::Production => "production",
        };
        write!(f, "{name}")
    }
}

impl std::str::FromStr for Profile {
    type Err = crate::ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            _ => Err(crate::ConfigError::InvalidValue {
                field: "NODE_ENV".to_string(),
                value: s.to_string(),
                expected: "development, test, production".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_parsing() {
        assert_eq!(Profile::from_node_env(Some("production")), Profile::Production);
        assert_eq!(Profile::from_node_env(Some("PROD")), Profile::Production);
        assert_eq!(Profile::from_node_env(Some("test")), Profile::Test);
        assert_eq!(Profile::from_node_env(Some("staging")), Profile::Development);
        assert_eq!(Profile::from_node_env(None), Profile::Development);
    }
}
