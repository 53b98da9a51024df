//! Wire types returned by the Auth admin API

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One user from `GET /auth/v1/admin/users`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    fn metadata_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|key| self.user_metadata.get(*key))
            .filter_map(Value::as_str)
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string)
    }

    /// Display name from `full_name`, falling back to `name`
    pub fn full_name(&self) -> Option<String> {
        self.metadata_str(&["full_name", "name"])
    }

    /// Avatar from `avatar_url`, falling back to `picture`
    pub fn avatar_url(&self) -> Option<String> {
        self.metadata_str(&["avatar_url", "picture"])
    }
}

/// Envelope of one user page
#[derive(Debug, Deserialize)]
pub(crate) struct UserPage {
    #[serde(default)]
    pub users: Vec<AuthUser>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_metadata_fallbacks() {
        let user: AuthUser = serde_json::from_value(json!({
            "id": "0b7c6c52-4a3e-4c1f-9a57-9d1f0b2f8c11",
            "email": "ada@example.com",
            "user_metadata": { "name": "Ada Lovelace", "picture": "https://img/ada.png" },
            "created_at": "2024-03-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(user.full_name().as_deref(), Some("Ada Lovelace"));
        assert_eq!(user.avatar_url().as_deref(), Some("https://img/ada.png"));
        assert!(user.created_at.is_some());
    }

    #[test]
    fn test_blank_metadata_is_ignored() {
        let user: AuthUser = serde_json::from_value(json!({
            "id": "0b7c6c52-4a3e-4c1f-9a57-9d1f0b2f8c11",
            "user_metadata": { "full_name": "  ", "name": "Grace" }
        }))
        .unwrap();

        assert_eq!(user.full_name().as_deref(), Some("Grace"));
        assert_eq!(user.avatar_url(), None);
        assert_eq!(user.email, None);
    }
}
