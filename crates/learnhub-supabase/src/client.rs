//! Stateless HTTP client for one Supabase project key
//!
//! Each request carries the key as both `apikey` and bearer token. No session
//! is stored and no token is refreshed.

use std::fmt;

use learnhub_config::SupabaseConfig;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_RANGE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use serde_json::Value;
use url::Url;

use crate::error::{SupabaseError, SupabaseResult};
use crate::models::{AuthUser, UserPage};

const ACCEPT_PROFILE: &str = "accept-profile";
const PREFER: &str = "prefer";
const APIKEY: &str = "apikey";

/// Which project key a client authenticates with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyRole {
    /// Public key, subject to row-level security
    Anon,
    /// Privileged server-only key
    Service,
}

impl KeyRole {
    pub const fn env_var(self) -> &'static str {
        match self {
            Self::Anon => "SUPABASE_ANON_KEY",
            Self::Service => "SUPABASE_SERVICE_ROLE_KEY",
        }
    }
}

impl fmt::Display for KeyRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Anon => write!(f, "anon"),
            Self::Service => write!(f, "service"),
        }
    }
}

/// Client bound to one project URL and key
#[derive(Debug, Clone)]
pub struct SupabaseClient {
    http: Client,
    base_url: Url,
    schema: String,
    role: KeyRole,
}

impl SupabaseClient {
    /// Build a client for `role` from the project configuration
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if the URL or the role's key is missing or
    /// malformed, or `Http` if the HTTP client cannot be built
    pub fn new(config: &SupabaseConfig, role: KeyRole) -> SupabaseResult<Self> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| SupabaseError::missing_env("SUPABASE_URL"))?;
        let key = match role {
            KeyRole::Anon => config.anon_key.as_deref(),
            KeyRole::Service => config.service_role_key.as_deref(),
        }
        .ok_or_else(|| SupabaseError::missing_env(role.env_var()))?;

        let base_url = Url::parse(&format!("{}/", url.trim_end_matches('/'))).map_err(|e| {
            SupabaseError::Configuration {
                message: format!("SUPABASE_URL is not a valid URL: {e}"),
            }
        })?;

        let mut builder = Client::builder()
            .default_headers(auth_headers(key, role)?)
            .timeout(config.timeout())
            .user_agent(concat!("learnhub-admin/", env!("CARGO_PKG_VERSION")));

        if config.allow_insecure_tls {
            tracing::warn!(
                role = %role,
                "Outbound TLS certificate verification is disabled for the Supabase client"
            );
            builder = builder.danger_accept_invalid_certs(true);
        }

        let http = builder
            .build()
            .map_err(|e| SupabaseError::http("build client", e))?;

        tracing::debug!(role = %role, url = %base_url, "Created Supabase client");

        Ok(Self {
            http,
            base_url,
            schema: config.schema.clone(),
            role,
        })
    }

    pub const fn role(&self) -> KeyRole {
        self.role
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> SupabaseResult<Url> {
        self.base_url
            .join(path)
            .map_err(|e| SupabaseError::Configuration {
                message: format!("cannot build endpoint {path}: {e}"),
            })
    }

    fn table_endpoint(&self, table: &str) -> SupabaseResult<Url> {
        if !is_identifier(table) {
            return Err(SupabaseError::InvalidTable {
                table: table.to_string(),
            });
        }
        self.endpoint(&format!("rest/v1/{table}"))
    }

    fn profile_header(&self) -> SupabaseResult<HeaderValue> {
        HeaderValue::from_str(&self.schema).map_err(|_| SupabaseError::Configuration {
            message: format!("schema '{}' is not a valid header value", self.schema),
        })
    }

    /// Read rows from `table` in the configured schema
    ///
    /// An empty `columns` slice selects every column.
    ///
    /// # Errors
    ///
    /// Returns `InvalidTable`, `Http`, `Api` or `Decode` failures
    pub async fn select_rows(
        &self,
        table: &str,
        columns: &[&str],
        limit: Option<usize>,
    ) -> SupabaseResult<Vec<Value>> {
        let operation = format!("select {}.{table}", self.schema);
        let mut url = self.table_endpoint(table)?;
        {
            let mut query = url.query_pairs_mut();
            if columns.is_empty() {
                query.append_pair("select", "*");
            } else {
                query.append_pair("select", &columns.join(","));
            }
            if let Some(limit) = limit {
                query.append_pair("limit", &limit.to_string());
            }
        }

        let response = self
            .http
            .get(url)
            .header(ACCEPT, "application/json")
            .header(ACCEPT_PROFILE, self.profile_header()?)
            .send()
            .await
            .map_err(|e| SupabaseError::http(operation.as_str(), e))?;

        let response = check_status(&operation, response).await?;
        response
            .json::<Vec<Value>>()
            .await
            .map_err(|e| SupabaseError::Decode {
                operation,
                message: e.to_string(),
            })
    }

    /// Exact row count of `table`
    ///
    /// # Errors
    ///
    /// Returns `Decode` when the reply has no usable `Content-Range`, or the
    /// transport and API failures of [`Self::select_rows`]
    pub async fn count_rows(&self, table: &str) -> SupabaseResult<u64> {
        let operation = format!("count {}.{table}", self.schema);
        let mut url = self.table_endpoint(table)?;
        url.query_pairs_mut().append_pair("select", "*");

        let response = self
            .http
            .head(url)
            .header(PREFER, "count=exact")
            .header(ACCEPT_PROFILE, self.profile_header()?)
            .send()
            .await
            .map_err(|e| SupabaseError::http(operation.as_str(), e))?;

        let response = check_status(&operation, response).await?;
        let range = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        parse_content_range_total(range).ok_or_else(|| SupabaseError::Decode {
            operation,
            message: format!("unusable Content-Range '{range}'"),
        })
    }

    /// One page of Auth users, 1-based
    ///
    /// # Errors
    ///
    /// Returns `ServiceRoleRequired` on an anon client, or the transport,
    /// API and decode failures of the request
    pub async fn list_users(&self, page: u32, per_page: u32) -> SupabaseResult<Vec<AuthUser>> {
        const OPERATION: &str = "list auth users";
        if self.role != KeyRole::Service {
            return Err(SupabaseError::ServiceRoleRequired {
                operation: OPERATION,
            });
        }

        let mut url = self.endpoint("auth/v1/admin/users")?;
        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());

        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| SupabaseError::http(OPERATION, e))?;

        let body = check_status(OPERATION, response)
            .await?
            .json::<UserPage>()
            .await
            .map_err(|e| SupabaseError::Decode {
                operation: OPERATION.to_string(),
                message: e.to_string(),
            })?;

        tracing::debug!(page, per_page, users = body.users.len(), "Fetched auth users");
        Ok(body.users)
    }

    /// Check the Auth health endpoint
    ///
    /// # Errors
    ///
    /// Returns the transport or API failure
    pub async fn health(&self) -> SupabaseResult<()> {
        const OPERATION: &str = "auth health";
        let response = self
            .http
            .get(self.endpoint("auth/v1/health")?)
            .send()
            .await
            .map_err(|e| SupabaseError::http(OPERATION, e))?;
        check_status(OPERATION, response).await?;
        Ok(())
    }
}

fn auth_headers(key: &str, role: KeyRole) -> SupabaseResult<HeaderMap> {
    let invalid = || SupabaseError::Configuration {
        message: format!("{} contains characters not allowed in a header", role.env_var()),
    };

    let mut apikey = HeaderValue::from_str(key).map_err(|_| invalid())?;
    apikey.set_sensitive(true);
    let mut bearer = HeaderValue::from_str(&format!("Bearer {key}")).map_err(|_| invalid())?;
    bearer.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(HeaderName::from_static(APIKEY), apikey);
    headers.insert(AUTHORIZATION, bearer);
    Ok(headers)
}

fn is_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

/// Total after the `/` of a `Content-Range` such as `0-24/312` or `*/0`
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.parse().ok()
}

/// Turn a non-success reply into `SupabaseError::Api`
async fn check_status(operation: &str, response: Response) -> SupabaseResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(SupabaseError::Api {
        operation: operation.to_string(),
        status: status.as_u16(),
        message: api_message(&body),
    })
}

/// Human message from a PostgREST or GoTrue error body
fn api_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| {
            ["message", "msg", "error_description", "error"]
                .iter()
                .find_map(|key| json.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SupabaseConfig {
        let lookup = |key: &str| match key {
            "SUPABASE_URL" => Some("https://demo.supabase.co".to_string()),
            "SUPABASE_ANON_KEY" => Some("anon".to_string()),
            _ => None,
        };
        SupabaseConfig::from_lookup(&lookup)
    }

    #[test]
    fn test_missing_service_key_is_configuration_error() {
        let err = SupabaseClient::new(&config(), KeyRole::Service).unwrap_err();
        assert!(err.to_string().contains("SUPABASE_SERVICE_ROLE_KEY"));
    }

    #[test]
    fn test_missing_url_is_configuration_error() {
        let mut config = config();
        config.url = None;
        let err = SupabaseClient::new(&config, KeyRole::Anon).unwrap_err();
        assert!(matches!(err, SupabaseError::Configuration { .. }));
        assert!(err.to_string().contains("SUPABASE_URL"));
    }

    #[test]
    fn test_endpoints_join_under_base() {
        let client = SupabaseClient::new(&config(), KeyRole::Anon).unwrap();
        assert_eq!(
            client.table_endpoint("courses").unwrap().as_str(),
            "https://demo.supabase.co/rest/v1/courses"
        );
        assert!(matches!(
            client.table_endpoint("courses; drop"),
            Err(SupabaseError::InvalidTable { .. })
        ));
    }

    #[test]
    fn test_parse_content_range_total() {
        assert_eq!(parse_content_range_total("0-24/312"), Some(312));
        assert_eq!(parse_content_range_total("*/0"), Some(0));
        assert_eq!(parse_content_range_total("0-24/*"), None);
        assert_eq!(parse_content_range_total(""), None);
    }

    #[test]
    fn test_api_message_extraction() {
        assert_eq!(api_message(r#"{"message":"permission denied"}"#), "permission denied");
        assert_eq!(api_message(r#"{"msg":"User not allowed"}"#), "User not allowed");
        assert_eq!(api_message(" upstream timeout \n"), "upstream timeout");
    }
}
