//! Credential broker
//!
//! Bearer tokens for the managed services come from a [`TokenCredential`].
//! Two flows are provided (client secret and managed identity); both are
//! wrapped in a [`CachedCredential`] so a token is fetched once per scope
//! and reused until it nears expiry.

mod cached;
mod client_secret;
mod managed_identity;

pub use cached::CachedCredential;
pub use client_secret::ClientSecretCredential;
pub use managed_identity::ManagedIdentityCredential;

use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

/// A bearer token and its expiry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            token: token.into(),
            expires_at,
        }
    }

    /// True when the token expires within `margin` of now
    pub fn expires_within(&self, margin: Duration) -> bool {
        self.expires_at - margin <= Utc::now()
    }
}

/// Something that can exchange credentials for a scoped bearer token
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &str;

    /// Obtain a token for `scope`, e.g. `https://search.azure.com/.default`
    async fn get_token(&self, scope: &str) -> Result<AccessToken>;
}

/// Token endpoint payload shared by both flows.
///
/// The client-secret flow reports `expires_in` (seconds from now); the
/// managed identity endpoints report `expires_on` (unix seconds, usually
/// as a string).
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<serde_json::Value>,
    #[serde(default)]
    expires_on: Option<serde_json::Value>,
}

impl TokenResponse {
    fn into_access_token(self) -> Result<AccessToken> {
        let expires_at = if let Some(on) = self.expires_on.as_ref().and_then(as_i64) {
            DateTime::<Utc>::from_timestamp(on, 0)
        } else if let Some(secs) = self.expires_in.as_ref().and_then(as_i64) {
            Some(Utc::now() + Duration::seconds(secs))
        } else {
            None
        };

        let expires_at = expires_at.ok_or_else(|| GatewayError::MalformedResponse {
            service: "identity",
            reason: "token response has no usable expiry".to_string(),
        })?;

        Ok(AccessToken::new(self.access_token, expires_at))
    }
}

fn as_i64(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// `https://search.azure.com/.default` -> `https://search.azure.com`
pub(crate) fn scope_to_resource(scope: &str) -> &str {
    scope.strip_suffix("/.default").unwrap_or(scope)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_expires_in() {
        let response: TokenResponse = serde_json::from_value(serde_json::json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "abc"
        }))
        .unwrap();
        let token = response.into_access_token().unwrap();
        assert_eq!(token.token, "abc");
        assert!(!token.expires_within(Duration::minutes(5)));
    }

    #[test]
    fn test_token_response_expires_on_string() {
        let response: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "abc",
            "expires_on": "1700000000"
        }))
        .unwrap();
        let token = response.into_access_token().unwrap();
        assert_eq!(token.expires_at.timestamp(), 1_700_000_000);
        assert!(token.expires_within(Duration::zero()));
    }

    #[test]
    fn test_token_response_without_expiry() {
        let response: TokenResponse =
            serde_json::from_value(serde_json::json!({"access_token": "abc"})).unwrap();
        assert!(response.into_access_token().is_err());
    }

    #[test]
    fn test_scope_to_resource() {
        assert_eq!(
            scope_to_resource("https://vault.azure.net/.default"),
            "https://vault.azure.net"
        );
        assert_eq!(scope_to_resource("api://x"), "api://x");
    }
}
