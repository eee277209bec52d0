//! Caching module
//!
//! Holds access tokens between requests so every call does not go back to
//! the identity provider.

use crate::error::{GatewayError, Result};
use crate::identity::AccessToken;
use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Cache for access tokens, keyed by scope
#[derive(Clone)]
pub struct TokenCache {
    cache: Cache<String, AccessToken>,
}

impl TokenCache {
    /// Create a new token cache.
    ///
    /// `ttl_seconds` is an upper bound only; callers still check the
    /// token's own expiry.
    pub fn new(ttl_seconds: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .time_to_live(Duration::from_secs(ttl_seconds))
            .max_capacity(max_capacity)
            .build();

        Self { cache }
    }

    /// Get a cached token
    pub async fn get(&self, scope: &str) -> Option<AccessToken> {
        self.cache.get(scope).await
    }

    /// Return the cached token or run `fetch` to obtain one.
    ///
    /// Concurrent callers missing on the same scope share a single fetch.
    pub async fn get_or_fetch<F>(&self, scope: &str, fetch: F) -> Result<AccessToken>
    where
        F: Future<Output = Result<AccessToken>>,
    {
        self.cache
            .try_get_with(scope.to_string(), fetch)
            .await
            .map_err(|e: Arc<GatewayError>| {
                Arc::try_unwrap(e).unwrap_or_else(|shared| {
                    GatewayError::Unexpected(anyhow::anyhow!("{}", shared))
                })
            })
    }

    /// Drop a cached token
    pub async fn remove(&self, scope: &str) {
        self.cache.remove(scope).await;
    }
}

impl Default for TokenCache {
    fn default() -> Self {
        Self::new(24 * 3600, 100) // tokens live at most a day; few scopes
    }
}
