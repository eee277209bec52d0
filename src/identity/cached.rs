//! Per-scope token cache in front of a credential

use super::{AccessToken, TokenCredential};
use crate::cache::TokenCache;
use crate::error::Result;
use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use tracing::debug;

/// Tokens closer than this to expiry are refreshed
const REFRESH_MARGIN_MINUTES: i64 = 5;

/// Wraps a credential and reuses its tokens until they near expiry
pub struct CachedCredential {
    inner: Arc<dyn TokenCredential>,
    cache: TokenCache,
}

impl CachedCredential {
    pub fn new(inner: Arc<dyn TokenCredential>) -> Self {
        Self {
            inner,
            cache: TokenCache::default(),
        }
    }
}

#[async_trait]
impl TokenCredential for CachedCredential {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        if let Some(token) = self.cache.get(scope).await {
            if token.expires_within(Duration::minutes(REFRESH_MARGIN_MINUTES)) {
                self.cache.remove(scope).await;
            }
        }

        self.cache
            .get_or_fetch(scope, async {
                debug!("Requesting {} token for {}", self.inner.name(), scope);
                self.inner.get_token(scope).await
            })
            .await
    }
}
