//! Outbound authentication strategies
//!
//! The search and completion clients are written once and take an
//! [`AuthStrategy`] that decorates each request: either a static API key
//! or a bearer token obtained from the credential broker.

use crate::error::Result;
use crate::identity::TokenCredential;
use crate::network::OutboundRequest;
use async_trait::async_trait;
use std::sync::Arc;

/// Decorates an outbound request with credentials
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Attach credentials to `request`
    async fn authorize(&self, request: OutboundRequest) -> Result<OutboundRequest>;
}

/// Sends a static key in a header (`api-key` by default)
pub struct ApiKeyAuth {
    header: String,
    key: String,
}

impl ApiKeyAuth {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            header: "api-key".to_string(),
            key: key.into(),
        }
    }

    /// Use a different header name
    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }
}

#[async_trait]
impl AuthStrategy for ApiKeyAuth {
    fn name(&self) -> &'static str {
        "api_key"
    }

    async fn authorize(&self, request: OutboundRequest) -> Result<OutboundRequest> {
        Ok(request.header(self.header.as_str(), self.key.as_str()))
    }
}

/// Sends `Authorization: Bearer <token>` for a fixed scope
pub struct BearerTokenAuth {
    credential: Arc<dyn TokenCredential>,
    scope: String,
}

impl BearerTokenAuth {
    pub fn new(credential: Arc<dyn TokenCredential>, scope: impl Into<String>) -> Self {
        Self {
            credential,
            scope: scope.into(),
        }
    }
}

#[async_trait]
impl AuthStrategy for BearerTokenAuth {
    fn name(&self) -> &'static str {
        "bearer"
    }

    async fn authorize(&self, request: OutboundRequest) -> Result<OutboundRequest> {
        let token = self.credential.get_token(&self.scope).await?;
        Ok(request.header("Authorization", format!("Bearer {}", token.token)))
    }
}
