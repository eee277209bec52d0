//! OAuth2 client-credentials flow

use super::{TokenCredential, TokenResponse};
use crate::error::Result;
use crate::identity::AccessToken;
use crate::network::{HttpClient, OutboundRequest};
use async_trait::async_trait;
use std::collections::HashMap;

/// Exchanges a tenant/client id/client secret triple for tokens
pub struct ClientSecretCredential {
    client: HttpClient,
    authority_host: String,
    tenant_id: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretCredential {
    pub fn new(
        client: HttpClient,
        authority_host: impl Into<String>,
        tenant_id: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            authority_host: authority_host.into(),
            tenant_id: tenant_id.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    fn token_url(&self) -> String {
        format!(
            "{}/{}/oauth2/v2.0/token",
            self.authority_host.trim_end_matches('/'),
            self.tenant_id
        )
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    fn name(&self) -> &str {
        "client_secret"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let mut form = HashMap::new();
        form.insert("grant_type".to_string(), "client_credentials".to_string());
        form.insert("client_id".to_string(), self.client_id.clone());
        form.insert("client_secret".to_string(), self.client_secret.clone());
        form.insert("scope".to_string(), scope.to_string());

        let request = OutboundRequest::post("identity", self.token_url()).form(form);
        let response = self.client.execute(request).await?.error_for_status()?;

        response.json::<TokenResponse>()?.into_access_token()
    }
}
