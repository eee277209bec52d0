//! Managed identity flow
//!
//! Uses the App Service identity endpoint when the platform exposes one
//! (`IDENTITY_ENDPOINT` + `IDENTITY_HEADER`), otherwise the instance
//! metadata service.

use super::{scope_to_resource, TokenCredential, TokenResponse};
use crate::error::Result;
use crate::identity::AccessToken;
use crate::network::{HttpClient, OutboundRequest};
use async_trait::async_trait;

const IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

/// Where tokens are requested from
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    AppService { endpoint: String, secret: String },
    Imds { endpoint: String },
}

pub struct ManagedIdentityCredential {
    client: HttpClient,
    source: Source,
    client_id: Option<String>,
}

impl ManagedIdentityCredential {
    /// Detect the token source from the process environment
    pub fn from_env(client: HttpClient, client_id: Option<String>) -> Self {
        let source = match (
            std::env::var("IDENTITY_ENDPOINT"),
            std::env::var("IDENTITY_HEADER"),
        ) {
            (Ok(endpoint), Ok(secret)) => Source::AppService { endpoint, secret },
            _ => Source::Imds {
                endpoint: IMDS_ENDPOINT.to_string(),
            },
        };

        Self {
            client,
            source,
            client_id,
        }
    }

    /// Use the instance metadata protocol against `endpoint`
    pub fn imds(client: HttpClient, endpoint: impl Into<String>, client_id: Option<String>) -> Self {
        Self {
            client,
            source: Source::Imds {
                endpoint: endpoint.into(),
            },
            client_id,
        }
    }

    /// Use the App Service protocol against `endpoint`
    pub fn app_service(
        client: HttpClient,
        endpoint: impl Into<String>,
        secret: impl Into<String>,
        client_id: Option<String>,
    ) -> Self {
        Self {
            client,
            source: Source::AppService {
                endpoint: endpoint.into(),
                secret: secret.into(),
            },
            client_id,
        }
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &str {
        "managed_identity"
    }

    async fn get_token(&self, scope: &str) -> Result<AccessToken> {
        let resource = scope_to_resource(scope);

        let mut request = match &self.source {
            Source::AppService { endpoint, secret } => OutboundRequest::get("identity", endpoint)
                .header("X-IDENTITY-HEADER", secret)
                .param("api-version", APP_SERVICE_API_VERSION),
            Source::Imds { endpoint } => OutboundRequest::get("identity", endpoint)
                .header("Metadata", "true")
                .param("api-version", IMDS_API_VERSION),
        }
        .param("resource", resource);

        if let Some(ref client_id) = self.client_id {
            request = request.param("client_id", client_id);
        }

        let response = self.client.execute(request).await?.error_for_status()?;
        response.json::<TokenResponse>()?.into_access_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_imds_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/metadata/identity/oauth2/token"))
            .and(header("Metadata", "true"))
            .and(query_param("api-version", IMDS_API_VERSION))
            .and(query_param("resource", "https://acct.documents.azure.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "mi-token",
                "expires_on": "4102444800",
                "token_type": "Bearer"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = ManagedIdentityCredential::imds(
            HttpClient::new().unwrap(),
            format!("{}/metadata/identity/oauth2/token", server.uri()),
            None,
        );

        let token = credential
            .get_token("https://acct.documents.azure.com/.default")
            .await
            .unwrap();
        assert_eq!(token.token, "mi-token");
        assert_eq!(token.expires_at.timestamp(), 4_102_444_800);
    }

    #[tokio::test]
    async fn test_app_service_request_with_client_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("X-IDENTITY-HEADER", "platform-secret"))
            .and(query_param("api-version", APP_SERVICE_API_VERSION))
            .and(query_param("client_id", "user-assigned"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "as-token",
                "expires_on": 4102444800u64
            })))
            .expect(1)
            .mount(&server)
            .await;

        let credential = ManagedIdentityCredential::app_service(
            HttpClient::new().unwrap(),
            server.uri(),
            "platform-secret",
            Some("user-assigned".to_string()),
        );

        let token = credential.get_token("https://vault.azure.net/.default").await.unwrap();
        assert_eq!(token.token, "as-token");
    }
}
