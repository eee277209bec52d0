//! Cosmos DB REST client for single-document operations

use super::{validate_document, validate_id, DocumentStore};
use crate::error::{GatewayError, Result};
use crate::identity::TokenCredential;
use crate::network::{HttpClient, OutboundRequest};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const API_VERSION: &str = "2018-12-31";

/// How requests to the account are signed
pub enum CosmosAuth {
    /// Entra ID token for `{endpoint}/.default`
    Aad(Arc<dyn TokenCredential>),
    /// Base64 account master key
    MasterKey(String),
}

/// One container of a Cosmos DB account
pub struct CosmosStore {
    client: HttpClient,
    endpoint: String,
    database: String,
    container: String,
    partition_key_path: String,
    auth: CosmosAuth,
    timeout: Option<Duration>,
}

impl CosmosStore {
    pub fn new(
        client: HttpClient,
        endpoint: impl Into<String>,
        database: impl Into<String>,
        container: impl Into<String>,
        auth: CosmosAuth,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            database: database.into(),
            container: container.into(),
            partition_key_path: "/category".to_string(),
            auth,
            timeout: None,
        }
    }

    pub fn with_partition_key_path(mut self, path: impl Into<String>) -> Self {
        self.partition_key_path = path.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn collection_link(&self) -> String {
        format!("dbs/{}/colls/{}", self.database, self.container)
    }

    /// Value of the `authorization` header for one request
    async fn authorization(
        &self,
        verb: &str,
        resource_type: &str,
        resource_link: &str,
        date: &str,
    ) -> Result<String> {
        let raw = match &self.auth {
            CosmosAuth::Aad(credential) => {
                let scope = format!("{}/.default", self.endpoint);
                let token = credential.get_token(&scope).await?;
                format!("type=aad&ver=1.0&sig={}", token.token)
            }
            CosmosAuth::MasterKey(key) => {
                let sig = master_key_signature(key, verb, resource_type, resource_link, date)?;
                format!("type=master&ver=1.0&sig={}", sig)
            }
        };
        Ok(urlencoding::encode(&raw).into_owned())
    }

    async fn signed(
        &self,
        request: OutboundRequest,
        verb: &str,
        resource_type: &str,
        resource_link: &str,
        partition_key: &Value,
    ) -> Result<OutboundRequest> {
        let date = rfc1123_now();
        let authorization = self
            .authorization(verb, resource_type, resource_link, &date)
            .await?;

        let mut request = request
            .header("authorization", authorization)
            .header("x-ms-date", date)
            .header("x-ms-version", API_VERSION)
            .header(
                "x-ms-documentdb-partitionkey",
                Value::Array(vec![partition_key.clone()]).to_string(),
            );
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        Ok(request)
    }
}

#[async_trait]
impl DocumentStore for CosmosStore {
    fn partition_key_name(&self) -> &str {
        self.partition_key_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.partition_key_path)
    }

    async fn upsert(&self, document: Value) -> Result<()> {
        let (id, partition_key) = validate_document(&document, &self.partition_key_path)?;
        let id = id.to_string();
        let partition_key = partition_key.clone();

        let link = self.collection_link();
        let request = OutboundRequest::post("document", format!("{}/{}/docs", self.endpoint, link))
            .header("x-ms-documentdb-is-upsert", "True")
            .json(document);
        let request = self
            .signed(request, "post", "docs", &link, &partition_key)
            .await?;

        self.client.execute(request).await?.error_for_status()?;
        info!("Upserted document {} into {}", id, link);
        Ok(())
    }

    async fn read(&self, id: &str, partition_key: &str) -> Result<Value> {
        if id.is_empty() || partition_key.is_empty() {
            return Err(GatewayError::missing(format!(
                "Missing 'id' or '{}' query parameters.",
                self.partition_key_name()
            )));
        }

        validate_id(id)?;

        // Signed over the raw link; the URL carries the id as one encoded segment
        let link = format!("{}/docs/{}", self.collection_link(), id);
        let url = format!(
            "{}/{}/docs/{}",
            self.endpoint,
            self.collection_link(),
            urlencoding::encode(id)
        );
        let request = OutboundRequest::get("document", url);
        let request = self
            .signed(
                request,
                "get",
                "docs",
                &link,
                &Value::String(partition_key.to_string()),
            )
            .await?;

        let response = self.client.execute(request).await?;
        if response.status == 404 {
            return Err(GatewayError::NotFound(format!("Document '{}' not found.", id)));
        }

        response.error_for_status()?.json()
    }
}

/// HMAC-SHA256 master key signature over the canonical request string
pub fn master_key_signature(
    key: &str,
    verb: &str,
    resource_type: &str,
    resource_link: &str,
    date: &str,
) -> Result<String> {
    let key = STANDARD.decode(key).map_err(|e| {
        GatewayError::Unexpected(anyhow::anyhow!("master key is not valid base64: {}", e))
    })?;

    let payload = format!(
        "{}\n{}\n{}\n{}\n\n",
        verb.to_lowercase(),
        resource_type.to_lowercase(),
        resource_link,
        date.to_lowercase()
    );

    let mut mac = Hmac::<Sha256>::new_from_slice(&key)
        .map_err(|e| GatewayError::Unexpected(anyhow::anyhow!("invalid master key: {}", e)))?;
    mac.update(payload.as_bytes());

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn rfc1123_now() -> String {
    Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
