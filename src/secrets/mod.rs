//! Secret resolution
//!
//! Configuration values of the form `{ secret: <name> }` are looked up
//! through a [`SecretProvider`] once, at startup.

use crate::auth::AuthStrategy;
use crate::config::ConfigValue;
use crate::error::{GatewayError, Result};
use crate::network::{HttpClient, OutboundRequest};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Resolves named secrets to their values
#[async_trait]
pub trait SecretProvider: Send + Sync {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Fetch the current value of secret `name`
    async fn get_secret(&self, name: &str) -> Result<String>;
}

/// Resolve a config value, fetching it from `provider` when it names a secret
pub async fn resolve(value: &ConfigValue, provider: &dyn SecretProvider) -> Result<String> {
    match value {
        ConfigValue::Plain(value) => Ok(value.clone()),
        ConfigValue::Secret { secret } => {
            debug!("Resolving secret '{}' via {}", secret, provider.name());
            provider.get_secret(secret).await
        }
    }
}

/// Resolve an optional config value
pub async fn resolve_opt(
    value: Option<&ConfigValue>,
    provider: &dyn SecretProvider,
) -> Result<Option<String>> {
    match value {
        Some(value) => resolve(value, provider).await.map(Some),
        None => Ok(None),
    }
}

/// Secrets stored in a key vault, read over its REST API
pub struct KeyVaultSecrets {
    client: HttpClient,
    vault_url: String,
    api_version: String,
    auth: Arc<dyn AuthStrategy>,
}

#[derive(Debug, Deserialize)]
struct SecretBundle {
    value: String,
}

impl KeyVaultSecrets {
    pub fn new(
        client: HttpClient,
        vault_url: impl Into<String>,
        api_version: impl Into<String>,
        auth: Arc<dyn AuthStrategy>,
    ) -> Self {
        Self {
            client,
            vault_url: vault_url.into(),
            api_version: api_version.into(),
            auth,
        }
    }
}

#[async_trait]
impl SecretProvider for KeyVaultSecrets {
    fn name(&self) -> &'static str {
        "key_vault"
    }

    async fn get_secret(&self, name: &str) -> Result<String> {
        let url = format!(
            "{}/secrets/{}",
            self.vault_url.trim_end_matches('/'),
            urlencoding::encode(name)
        );
        let request = OutboundRequest::get("key vault", url).param("api-version", &self.api_version);
        let request = self.auth.authorize(request).await?;

        let response = self.client.execute(request).await?;
        if response.status == 404 {
            return Err(GatewayError::Unexpected(anyhow::anyhow!(
                "secret '{}' does not exist in the vault",
                name
            )));
        }

        let bundle: SecretBundle = response.error_for_status()?.json()?;
        Ok(bundle.value)
    }
}

/// Secrets read from environment variables.
///
/// Secret `search-api-key` is read from `SEARCH_API_KEY`.
#[derive(Debug, Default)]
pub struct EnvSecrets;

impl EnvSecrets {
    pub fn var_name(secret: &str) -> String {
        secret
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
            .collect()
    }
}

#[async_trait]
impl SecretProvider for EnvSecrets {
    fn name(&self) -> &'static str {
        "env"
    }

    async fn get_secret(&self, name: &str) -> Result<String> {
        let var = Self::var_name(name);
        std::env::var(&var).map_err(|_| {
            GatewayError::Unexpected(anyhow::anyhow!(
                "secret '{}' not found (expected environment variable {})",
                name,
                var
            ))
        })
    }
}

/// Fixed in-memory secrets
#[derive(Debug, Default, Clone)]
pub struct StaticSecrets {
    secrets: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.secrets.insert(name.into(), value.into());
        self
    }
}

#[async_trait]
impl SecretProvider for StaticSecrets {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn get_secret(&self, name: &str) -> Result<String> {
        self.secrets.get(name).cloned().ok_or_else(|| {
            GatewayError::Unexpected(anyhow::anyhow!("secret '{}' not found", name))
        })
    }
}
