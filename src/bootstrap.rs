//! Startup wiring
//!
//! Turns [`Settings`] into a ready [`AppState`]: builds the credential,
//! picks a secret provider, resolves every `{ secret: .. }` value and
//! constructs the collaborator clients. Runs once before the server binds.

use crate::auth::{ApiKeyAuth, AuthStrategy, BearerTokenAuth};
use crate::completion::CompletionClient;
use crate::config::{
    seconds, AuthKind, ConfigValue, DocumentAuthKind, DocumentSettings, IdentityKind, Settings,
};
use crate::documents::{CosmosAuth, CosmosStore, DocumentStore};
use crate::identity::{
    CachedCredential, ClientSecretCredential, ManagedIdentityCredential, TokenCredential,
};
use crate::network::HttpClient;
use crate::orchestrator::Orchestrator;
use crate::search::{SearchGateway, SearchService};
use crate::secrets::{resolve, resolve_opt, EnvSecrets, KeyVaultSecrets, SecretProvider};
use crate::web::AppState;
use anyhow::{anyhow, bail, Context, Result};
use std::sync::Arc;
use tracing::info;

/// Build the application state from settings
pub async fn build_state(settings: Settings, client: HttpClient) -> Result<AppState> {
    settings.validate()?;

    let credential = build_credential(settings.identity.kind, &settings, &client)?;
    if let Some(ref credential) = credential {
        info!("Using {} credential", credential.name());
    }

    let secrets = build_secret_provider(&settings, &client, credential.clone())?;
    info!("Resolving secrets via {}", secrets.name());

    let search = build_search(&settings, &client, secrets.as_ref(), credential.clone()).await?;
    let completion =
        build_completion(&settings, &client, secrets.as_ref(), credential.clone()).await?;

    let documents = match settings.documents {
        Some(ref documents) => Some(
            build_documents(documents, &settings, &client, secrets.as_ref(), credential)
                .await?,
        ),
        None => None,
    };

    let orchestrator = Orchestrator::new(search.clone(), completion)
        .with_system_prompt(settings.completion.system_prompt.clone())
        .with_default_top(settings.search.top)
        .with_search_context(settings.completion.include_search_context);

    Ok(AppState::new(settings, orchestrator, search, documents))
}

/// Create the token credential for `kind`, wrapped in a per-scope cache
pub fn build_credential(
    kind: IdentityKind,
    settings: &Settings,
    client: &HttpClient,
) -> Result<Option<Arc<dyn TokenCredential>>> {
    let identity = &settings.identity;

    let inner: Arc<dyn TokenCredential> = match kind {
        IdentityKind::None => return Ok(None),
        IdentityKind::ClientSecret => {
            let tenant = identity
                .tenant_id
                .clone()
                .context("identity.tenant_id is required for client_secret")?;
            let client_id = identity
                .client_id
                .clone()
                .context("identity.client_id is required for client_secret")?;
            let secret = identity
                .client_secret
                .clone()
                .context("identity.client_secret is required for client_secret")?;

            Arc::new(ClientSecretCredential::new(
                client.clone(),
                identity.authority_host.clone(),
                tenant,
                client_id,
                secret,
            ))
        }
        IdentityKind::ManagedIdentity => {
            let client_id = identity.managed_identity_client_id.clone();
            match identity.managed_identity_endpoint {
                Some(ref endpoint) => Arc::new(ManagedIdentityCredential::imds(
                    client.clone(),
                    endpoint.clone(),
                    client_id,
                )),
                None => Arc::new(ManagedIdentityCredential::from_env(client.clone(), client_id)),
            }
        }
    };

    Ok(Some(Arc::new(CachedCredential::new(inner))))
}

/// Key vault when a vault URL is configured, environment variables otherwise
fn build_secret_provider(
    settings: &Settings,
    client: &HttpClient,
    credential: Option<Arc<dyn TokenCredential>>,
) -> Result<Box<dyn SecretProvider>> {
    match settings.vault.url {
        Some(ref url) => {
            url::Url::parse(url).with_context(|| format!("invalid vault url '{}'", url))?;
            let credential =
                credential.context("a vault url is configured but no identity is set")?;
            let auth = Arc::new(BearerTokenAuth::new(credential, settings.vault.scope.clone()));
            Ok(Box::new(KeyVaultSecrets::new(
                client.clone(),
                url.clone(),
                settings.vault.api_version.clone(),
                auth,
            )))
        }
        None => Ok(Box::new(EnvSecrets)),
    }
}

/// Auth strategy for a service from its settings
async fn build_auth(
    service: &str,
    kind: AuthKind,
    api_key: Option<&ConfigValue>,
    scope: &str,
    secrets: &dyn SecretProvider,
    credential: Option<Arc<dyn TokenCredential>>,
) -> Result<Arc<dyn AuthStrategy>> {
    match kind {
        AuthKind::ApiKey => {
            let key = resolve_opt(api_key, secrets)
                .await?
                .ok_or_else(|| anyhow!("{}.api_key is required for api_key auth", service))?;
            Ok(Arc::new(ApiKeyAuth::new(key)))
        }
        AuthKind::Bearer => {
            let credential = credential
                .ok_or_else(|| anyhow!("{} uses bearer auth but no identity is set", service))?;
            Ok(Arc::new(BearerTokenAuth::new(credential, scope)))
        }
    }
}

async fn build_search(
    settings: &Settings,
    client: &HttpClient,
    secrets: &dyn SecretProvider,
    credential: Option<Arc<dyn TokenCredential>>,
) -> Result<Arc<dyn SearchService>> {
    let search = &settings.search;

    let (endpoint, service, index) = futures::try_join!(
        resolve_opt(search.endpoint.as_ref(), secrets),
        resolve_opt(search.service.as_ref(), secrets),
        resolve_opt(search.index.as_ref(), secrets),
    )
    .context("resolving search settings")?;

    let endpoint = match (endpoint, service) {
        (Some(endpoint), _) => endpoint,
        (None, Some(service)) => SearchGateway::service_endpoint(&service),
        (None, None) => bail!("search.endpoint or search.service is required"),
    };
    url::Url::parse(&endpoint).with_context(|| format!("invalid search endpoint '{}'", endpoint))?;
    let index = index.context("search.index is required")?;

    let auth = build_auth(
        "search",
        search.auth,
        search.api_key.as_ref(),
        &search.scope,
        secrets,
        credential,
    )
    .await?;

    info!("Search index {} at {} ({} auth)", index, endpoint, auth.name());

    let mut gateway = SearchGateway::new(client.clone(), endpoint, index, auth)
        .with_api_version(search.api_version.clone());
    if let Some(timeout) = search.timeout {
        gateway = gateway.with_timeout(seconds("search.timeout", timeout)?);
    }

    Ok(Arc::new(gateway))
}

async fn build_completion(
    settings: &Settings,
    client: &HttpClient,
    secrets: &dyn SecretProvider,
    credential: Option<Arc<dyn TokenCredential>>,
) -> Result<Arc<CompletionClient>> {
    let completion = &settings.completion;

    let (endpoint, deployment, api_version) = futures::try_join!(
        resolve_opt(completion.endpoint.as_ref(), secrets),
        resolve_opt(completion.deployment.as_ref(), secrets),
        resolve(&completion.api_version, secrets),
    )
    .context("resolving completion settings")?;

    let endpoint = endpoint.context("completion.endpoint is required")?;
    url::Url::parse(&endpoint)
        .with_context(|| format!("invalid completion endpoint '{}'", endpoint))?;
    let deployment = deployment.context("completion.deployment is required")?;

    let auth = build_auth(
        "completion",
        completion.auth,
        completion.api_key.as_ref(),
        &completion.scope,
        secrets,
        credential,
    )
    .await?;

    info!(
        "Completion deployment {} at {} ({} auth)",
        deployment,
        endpoint,
        auth.name()
    );

    let mut client = CompletionClient::new(client.clone(), endpoint, deployment, api_version, auth);
    if let Some(timeout) = completion.timeout {
        client = client.with_timeout(seconds("completion.timeout", timeout)?);
    }

    Ok(Arc::new(client))
}

async fn build_documents(
    documents: &DocumentSettings,
    settings: &Settings,
    client: &HttpClient,
    secrets: &dyn SecretProvider,
    credential: Option<Arc<dyn TokenCredential>>,
) -> Result<Arc<dyn DocumentStore>> {
    let endpoint = resolve_opt(documents.endpoint.as_ref(), secrets)
        .await
        .context("resolving document settings")?
        .context("documents.endpoint is required")?;
    url::Url::parse(&endpoint)
        .with_context(|| format!("invalid document endpoint '{}'", endpoint))?;

    let auth = match documents.auth {
        DocumentAuthKind::Aad => {
            let credential = match documents.identity {
                Some(kind) if kind != settings.identity.kind => {
                    build_credential(kind, settings, client)?
                }
                _ => credential,
            };
            CosmosAuth::Aad(
                credential.context("documents use aad auth but no identity is set")?,
            )
        }
        DocumentAuthKind::MasterKey => {
            let key = resolve_opt(documents.master_key.as_ref(), secrets)
                .await?
                .context("documents.master_key is required for master_key auth")?;
            CosmosAuth::MasterKey(key)
        }
    };

    info!(
        "Document store {}/{} at {}",
        documents.database, documents.container, endpoint
    );

    let mut store = CosmosStore::new(
        client.clone(),
        endpoint,
        documents.database.clone(),
        documents.container.clone(),
        auth,
    )
    .with_partition_key_path(documents.partition_key_path.clone());
    if let Some(timeout) = documents.timeout {
        store = store.with_timeout(seconds("documents.timeout", timeout)?);
    }

    Ok(Arc::new(store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CompletionSettings, SearchSettings};
    use tokio_test::{assert_err, assert_ok};

    fn key_based_settings() -> Settings {
        Settings {
            search: SearchSettings {
                service: Some(ConfigValue::plain("acme")),
                index: Some(ConfigValue::plain("docs")),
                auth: AuthKind::ApiKey,
                api_key: Some(ConfigValue::plain("search-key")),
                ..Default::default()
            },
            completion: CompletionSettings {
                endpoint: Some(ConfigValue::plain("https://acme.openai.azure.com")),
                deployment: Some(ConfigValue::plain("gpt-4o")),
                auth: AuthKind::ApiKey,
                api_key: Some(ConfigValue::plain("openai-key")),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_build_state_with_api_keys() {
        let state = build_state(key_based_settings(), HttpClient::new().unwrap()).await;
        let state = assert_ok!(state);
        assert!(state.documents.is_none());
        assert_eq!(state.default_top(), 5);
    }

    #[tokio::test]
    async fn test_bearer_auth_requires_identity() {
        let mut settings = key_based_settings();
        settings.search.auth = AuthKind::Bearer;

        let err = assert_err!(build_state(settings, HttpClient::new().unwrap())
            .await
            .map(|_| ()));
        assert!(err.to_string().contains("no identity"));
    }

    #[tokio::test]
    async fn test_missing_index_is_reported() {
        let mut settings = key_based_settings();
        settings.search.index = None;

        let err = assert_err!(build_state(settings, HttpClient::new().unwrap())
            .await
            .map(|_| ()));
        assert!(err.to_string().contains("search.index"));
    }

    #[tokio::test]
    async fn test_negative_timeout_is_rejected() {
        let mut settings = key_based_settings();
        settings.completion.timeout = Some(-5.0);

        let err = assert_err!(build_state(settings, HttpClient::new().unwrap())
            .await
            .map(|_| ()));
        assert!(err.to_string().contains("completion.timeout"));
    }

    #[tokio::test]
    async fn test_documents_with_master_key() {
        let mut settings = key_based_settings();
        settings.documents = Some(DocumentSettings {
            endpoint: Some(ConfigValue::plain("https://acct.documents.azure.com")),
            auth: DocumentAuthKind::MasterKey,
            master_key: Some(ConfigValue::plain("c2VjcmV0LWtleQ==")),
            ..Default::default()
        });

        let state = assert_ok!(build_state(settings, HttpClient::new().unwrap()).await);
        let documents = state.documents.unwrap();
        assert_eq!(documents.partition_key_name(), "category");
    }

    #[test]
    fn test_client_secret_requires_all_fields() {
        let mut settings = Settings::default();
        settings.identity.tenant_id = Some("tenant".to_string());

        let client = HttpClient::new().unwrap();
        assert!(build_credential(IdentityKind::ClientSecret, &settings, &client).is_err());
        assert!(build_credential(IdentityKind::None, &settings, &client)
            .unwrap()
            .is_none());

        settings.identity.client_id = Some("client".to_string());
        settings.identity.client_secret = Some("secret".to_string());
        let credential = build_credential(IdentityKind::ClientSecret, &settings, &client)
            .unwrap()
            .unwrap();
        assert_eq!(credential.name(), "client_secret");
    }
}
