//! Settings structures for the gateway configuration

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// A configuration string that is either given inline or names a secret
/// to be resolved through the secret provider at startup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Plain(String),
    Secret { secret: String },
}

impl ConfigValue {
    pub fn plain(value: impl Into<String>) -> Self {
        ConfigValue::Plain(value.into())
    }

    pub fn secret(name: impl Into<String>) -> Self {
        ConfigValue::Secret {
            secret: name.into(),
        }
    }

    /// Secret name, if this value is a reference
    pub fn secret_name(&self) -> Option<&str> {
        match self {
            ConfigValue::Secret { secret } => Some(secret),
            ConfigValue::Plain(_) => None,
        }
    }
}

/// Main settings structure, loaded from `settings.yml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub outgoing: OutgoingSettings,
    pub identity: IdentitySettings,
    pub vault: VaultSettings,
    pub search: SearchSettings,
    pub completion: CompletionSettings,
    pub documents: Option<DocumentSettings>,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings from {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse settings from a YAML string
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(content)?;
        Ok(settings)
    }

    /// Reject settings that cannot be turned into a running service
    pub fn validate(&self) -> Result<()> {
        seconds("server.request_timeout", self.server.request_timeout)?;
        seconds("outgoing.request_timeout", self.outgoing.request_timeout)?;
        let per_call = [
            ("search.timeout", self.search.timeout),
            ("completion.timeout", self.completion.timeout),
            (
                "documents.timeout",
                self.documents.as_ref().and_then(|d| d.timeout),
            ),
        ];
        for (name, value) in per_call {
            if let Some(value) = value {
                seconds(name, value)?;
            }
        }
        Ok(())
    }

    /// Merge with process environment variables
    pub fn merge_env(&mut self) {
        self.merge_vars(|key| std::env::var(key).ok());
    }

    /// Merge overrides from a variable lookup.
    ///
    /// Besides the `GATEWAY_*` variables this understands the function-app
    /// variables the handlers were historically deployed with; the
    /// `*_NAME` variables hold secret names, not values.
    pub fn merge_vars<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("GATEWAY_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }
        if let Some(val) = lookup("GATEWAY_BIND_ADDRESS") {
            self.server.bind_address = val;
        }
        if let Some(val) = lookup("GATEWAY_LOG") {
            self.logging.filter = val;
        }

        if let Some(val) = lookup("KEYVAULT_URL") {
            self.vault.url = Some(val);
        }

        let tenant = lookup("AZURE_TENANT_ID");
        let client = lookup("AZURE_CLIENT_ID");
        let secret = lookup("AZURE_CLIENT_SECRET");
        if tenant.is_some() && client.is_some() && secret.is_some() {
            self.identity.kind = IdentityKind::ClientSecret;
        }
        if tenant.is_some() {
            self.identity.tenant_id = tenant;
        }
        if client.is_some() {
            self.identity.client_id = client;
        }
        if secret.is_some() {
            self.identity.client_secret = secret;
        }
        if let Some(val) = lookup("AZURE_AUTHORITY_HOST") {
            self.identity.authority_host = val;
        }

        if let Some(val) = lookup("AZURE_SEARCH_ENDPOINT") {
            self.search.endpoint = Some(ConfigValue::plain(val));
        }
        if let Some(val) = lookup("AZURE_SEARCH_SERVICE_NAME") {
            self.search.service = Some(ConfigValue::secret(val));
        }
        if let Some(val) = lookup("AZURE_SEARCH_INDEX_NAME") {
            self.search.index = Some(ConfigValue::secret(val));
        }
        if let Some(val) = lookup("AZURE_SEARCH_API_KEY_NAME") {
            self.search.api_key = Some(ConfigValue::secret(val));
        }

        if let Some(val) = lookup("AZURE_OPENAI_ENDPOINT_NAME") {
            self.completion.endpoint = Some(ConfigValue::secret(val));
        }
        if let Some(val) = lookup("AZURE_OPENAI_VERSION_NAME") {
            self.completion.api_version = ConfigValue::secret(val);
        }
        if let Some(val) = lookup("AZURE_OPENAI_DEPLOYMENT_NAME") {
            self.completion.deployment = Some(ConfigValue::secret(val));
        }

        if let Some(val) = lookup("COSMOS_DB_ENDPOINT") {
            let documents = self.documents.get_or_insert_with(DocumentSettings::default);
            documents.endpoint = Some(ConfigValue::plain(val));
            if documents.identity.is_none() {
                documents.identity = Some(IdentityKind::ManagedIdentity);
            }
        }
    }
}

/// Inbound server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Server port
    pub port: u16,
    /// Bind address
    pub bind_address: String,
    /// Upper bound for a whole inbound request, in seconds
    pub request_timeout: f64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: 7071,
            bind_address: "127.0.0.1".to_string(),
            request_timeout: 120.0,
        }
    }
}

impl ServerSettings {
    /// Falls back to the default bound when the configured value is unusable;
    /// [`Settings::validate`] reports such values at startup
    pub fn request_timeout(&self) -> Duration {
        seconds("server.request_timeout", self.request_timeout)
            .unwrap_or_else(|_| Duration::from_secs(120))
    }
}

/// Convert a timeout given in seconds, rejecting zero, negative and
/// non-finite values
pub fn seconds(name: &str, value: f64) -> Result<Duration> {
    if !value.is_finite() || value <= 0.0 {
        bail!("{} must be a positive number of seconds, got {}", name, value);
    }
    Duration::try_from_secs_f64(value).with_context(|| format!("{} is out of range", name))
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing_subscriber::EnvFilter` directive, overridden by `RUST_LOG`
    pub filter: String,
    /// Include the event target in log lines
    pub with_target: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            with_target: false,
        }
    }
}

/// Outgoing request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutgoingSettings {
    /// Default request timeout in seconds
    pub request_timeout: f64,
    /// Pool max idle connections per host
    pub pool_maxsize: usize,
    /// Proxy settings
    pub proxies: ProxySettings,
    /// Extra headers to send with every request
    pub extra_headers: HashMap<String, String>,
}

impl Default for OutgoingSettings {
    fn default() -> Self {
        Self {
            request_timeout: 30.0,
            pool_maxsize: 20,
            proxies: ProxySettings::default(),
            extra_headers: HashMap::new(),
        }
    }
}

/// Proxy settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxySettings {
    pub http: Option<String>,
    pub https: Option<String>,
    pub all: Option<String>,
}

/// Which credential obtains bearer tokens
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentityKind {
    /// No identity provider; only key-based auth is possible
    #[default]
    None,
    /// OAuth2 client credentials (tenant, client id, client secret)
    ClientSecret,
    /// Platform managed identity
    ManagedIdentity,
}

/// Identity provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    pub kind: IdentityKind,
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    /// Authority used by the client-secret flow
    pub authority_host: String,
    /// User-assigned managed identity to request tokens for
    pub managed_identity_client_id: Option<String>,
    /// Override for the managed identity token endpoint
    pub managed_identity_endpoint: Option<String>,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            kind: IdentityKind::None,
            tenant_id: None,
            client_id: None,
            client_secret: None,
            authority_host: "https://login.microsoftonline.com".to_string(),
            managed_identity_client_id: None,
            managed_identity_endpoint: None,
        }
    }
}

/// Secret vault settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSettings {
    /// Vault URL; when absent secrets are read from the environment
    pub url: Option<String>,
    pub api_version: String,
    pub scope: String,
}

impl Default for VaultSettings {
    fn default() -> Self {
        Self {
            url: None,
            api_version: "7.4".to_string(),
            scope: "https://vault.azure.net/.default".to_string(),
        }
    }
}

/// How a service authenticates outbound calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthKind {
    /// Static key sent in the `api-key` header
    ApiKey,
    /// Bearer token from the identity provider
    #[default]
    Bearer,
}

/// Search service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Full endpoint URL; takes precedence over `service`
    pub endpoint: Option<ConfigValue>,
    /// Service name, expanded to `https://{service}.search.windows.net`
    pub service: Option<ConfigValue>,
    pub index: Option<ConfigValue>,
    pub api_version: String,
    pub auth: AuthKind,
    pub api_key: Option<ConfigValue>,
    pub scope: String,
    /// Default number of results
    pub top: u32,
    /// Per-call timeout in seconds (falls back to `outgoing.request_timeout`)
    pub timeout: Option<f64>,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            service: None,
            index: None,
            api_version: "2023-11-01".to_string(),
            auth: AuthKind::Bearer,
            api_key: None,
            scope: "https://search.azure.com/.default".to_string(),
            top: 5,
            timeout: None,
        }
    }
}

/// Chat completion service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub endpoint: Option<ConfigValue>,
    /// Deployment id, also sent as the model identifier
    pub deployment: Option<ConfigValue>,
    pub api_version: ConfigValue,
    pub auth: AuthKind,
    pub api_key: Option<ConfigValue>,
    pub scope: String,
    pub system_prompt: String,
    /// Append search results to the user message when present
    pub include_search_context: bool,
    pub timeout: Option<f64>,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            deployment: None,
            api_version: ConfigValue::plain("2024-02-01"),
            auth: AuthKind::Bearer,
            api_key: None,
            scope: "https://cognitiveservices.azure.com/.default".to_string(),
            system_prompt: "You are a helpful assistant.".to_string(),
            include_search_context: true,
            timeout: None,
        }
    }
}

/// How the document store authenticates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentAuthKind {
    /// Entra ID bearer token
    #[default]
    Aad,
    /// Account master key signature
    MasterKey,
}

/// Document store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentSettings {
    pub endpoint: Option<ConfigValue>,
    pub database: String,
    pub container: String,
    /// Partition key path, e.g. `/category`
    pub partition_key_path: String,
    pub auth: DocumentAuthKind,
    pub master_key: Option<ConfigValue>,
    /// Credential override for AAD auth; defaults to `identity.kind`
    pub identity: Option<IdentityKind>,
    pub timeout: Option<f64>,
}

impl Default for DocumentSettings {
    fn default() -> Self {
        Self {
            endpoint: None,
            database: "TestDb".to_string(),
            container: "TestContainer".to_string(),
            partition_key_path: "/category".to_string(),
            auth: DocumentAuthKind::Aad,
            master_key: None,
            identity: None,
            timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.server.port, 7071);
        assert_eq!(settings.search.top, 5);
        assert_eq!(settings.search.api_version, "2023-11-01");
        assert_eq!(
            settings.completion.system_prompt,
            "You are a helpful assistant."
        );
        assert!(settings.documents.is_none());
    }

    #[test]
    fn test_yaml_with_secret_refs() {
        let yaml = r#"
server:
  port: 9000
search:
  service: { secret: "search-service" }
  index: "docs"
  auth: api_key
  api_key: { secret: "search-key" }
completion:
  endpoint: "https://example.openai.azure.com"
  deployment: { secret: "deployment" }
documents:
  endpoint: "https://acct.documents.azure.com"
  auth: master_key
  master_key: { secret: "cosmos-key" }
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.server.port, 9000);
        assert_eq!(settings.server.bind_address, "127.0.0.1");
        assert_eq!(
            settings.search.service,
            Some(ConfigValue::secret("search-service"))
        );
        assert_eq!(settings.search.index, Some(ConfigValue::plain("docs")));
        assert_eq!(settings.search.auth, AuthKind::ApiKey);
        assert_eq!(
            settings.completion.deployment.as_ref().and_then(|v| v.secret_name()),
            Some("deployment")
        );

        let documents = settings.documents.unwrap();
        assert_eq!(documents.auth, DocumentAuthKind::MasterKey);
        assert_eq!(documents.database, "TestDb");
        assert_eq!(documents.partition_key_path, "/category");
    }

    #[test]
    fn test_merge_function_app_variables() {
        let vars: HashMap<&str, &str> = [
            ("KEYVAULT_URL", "https://vault.example.net"),
            ("AZURE_TENANT_ID", "tenant"),
            ("AZURE_CLIENT_ID", "client"),
            ("AZURE_CLIENT_SECRET", "shh"),
            ("AZURE_SEARCH_SERVICE_NAME", "search-service"),
            ("AZURE_SEARCH_INDEX_NAME", "search-index"),
            ("AZURE_OPENAI_VERSION_NAME", "openai-version"),
            ("COSMOS_DB_ENDPOINT", "https://acct.documents.azure.com"),
            ("GATEWAY_PORT", "8080"),
        ]
        .into_iter()
        .collect();

        let mut settings = Settings::default();
        settings.merge_vars(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.vault.url.as_deref(), Some("https://vault.example.net"));
        assert_eq!(settings.identity.kind, IdentityKind::ClientSecret);
        assert_eq!(
            settings.search.index,
            Some(ConfigValue::secret("search-index"))
        );
        assert_eq!(
            settings.completion.api_version,
            ConfigValue::secret("openai-version")
        );

        let documents = settings.documents.unwrap();
        assert_eq!(
            documents.endpoint,
            Some(ConfigValue::plain("https://acct.documents.azure.com"))
        );
        assert_eq!(documents.identity, Some(IdentityKind::ManagedIdentity));
    }

    #[test]
    fn test_invalid_timeouts_are_rejected() {
        assert!(Settings::default().validate().is_ok());

        let settings = Settings::from_yaml("completion:\n  timeout: -1\n").unwrap();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("completion.timeout"));

        let mut settings = Settings::default();
        settings.server.request_timeout = f64::NAN;
        assert!(settings.validate().is_err());
        assert_eq!(settings.server.request_timeout(), Duration::from_secs(120));

        settings.server.request_timeout = 0.0;
        assert!(settings.validate().is_err());

        let mut settings = Settings::default();
        settings.documents = Some(DocumentSettings {
            timeout: Some(f64::INFINITY),
            ..Default::default()
        });
        assert!(settings.validate().is_err());

        assert_eq!(
            seconds("x", 1.5).unwrap(),
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_partial_client_credentials_do_not_switch_identity() {
        let mut settings = Settings::default();
        settings.merge_vars(|key| match key {
            "AZURE_TENANT_ID" => Some("tenant".to_string()),
            _ => None,
        });
        assert_eq!(settings.identity.kind, IdentityKind::None);
        assert_eq!(settings.identity.tenant_id.as_deref(), Some("tenant"));
    }
}
