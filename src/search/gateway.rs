//! Retrieval augmentation gateway
//!
//! Forwards a query to a hosted search index and hands back the ranked
//! results untouched.

use super::models::{SearchRequest, SearchResultSet};
use crate::auth::AuthStrategy;
use crate::error::{GatewayError, Result};
use crate::network::{HttpClient, OutboundRequest};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Anything that can answer a search query
#[async_trait]
pub trait SearchService: Send + Sync {
    /// Run `query_text` against the index, returning at most `top` results
    async fn search(&self, query_text: &str, top: u32) -> Result<SearchResultSet>;
}

/// Client for a hosted search index
pub struct SearchGateway {
    client: HttpClient,
    endpoint: String,
    index: String,
    api_version: String,
    auth: Arc<dyn AuthStrategy>,
    timeout: Option<Duration>,
}

impl SearchGateway {
    /// Create a gateway for `index` at `endpoint`
    pub fn new(
        client: HttpClient,
        endpoint: impl Into<String>,
        index: impl Into<String>,
        auth: Arc<dyn AuthStrategy>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            index: index.into(),
            api_version: "2023-11-01".to_string(),
            auth,
            timeout: None,
        }
    }

    /// Endpoint of a search service addressed by name
    pub fn service_endpoint(service: &str) -> String {
        format!("https://{}.search.windows.net", service)
    }

    /// Set the API version
    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    /// Set the per-call timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn search_url(&self) -> String {
        format!(
            "{}/indexes/{}/docs/search",
            self.endpoint.trim_end_matches('/'),
            self.index
        )
    }
}

#[async_trait]
impl SearchService for SearchGateway {
    async fn search(&self, query_text: &str, top: u32) -> Result<SearchResultSet> {
        if query_text.trim().is_empty() {
            return Err(GatewayError::missing("Missing 'searchQuery' in request."));
        }

        let start = Instant::now();
        let body = serde_json::to_value(SearchRequest::new(query_text, top))
            .map_err(|e| GatewayError::Unexpected(e.into()))?;

        let mut request = OutboundRequest::post("search", self.search_url())
            .param("api-version", &self.api_version)
            .json(body);
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }
        let request = self.auth.authorize(request).await?;

        debug!("Searching index {} with {} auth", self.index, self.auth.name());

        let response = self.client.execute(request).await?.error_for_status()?;
        let results = SearchResultSet::new(response.json()?);

        info!(
            "Search on index {} returned {} results in {:?}",
            self.index,
            results.hit_count(),
            start.elapsed()
        );

        Ok(results)
    }
}
