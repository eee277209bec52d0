//! HTTP client for calls to the managed services

use super::request_id;
use crate::config::{seconds, OutgoingSettings};
use crate::error::{GatewayError, Result};
use reqwest::{Client, Response};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

/// Header carrying the inbound request id to the collaborators
pub const CLIENT_REQUEST_ID_HEADER: &str = "x-ms-client-request-id";

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// Request body types
#[derive(Debug, Clone)]
pub enum RequestBody {
    Form(HashMap<String, String>),
    Json(serde_json::Value),
}

/// An outbound request to one of the collaborators
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// Collaborator name used in errors and logs
    pub service: &'static str,
    /// URL to request
    pub url: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Request headers
    pub headers: HashMap<String, String>,
    /// Query parameters
    pub params: Vec<(String, String)>,
    /// Body
    pub data: Option<RequestBody>,
    /// Per-request timeout; the client default applies when unset
    pub timeout: Option<Duration>,
}

impl OutboundRequest {
    fn new(service: &'static str, method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            service,
            url: url.into(),
            method,
            headers: HashMap::new(),
            params: Vec::new(),
            data: None,
            timeout: None,
        }
    }

    /// Create a GET request
    pub fn get(service: &'static str, url: impl Into<String>) -> Self {
        Self::new(service, HttpMethod::Get, url)
    }

    /// Create a POST request
    pub fn post(service: &'static str, url: impl Into<String>) -> Self {
        Self::new(service, HttpMethod::Post, url)
    }

    /// Add a header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Add form data
    pub fn form(mut self, data: HashMap<String, String>) -> Self {
        self.data = Some(RequestBody::Form(data));
        self
    }

    /// Add JSON body
    pub fn json(mut self, data: serde_json::Value) -> Self {
        self.data = Some(RequestBody::Json(data));
        self
    }

    /// Set the timeout for this request
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// HTTP response from a collaborator
#[derive(Debug)]
pub struct OutboundResponse {
    /// Collaborator that produced the response
    pub service: &'static str,
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HashMap<String, String>,
    /// Response body as text
    pub text: String,
}

impl OutboundResponse {
    /// Check if response is successful (2xx)
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Turn a non-success response into [`GatewayError::Upstream`]
    pub fn error_for_status(self) -> Result<Self> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(GatewayError::Upstream {
                service: self.service,
                status: self.status,
                body: self.text,
            })
        }
    }

    /// Parse response as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.text).map_err(|e| GatewayError::MalformedResponse {
            service: self.service,
            reason: e.to_string(),
        })
    }
}

/// HTTP client wrapper shared by every collaborator client
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    default_timeout: Duration,
    extra_headers: HashMap<String, String>,
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> anyhow::Result<Self> {
        Self::with_settings(&OutgoingSettings::default())
    }

    /// Create a new HTTP client with custom settings
    pub fn with_settings(settings: &OutgoingSettings) -> anyhow::Result<Self> {
        let default_timeout = seconds("outgoing.request_timeout", settings.request_timeout)?;
        let mut builder = Client::builder()
            .timeout(default_timeout)
            .pool_max_idle_per_host(settings.pool_maxsize)
            .user_agent(concat!("rag-gateway/", env!("CARGO_PKG_VERSION")))
            .gzip(true)
            .brotli(true);

        // Proxy settings
        if let Some(ref proxy_url) = settings.proxies.all {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        } else {
            if let Some(ref http) = settings.proxies.http {
                builder = builder.proxy(reqwest::Proxy::http(http)?);
            }
            if let Some(ref https) = settings.proxies.https {
                builder = builder.proxy(reqwest::Proxy::https(https)?);
            }
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            default_timeout,
            extra_headers: settings.extra_headers.clone(),
        })
    }

    /// Execute an outbound request
    pub async fn execute(&self, request: OutboundRequest) -> Result<OutboundResponse> {
        let service = request.service;
        let timeout = request.timeout.unwrap_or(self.default_timeout);

        let mut req_builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };

        req_builder = req_builder.timeout(timeout);

        for (key, value) in &self.extra_headers {
            req_builder = req_builder.header(key, value);
        }

        if let Some(id) = request_id::current() {
            req_builder = req_builder.header(CLIENT_REQUEST_ID_HEADER, id);
        }

        for (key, value) in &request.headers {
            req_builder = req_builder.header(key, value);
        }

        if !request.params.is_empty() {
            req_builder = req_builder.query(&request.params);
        }

        if let Some(body) = request.data {
            req_builder = match body {
                RequestBody::Form(data) => req_builder.form(&data),
                RequestBody::Json(json) => req_builder.json(&json),
            };
        }

        debug!("Calling {} service: {:?} {}", service, request.method, request.url);

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::Timeout {
                    service,
                    after: timeout,
                }
            } else {
                GatewayError::Transport(e)
            }
        })?;

        Self::parse_response(service, response).await
    }

    /// Read the response into an [`OutboundResponse`]
    async fn parse_response(service: &'static str, response: Response) -> Result<OutboundResponse> {
        let status = response.status().as_u16();

        let mut headers = HashMap::new();
        for (key, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(key.to_string(), v.to_string());
            }
        }

        let text = response.text().await?;

        debug!("{} service answered {}", service, status);

        Ok(OutboundResponse {
            service,
            status,
            headers,
            text,
        })
    }
}
