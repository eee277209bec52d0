//! Gateway error type and its HTTP mapping
//!
//! Every failure that can reach a handler is a [`GatewayError`]. The
//! `IntoResponse` impl turns it into a plain-text body with the matching
//! status code.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by the gateway components
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A required input was missing or empty
    #[error("{0}")]
    InvalidArgument(String),

    /// The requested item does not exist upstream
    #[error("{0}")]
    NotFound(String),

    /// A collaborator answered with a non-success status
    #[error("{service} service returned status {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// A collaborator answered 2xx but the payload was unusable
    #[error("{service} service returned a malformed response: {reason}")]
    MalformedResponse {
        service: &'static str,
        reason: String,
    },

    /// The search step of an augmented completion failed
    #[error("search failed: {0}")]
    SearchFailure(#[source] Box<GatewayError>),

    /// An outbound call exceeded its deadline
    #[error("{service} request timed out after {after:?}")]
    Timeout {
        service: &'static str,
        after: Duration,
    },

    /// Connection-level failure talking to a collaborator
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Anything else
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

impl GatewayError {
    /// Shorthand for a missing required field
    pub fn missing(message: impl Into<String>) -> Self {
        GatewayError::InvalidArgument(message.into())
    }

    /// Wrap a failure from the search step so it stays distinguishable
    pub fn search_failure(cause: GatewayError) -> Self {
        GatewayError::SearchFailure(Box::new(cause))
    }

    /// HTTP status this error maps to
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            GatewayError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = if status.is_server_error() {
            tracing::error!("Error: {}", self);
            format!("Internal Server Error: {}", self)
        } else {
            tracing::debug!("Rejected request: {}", self);
            self.to_string()
        };

        (status, body).into_response()
    }
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_text(err: GatewayError) -> (StatusCode, String) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_invalid_argument_is_bad_request() {
        let (status, body) =
            body_text(GatewayError::missing("Missing 'query' in request body.")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, "Missing 'query' in request body.");
    }

    #[tokio::test]
    async fn test_upstream_is_internal_server_error() {
        let err = GatewayError::Upstream {
            service: "completion",
            status: 429,
            body: "slow down".to_string(),
        };

        let (status, body) = body_text(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.starts_with("Internal Server Error: "));
        assert!(body.contains("status 429"));
    }

    #[tokio::test]
    async fn test_search_failure_is_distinct() {
        let err = GatewayError::search_failure(GatewayError::Upstream {
            service: "search",
            status: 503,
            body: "unavailable".to_string(),
        });

        let (status, body) = body_text(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.contains("search failed"));
        assert!(body.contains("503"));
    }

    #[test]
    fn test_not_found_status() {
        let err = GatewayError::NotFound("Document 'a' not found.".to_string());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }
}
