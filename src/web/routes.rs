//! Route definitions

use super::handlers;
use super::state::AppState;
use crate::error::GatewayError;
use crate::network::request_id;
use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info_span, Instrument};

/// Header echoing the request id back to the caller
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut router = Router::new()
        // API routes
        .route("/api/chat", get(handlers::chat).post(handlers::chat))
        .route("/api/search", get(handlers::search).post(handlers::search))
        .route("/health", get(handlers::health));

    if state.documents.is_some() {
        router = router.route(
            "/api/documents",
            get(handlers::read_document)
                .post(handlers::upsert_document)
                .fallback(handlers::unsupported_method),
        );
    }

    router
        // Add middleware
        .layer(middleware::from_fn_with_state(state.clone(), request_context))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Add state
        .with_state(state)
}

/// Tag the request with an id, run the handler inside its span under the
/// server deadline and echo the id in the response.
///
/// A request past the deadline is dropped, cancelling its outbound calls.
async fn request_context(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(request_id::generate);

    let span = info_span!(
        "request",
        request_id = %id,
        method = %request.method(),
        path = %request.uri().path()
    );

    let deadline = state.settings.server.request_timeout();
    let handler = request_id::scope(id.clone(), next.run(request));

    let mut response = match tokio::time::timeout(deadline, handler)
        .instrument(span)
        .await
    {
        Ok(response) => response,
        Err(_) => GatewayError::Timeout {
            service: "gateway",
            after: deadline,
        }
        .into_response(),
    };

    if let Ok(value) = HeaderValue::from_str(&id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}
