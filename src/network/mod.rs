//! HTTP networking module
//!
//! Provides the outbound HTTP client used by every collaborator client.

mod client;
pub mod request_id;

pub use client::{
    HttpClient, HttpMethod, OutboundRequest, OutboundResponse, RequestBody,
    CLIENT_REQUEST_ID_HEADER,
};
