//! RAG Gateway: a retrieval-augmented chat completion gateway
//!
//! Forwards search queries to a hosted search index, optionally feeds the
//! results into a hosted chat completion model, and passes single
//! documents through to a managed document database.

pub mod auth;
pub mod bootstrap;
pub mod cache;
pub mod completion;
pub mod config;
pub mod documents;
pub mod error;
pub mod identity;
pub mod network;
pub mod orchestrator;
pub mod search;
pub mod secrets;
pub mod web;

pub use config::Settings;
pub use error::{GatewayError, Result};
pub use orchestrator::{Orchestrator, ResponseEnvelope};
pub use search::{SearchResultSet, SearchService};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default number of search results requested
pub const DEFAULT_TOP: u32 = 5;
