//! Web server module
//!
//! Provides the HTTP API of the gateway.

mod handlers;
mod params;
mod routes;
mod state;

pub use params::QueryParams;
pub use routes::{create_router, REQUEST_ID_HEADER};
pub use state::AppState;
