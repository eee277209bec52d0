//! Chat completion module

mod client;
mod models;

pub use client::{CompletionClient, CompletionService};
pub use models::*;
