//! Search module
//!
//! The retrieval augmentation gateway and its data types.

mod gateway;
mod models;

pub use gateway::{SearchGateway, SearchService};
pub use models::*;
