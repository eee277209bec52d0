//! Application state shared across handlers

use crate::config::Settings;
use crate::documents::DocumentStore;
use crate::orchestrator::Orchestrator;
use crate::search::SearchService;
use std::sync::Arc;

/// Shared application state, built once by [`crate::bootstrap`]
#[derive(Clone)]
pub struct AppState {
    /// Global settings
    pub settings: Arc<Settings>,
    /// Completion orchestrator
    pub orchestrator: Arc<Orchestrator>,
    /// Retrieval augmentation gateway
    pub search: Arc<dyn SearchService>,
    /// Document pass-through, when configured
    pub documents: Option<Arc<dyn DocumentStore>>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        settings: Settings,
        orchestrator: Orchestrator,
        search: Arc<dyn SearchService>,
        documents: Option<Arc<dyn DocumentStore>>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            orchestrator: Arc::new(orchestrator),
            search,
            documents,
        }
    }

    /// Default number of search results
    pub fn default_top(&self) -> u32 {
        self.settings.search.top
    }
}
