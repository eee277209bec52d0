//! Completion orchestrator
//!
//! Optionally runs a search first, then asks the completion model to
//! answer the user's query, and packs both into a [`ResponseEnvelope`].

use crate::completion::{ChatMessage, CompletionService};
use crate::error::{GatewayError, Result};
use crate::search::{SearchResultSet, SearchService};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info_span, Instrument};

/// Default system instruction sent with every completion
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// What the caller gets back from a completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// Model reply
    pub response: String,
    /// Raw search results, present only when search was requested
    pub search_results: Option<SearchResultSet>,
}

/// Progress of a single request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingSearch,
    AwaitingCompletion,
    Done,
}

impl Stage {
    fn as_str(self) -> &'static str {
        match self {
            Stage::AwaitingSearch => "awaiting_search",
            Stage::AwaitingCompletion => "awaiting_completion",
            Stage::Done => "done",
        }
    }
}

/// Glues the search gateway to the completion model
pub struct Orchestrator {
    search: Arc<dyn SearchService>,
    completion: Arc<dyn CompletionService>,
    system_prompt: String,
    default_top: u32,
    include_search_context: bool,
}

impl Orchestrator {
    pub fn new(search: Arc<dyn SearchService>, completion: Arc<dyn CompletionService>) -> Self {
        Self {
            search,
            completion,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            default_top: crate::DEFAULT_TOP,
            include_search_context: true,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_default_top(mut self, top: u32) -> Self {
        self.default_top = top;
        self
    }

    /// Whether search results are appended to the user message
    pub fn with_search_context(mut self, include: bool) -> Self {
        self.include_search_context = include;
        self
    }

    /// Answer `query`, searching for it first when `use_search` is set
    pub async fn complete(&self, query: &str, use_search: bool) -> Result<ResponseEnvelope> {
        let search_text = use_search.then_some(query);
        self.complete_with(query, search_text, None).await
    }

    /// Answer `query`; when `search_text` is given it is searched first
    /// (with `top` results, or the default) and the results ride along.
    pub async fn complete_with(
        &self,
        query: &str,
        search_text: Option<&str>,
        top: Option<u32>,
    ) -> Result<ResponseEnvelope> {
        if query.trim().is_empty() {
            return Err(GatewayError::missing("Missing 'query' in request body."));
        }

        let search_results = match search_text {
            Some(text) => {
                let text = if text.trim().is_empty() { query } else { text };
                self.enter(Stage::AwaitingSearch);
                let top = top.unwrap_or(self.default_top);
                let results = self
                    .search
                    .search(text, top)
                    .instrument(info_span!("search", top))
                    .await
                    .map_err(GatewayError::search_failure)?;
                Some(results)
            }
            None => None,
        };

        self.enter(Stage::AwaitingCompletion);
        let messages = self.build_messages(query, search_results.as_ref());
        let response = self
            .completion
            .complete(&messages)
            .instrument(info_span!("completion"))
            .await?;

        self.enter(Stage::Done);
        Ok(ResponseEnvelope {
            response,
            search_results,
        })
    }

    /// System instruction plus one user message
    fn build_messages(&self, query: &str, results: Option<&SearchResultSet>) -> Vec<ChatMessage> {
        let user = match results {
            Some(results) if self.include_search_context => {
                let context = serde_json::to_string_pretty(results.as_value())
                    .unwrap_or_else(|_| results.as_value().to_string());
                format!("{}\n\nSearch results:\n{}", query, context)
            }
            _ => query.to_string(),
        };

        vec![ChatMessage::system(&self.system_prompt), ChatMessage::user(user)]
    }

    fn enter(&self, stage: Stage) {
        debug!(stage = stage.as_str(), "orchestrator stage");
    }
}
