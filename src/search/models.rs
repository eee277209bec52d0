//! Search request and result models

use serde::{Deserialize, Serialize};

/// Body of a search-index query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Full-text query
    pub search: String,
    /// Maximum number of results
    pub top: u32,
}

impl SearchRequest {
    pub fn new(search: impl Into<String>, top: u32) -> Self {
        Self {
            search: search.into(),
            top,
        }
    }
}

/// Ranked results exactly as the search service returned them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SearchResultSet(pub serde_json::Value);

impl SearchResultSet {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Number of documents in the `value` array, when present
    pub fn hit_count(&self) -> usize {
        self.0
            .get("value")
            .and_then(|v| v.as_array())
            .map(Vec::len)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_request_body() {
        let body = serde_json::to_value(SearchRequest::new("rust", 5)).unwrap();
        assert_eq!(body, serde_json::json!({"search": "rust", "top": 5}));
    }

    #[test]
    fn test_result_set_is_transparent() {
        let raw = serde_json::json!({"@odata.context": "x", "value": [{"id": "1"}, {"id": "2"}]});
        let set: SearchResultSet = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(set.hit_count(), 2);
        assert_eq!(serde_json::to_value(&set).unwrap(), raw);
    }
}
