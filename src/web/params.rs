//! Inbound request parameters
//!
//! Callers send fields either in a JSON body or in the query string, under
//! camelCase or snake_case names. Both sources are parsed into
//! [`QueryParams`] and merged, body first.

use crate::error::{GatewayError, Result};
use serde::{Deserialize, Deserializer};

/// Fields accepted by the chat and search endpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct QueryParams {
    /// User query
    #[serde(default)]
    pub query: Option<String>,
    /// Text to search for, when it differs from the query
    #[serde(default, rename = "searchQuery", alias = "search_query")]
    pub search_query: Option<String>,
    /// Run a search before the completion
    #[serde(
        default,
        rename = "useSearch",
        alias = "use_search",
        deserialize_with = "deserialize_flag"
    )]
    pub use_search: Option<bool>,
    /// Number of search results
    #[serde(default)]
    pub top: Option<u32>,
}

impl QueryParams {
    /// Parse a JSON body; an empty body yields no fields
    pub fn from_body(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body).map_err(|e| {
            GatewayError::InvalidArgument(format!("Invalid JSON in request body: {}", e))
        })
    }

    /// Fields set in `body` win over those in `self`
    pub fn merge(self, body: QueryParams) -> QueryParams {
        QueryParams {
            query: body.query.or(self.query),
            search_query: body.search_query.or(self.search_query),
            use_search: body.use_search.or(self.use_search),
            top: body.top.or(self.top),
        }
    }

    /// The user query; never taken from the search text
    pub fn query_text(&self) -> Option<&str> {
        non_empty(self.query.as_deref())
    }

    /// The search text, falling back to the user query
    pub fn search_text(&self) -> Option<&str> {
        non_empty(self.search_query.as_deref()).or_else(|| non_empty(self.query.as_deref()))
    }

    pub fn use_search(&self) -> bool {
        self.use_search.unwrap_or(false)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(i64),
    Text(String),
}

/// Accept `true`, `"true"`, `1`, `"yes"`, `"on"` and their negatives
fn deserialize_flag<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let flag = Option::<Flag>::deserialize(deserializer)?;
    match flag {
        None => Ok(None),
        Some(Flag::Bool(b)) => Ok(Some(b)),
        Some(Flag::Int(i)) => Ok(Some(i != 0)),
        Some(Flag::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" | "" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!(
                "invalid useSearch value '{}'",
                other
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_aliases() {
        let camel = QueryParams::from_body(br#"{"query": "q", "useSearch": true}"#).unwrap();
        let snake = QueryParams::from_body(br#"{"query": "q", "use_search": "yes"}"#).unwrap();
        assert_eq!(camel, snake);
        assert!(camel.use_search());

        let search = QueryParams::from_body(br#"{"search_query": "s", "top": 3}"#).unwrap();
        assert_eq!(search.search_query.as_deref(), Some("s"));
        assert_eq!(search.top, Some(3));
    }

    #[test]
    fn test_flag_values() {
        for (raw, expected) in [
            (r#"{"useSearch": 1}"#, true),
            (r#"{"useSearch": 0}"#, false),
            (r#"{"useSearch": "False"}"#, false),
            (r#"{"useSearch": "on"}"#, true),
            (r#"{"useSearch": ""}"#, false),
        ] {
            let params = QueryParams::from_body(raw.as_bytes()).unwrap();
            assert_eq!(params.use_search(), expected, "{}", raw);
        }

        assert!(QueryParams::from_body(br#"{"useSearch": "maybe"}"#).is_err());
        assert!(!QueryParams::default().use_search());
    }

    #[test]
    fn test_empty_and_invalid_body() {
        assert_eq!(QueryParams::from_body(b"").unwrap(), QueryParams::default());
        assert_eq!(QueryParams::from_body(b" \n").unwrap(), QueryParams::default());

        let err = QueryParams::from_body(b"{not json").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidArgument(_)));
    }

    #[test]
    fn test_merge_prefers_body() {
        let query = QueryParams {
            query: Some("from query".to_string()),
            use_search: Some(true),
            ..Default::default()
        };
        let body = QueryParams {
            query: Some("from body".to_string()),
            top: Some(2),
            ..Default::default()
        };

        let merged = query.merge(body);
        assert_eq!(merged.query.as_deref(), Some("from body"));
        assert_eq!(merged.use_search, Some(true));
        assert_eq!(merged.top, Some(2));
    }

    #[test]
    fn test_text_fallbacks() {
        let params = QueryParams {
            query: Some("  ".to_string()),
            search_query: Some("search me".to_string()),
            ..Default::default()
        };
        assert_eq!(params.query_text(), None);
        assert_eq!(params.search_text(), Some("search me"));

        let params = QueryParams {
            query: Some("ask me".to_string()),
            ..Default::default()
        };
        assert_eq!(params.query_text(), Some("ask me"));
        assert_eq!(params.search_text(), Some("ask me"));

        assert_eq!(QueryParams::default().query_text(), None);
    }
}
