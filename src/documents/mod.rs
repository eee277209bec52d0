//! Document pass-through
//!
//! Direct upsert/read of single documents in a managed document database.

mod cosmos;

pub use cosmos::{CosmosAuth, CosmosStore};

use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use serde_json::Value;

/// A store that can upsert and read documents keyed by id and partition key
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Query parameter / document field that carries the partition key
    fn partition_key_name(&self) -> &str;

    /// Insert or replace `document`
    async fn upsert(&self, document: Value) -> Result<()>;

    /// Read the document `id` from partition `partition_key`
    async fn read(&self, id: &str, partition_key: &str) -> Result<Value>;
}

/// Locate the partition key value of `document` for a path like `/category`
/// or `/address/city`
pub fn partition_key_value<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.trim_start_matches('/')
        .split('/')
        .try_fold(document, |node, segment| node.get(segment))
        .filter(|value| !value.is_null())
}

/// Reject ids that cannot name a single document resource
///
/// The id becomes one path segment of the request URL, so separators,
/// query/fragment delimiters and dot segments are refused.
pub fn validate_id(id: &str) -> Result<()> {
    if id == "." || id == ".." || id.contains(['/', '\\', '?', '#']) {
        return Err(GatewayError::InvalidArgument(format!(
            "Invalid document id '{}'.",
            id
        )));
    }
    Ok(())
}

/// Check that `document` can be stored: an object with a string `id` and a
/// partition key value
pub fn validate_document<'a>(document: &'a Value, path: &str) -> Result<(&'a str, &'a Value)> {
    if !document.is_object() {
        return Err(GatewayError::InvalidArgument(
            "Request body must be a JSON object.".to_string(),
        ));
    }

    let id = document
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| GatewayError::missing("Missing 'id' in document."))?;
    validate_id(id)?;

    let key = partition_key_value(document, path).ok_or_else(|| {
        GatewayError::missing(format!(
            "Missing partition key '{}' in document.",
            path.trim_start_matches('/')
        ))
    })?;

    Ok((id, key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_partition_key_value() {
        let doc = json!({"id": "1", "category": "books", "address": {"city": "Oslo"}});
        assert_eq!(partition_key_value(&doc, "/category"), Some(&json!("books")));
        assert_eq!(partition_key_value(&doc, "/address/city"), Some(&json!("Oslo")));
        assert_eq!(partition_key_value(&doc, "/missing"), None);

        let null_key = json!({"id": "1", "category": null});
        assert_eq!(partition_key_value(&null_key, "/category"), None);
    }

    #[test]
    fn test_validate_document() {
        let doc = json!({"id": "42", "category": "books"});
        let (id, key) = validate_document(&doc, "/category").unwrap();
        assert_eq!(id, "42");
        assert_eq!(key, &json!("books"));

        let err = validate_document(&json!({"category": "books"}), "/category").unwrap_err();
        assert!(err.to_string().contains("Missing 'id'"));

        let err = validate_document(&json!({"id": "42"}), "/category").unwrap_err();
        assert!(err.to_string().contains("'category'"));

        let err = validate_document(&json!([1, 2]), "/category").unwrap_err();
        assert!(matches!(err, GatewayError::InvalidArgument(_)));

        let err = validate_document(&json!({"id": "a/b", "category": "books"}), "/category")
            .unwrap_err();
        assert!(err.to_string().contains("Invalid document id"));
    }

    #[test]
    fn test_validate_id() {
        assert!(validate_id("42").is_ok());
        assert!(validate_id("a b%c").is_ok());
        for id in ["a/b", "../x", "a\\b", "a?b", "a#b", ".", ".."] {
            let err = validate_id(id).unwrap_err();
            assert!(matches!(err, GatewayError::InvalidArgument(_)), "{}", id);
        }
    }
}
