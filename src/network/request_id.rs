//! Per-request correlation id
//!
//! The web layer runs each handler inside [`scope`]; outbound calls made
//! from that task pick the id up through [`current`].

use std::future::Future;

tokio::task_local! {
    static REQUEST_ID: String;
}

/// Run `fut` with `id` as the current request id
pub async fn scope<F: Future>(id: String, fut: F) -> F::Output {
    REQUEST_ID.scope(id, fut).await
}

/// Request id of the running task, if any
pub fn current() -> Option<String> {
    REQUEST_ID.try_with(|id| id.clone()).ok()
}

/// Generate a new request id
pub fn generate() -> String {
    uuid::Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scope_and_current() {
        assert!(current().is_none());
        let seen = scope("abc".to_string(), async { current() }).await;
        assert_eq!(seen.as_deref(), Some("abc"));
        assert!(current().is_none());
    }

    #[test]
    fn test_generate_is_unique() {
        assert_ne!(generate(), generate());
    }
}
