//! Target/method lookup and dispatch.
//!
//! # Responsibilities
//! - Store handlers keyed by target, then method
//! - Dispatch a decoded request and always produce a response message
//! - Turn handler errors into non-OK responses
//!
//! # Design Decisions
//! - Built once at startup, immutable at runtime (thread-safe without locks)
//! - O(1) lookup via two nested HashMaps
//! - Explicit REQUEST_UNRESOLVED rather than a silent default

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::observability::metrics;
use crate::protocol::{Message, StatusCode, PROTOCOL_VERSION};
use crate::routing::handler::Handler;

#[derive(Default)]
pub struct Router {
    routes: HashMap<String, HashMap<String, Arc<dyn Handler>>>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `target`/`method`. A later registration for the
    /// same pair replaces the earlier one.
    pub fn register(
        &mut self,
        target: impl Into<String>,
        method: impl Into<String>,
        handler: Arc<dyn Handler>,
    ) -> &mut Self {
        let (target, method) = (target.into(), method.into());
        let previous = self
            .routes
            .entry(target.clone())
            .or_default()
            .insert(method.clone(), handler);
        if previous.is_some() {
            tracing::debug!(target_name = %target, method = %method, "Route replaced");
        }
        self
    }

    pub fn contains(&self, target: &str, method: &str) -> bool {
        self.lookup(target, method).is_some()
    }

    /// Registered methods for `target`, sorted.
    pub fn methods(&self, target: &str) -> Vec<&str> {
        let mut methods: Vec<&str> = self
            .routes
            .get(target)
            .map(|m| m.keys().map(String::as_str).collect())
            .unwrap_or_default();
        methods.sort_unstable();
        methods
    }

    /// Registered targets, sorted.
    pub fn targets(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = self.routes.keys().map(String::as_str).collect();
        targets.sort_unstable();
        targets
    }

    fn lookup(&self, target: &str, method: &str) -> Option<Arc<dyn Handler>> {
        self.routes.get(target)?.get(method).cloned()
    }

    /// Route `request` to its handler and build the response.
    pub async fn dispatch(&self, request: Message) -> Message {
        let start = Instant::now();
        let echo = request.without_body();

        tracing::debug!(
            target_name = %echo.target,
            method = %echo.method,
            body_len = request.body.len(),
            "Dispatching request"
        );

        let response = if request.version != PROTOCOL_VERSION {
            echo.error_reply(
                StatusCode::Failed,
                format!(
                    "unsupported protocol version {} (daemon speaks {})",
                    request.version, PROTOCOL_VERSION
                ),
            )
        } else {
            match self.lookup(&echo.target, &echo.method) {
                None => self.unresolved(&echo),
                Some(handler) => match handler.call(request).await {
                    Ok(reply) => echo.reply(reply.status, reply.body),
                    Err(err) => {
                        tracing::warn!(
                            target_name = %echo.target,
                            method = %echo.method,
                            error = %err,
                            "Handler failed"
                        );
                        echo.error_reply(err.status_code(), &err)
                    }
                },
            }
        };

        metrics::record_request(&echo.target, &echo.method, response.status, start);
        tracing::info!(
            target_name = %echo.target,
            method = %echo.method,
            status = %response.status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Request handled"
        );
        response
    }

    fn unresolved(&self, echo: &Message) -> Message {
        tracing::warn!(target_name = %echo.target, method = %echo.method, "No route for request");
        let body = if self.routes.contains_key(&echo.target) {
            serde_json::json!({
                "error": format!("target '{}' has no method '{}'", echo.target, echo.method),
                "methods": self.methods(&echo.target),
            })
        } else {
            serde_json::json!({
                "error": format!("unknown target '{}'", echo.target),
                "targets": self.targets(),
            })
        };
        echo.reply(StatusCode::Unresolved, body.to_string().into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DaemonError, DaemonResult};
    use crate::keyring::KeyringError;
    use crate::routing::handler::{with_state, Reply};
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn echo_body(_: Arc<()>, request: Message) -> DaemonResult<Reply> {
        Ok(Reply::ok(request.body))
    }

    async fn constant(_: Arc<()>, _: Message) -> DaemonResult<Reply> {
        Ok(Reply::ok(b"second".to_vec()))
    }

    async fn failing(_: Arc<()>, _: Message) -> DaemonResult<Reply> {
        Err(DaemonError::from(KeyringError::KeyNotFound("cloud".into())))
    }

    fn router() -> Router {
        let state = Arc::new(());
        let mut router = Router::new();
        router
            .register("config", "show", with_state(&state, echo_body))
            .register("keyring", "show", with_state(&state, failing));
        router
    }

    #[tokio::test]
    async fn test_dispatch_to_handler() {
        let response = router()
            .dispatch(Message::request("config", "show", b"{}".to_vec()))
            .await;
        assert_eq!(response.status, StatusCode::Ok);
        assert_eq!(response.body, b"{}");
        assert_eq!(response.target, "config");
        assert_eq!(response.method, "show");
    }

    #[tokio::test]
    async fn test_last_registration_wins() {
        let state = Arc::new(());
        let mut router = router();
        router.register("config", "show", with_state(&state, constant));

        let response = router.dispatch(Message::request("config", "show", vec![])).await;
        assert_eq!(response.body, b"second");
    }

    #[tokio::test]
    async fn test_unknown_pairs_unresolved() {
        let router = router();

        let response = router.dispatch(Message::request("config", "explode", vec![])).await;
        assert_eq!(response.status, StatusCode::Unresolved);
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["methods"], serde_json::json!(["show"]));

        let response = router.dispatch(Message::request("nope", "show", vec![])).await;
        assert_eq!(response.status, StatusCode::Unresolved);
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["targets"], serde_json::json!(["config", "keyring"]));
    }

    #[tokio::test]
    async fn test_handler_error_becomes_response() {
        let response = router().dispatch(Message::request("keyring", "show", vec![])).await;
        assert_eq!(response.status, StatusCode::Failed);
        let body: serde_json::Value = response.json().unwrap();
        assert_eq!(body["error"], "key not found: cloud");
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        let mut request = Message::request("config", "show", vec![]);
        request.version = PROTOCOL_VERSION + 1;
        let response = router().dispatch(request).await;
        assert_eq!(response.status, StatusCode::Failed);
    }

    #[tokio::test]
    async fn test_handlers_share_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut router = Router::new();
        router.register(
            "daemon",
            "count",
            with_state(&calls, |calls: Arc<AtomicUsize>, _| async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Reply::json(&n)
            }),
        );

        for _ in 0..3 {
            router.dispatch(Message::request("daemon", "count", vec![])).await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
