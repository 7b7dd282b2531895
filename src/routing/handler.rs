//! Handler trait and the closure adapter used to register handlers.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::DaemonResult;
use crate::protocol::{Message, StatusCode};

/// Status and body produced by a successful handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn ok(body: Vec<u8>) -> Self {
        Self {
            status: StatusCode::Ok,
            body,
        }
    }

    pub fn json<T: Serialize>(value: &T) -> DaemonResult<Self> {
        Ok(Self::ok(serde_json::to_vec(value)?))
    }

    /// Work was started but has not finished; the body says how to follow it.
    pub fn accepted<T: Serialize>(value: &T) -> DaemonResult<Self> {
        Ok(Self {
            status: StatusCode::Accepted,
            body: serde_json::to_vec(value)?,
        })
    }
}

/// One operation on one target.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, request: Message) -> DaemonResult<Reply>;
}

/// Handler built from an async function over shared state.
pub struct FnHandler<S, F> {
    state: Arc<S>,
    f: F,
}

#[async_trait]
impl<S, F, Fut> Handler for FnHandler<S, F>
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>, Message) -> Fut + Send + Sync,
    Fut: Future<Output = DaemonResult<Reply>> + Send,
{
    async fn call(&self, request: Message) -> DaemonResult<Reply> {
        (self.f)(Arc::clone(&self.state), request).await
    }
}

/// Wrap `f` so it receives a clone of `state` on every call.
pub fn with_state<S, F, Fut>(state: &Arc<S>, f: F) -> Arc<dyn Handler>
where
    S: Send + Sync + 'static,
    F: Fn(Arc<S>, Message) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = DaemonResult<Reply>> + Send + 'static,
{
    Arc::new(FnHandler {
        state: Arc::clone(state),
        f,
    })
}
