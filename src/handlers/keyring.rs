//! `keyring` target: list, add, evict and bootstrap credentials.

use std::sync::Arc;

use serde::Deserialize;

use crate::error::DaemonResult;
use crate::handlers::{body, optional_body};
use crate::keyring::{KeySpec, KeyStore, KeySummary};
use crate::protocol::Message;
use crate::routing::Reply;
use crate::state::DaemonState;

#[derive(Debug, Default, Deserialize)]
struct ShowRequest {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddRequest {
    name: String,
    key: KeySpec,
}

#[derive(Debug, Deserialize)]
struct NameRequest {
    name: String,
}

/// Without a name: every cached credential. With one: resolve it through the
/// chain and describe it. Secrets are never returned.
pub async fn show(state: Arc<DaemonState>, request: Message) -> DaemonResult<Reply> {
    let query: ShowRequest = optional_body(&request)?;
    match query.name {
        Some(name) => {
            let key = state.keyring.get_key(&name).await?;
            Reply::json(&KeySummary {
                name,
                kind: key.kind(),
                public: key.public(),
            })
        }
        None => Reply::json(&serde_json::json!({
            "keys": state.keyring.list(),
            "rungs": state.keyring.rung_labels(),
        })),
    }
}

pub async fn add(state: Arc<DaemonState>, request: Message) -> DaemonResult<Reply> {
    let req: AddRequest = body(&request)?;
    let key = req.key.into_key();
    let kind = key.kind();
    state.keyring.add_key(&req.name, key).await?;
    tracing::info!(name = %req.name, kind, "Key added to cache");
    Reply::json(&serde_json::json!({ "name": req.name, "kind": kind }))
}

pub async fn delete(state: Arc<DaemonState>, request: Message) -> DaemonResult<Reply> {
    let req: NameRequest = body(&request)?;
    state.keyring.remove_key(&req.name).await?;
    Reply::json(&serde_json::json!({ "removed": req.name }))
}

/// Evict the whole cache so the next lookups go back to the rungs.
pub async fn reload(state: Arc<DaemonState>, _request: Message) -> DaemonResult<Reply> {
    let evicted = state.keyring.clear_cache();
    Reply::json(&serde_json::json!({ "evicted": evicted }))
}

pub async fn bootstrap(state: Arc<DaemonState>, _request: Message) -> DaemonResult<Reply> {
    let attached = state.bootstrap_vault().await?;
    Reply::json(&serde_json::json!({
        "attached": attached,
        "rungs": state.keyring.rung_labels(),
    }))
}
