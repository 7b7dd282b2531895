//! Topology persistence: a local JSON file or a remote config server.
//!
//! # Responsibilities
//! - `propagate`: load the persisted snapshot into the live store
//! - `save`: write the live store's snapshot back out
//!
//! # Design Decisions
//! - Both implementations exchange the same `TopologySnapshot` JSON document
//! - File writes go to a sibling temp file first, then rename

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::backends::error::{BackendError, BackendResult};
use crate::backends::http::RestClient;
use crate::error::DaemonResult;
use crate::topology::{TopologySnapshot, TopologyStore};

/// Configuration persistence contract.
#[async_trait]
pub trait ConfigPersistence: Send + Sync {
    /// Short description for logs.
    fn describe(&self) -> String;

    /// Fetch the persisted snapshot, `None` if nothing has been saved yet.
    async fn load(&self) -> BackendResult<Option<TopologySnapshot>>;

    /// Replace the persisted snapshot.
    async fn store(&self, snapshot: &TopologySnapshot) -> BackendResult<()>;

    /// Load the persisted state into `topology`. Returns false if there was none.
    async fn propagate(&self, topology: &TopologyStore) -> DaemonResult<bool> {
        match self.load().await? {
            Some(snapshot) => {
                let servers = snapshot.servers.len();
                let clients = snapshot.clients.len();
                topology.restore(snapshot)?;
                tracing::info!(source = %self.describe(), servers, clients, "Topology loaded");
                Ok(true)
            }
            None => {
                tracing::info!(source = %self.describe(), "No persisted topology, starting empty");
                Ok(false)
            }
        }
    }

    /// Persist the current state of `topology`.
    async fn save(&self, topology: &TopologyStore) -> DaemonResult<()> {
        let snapshot = topology.snapshot();
        self.store(&snapshot).await?;
        tracing::info!(
            target_store = %self.describe(),
            servers = snapshot.servers.len(),
            clients = snapshot.clients.len(),
            "Topology saved"
        );
        Ok(())
    }
}

/// JSON file on local disk.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ConfigPersistence for FileConfigStore {
    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }

    async fn load(&self) -> BackendResult<Option<TopologySnapshot>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| BackendError::Decode {
                service: "persistence",
                reason: format!("{}: {e}", self.path.display()),
            })
    }

    async fn store(&self, snapshot: &TopologySnapshot) -> BackendResult<()> {
        let json = serde_json::to_vec_pretty(snapshot).map_err(|e| BackendError::Decode {
            service: "persistence",
            reason: e.to_string(),
        })?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Remote config server: `GET|PUT <base>/topology`.
#[derive(Debug, Clone)]
pub struct HttpConfigStore {
    client: RestClient,
}

impl HttpConfigStore {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ConfigPersistence for HttpConfigStore {
    fn describe(&self) -> String {
        format!("{}:topology", self.client.service())
    }

    async fn load(&self) -> BackendResult<Option<TopologySnapshot>> {
        match self.client.get_json(&["topology"]).await {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(BackendError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn store(&self, snapshot: &TopologySnapshot) -> BackendResult<()> {
        self.client.put_json(&["topology"], snapshot).await
    }
}
