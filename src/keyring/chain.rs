//! Cache-fronted credential chain.
//!
//! # Responsibilities
//! - Serve cached credentials without touching any backend
//! - On a miss, walk the rungs in registration order; first success wins
//! - Report a rung failure when no rung resolves the name, so a backend
//!   outage is not mistaken for a missing key
//! - Commit resolved credentials to the cache before returning them
//!
//! # Design Decisions
//! - Cache locking is per-entry (DashMap); no lock is held across a rung call
//! - Two callers resolving the same name concurrently may both hit a rung;
//!   the first value committed to the cache is the one both return
//! - Writes (`add_key`/`remove_key`) touch the cache only

use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;

use crate::keyring::error::{KeyringError, KeyringResult};
use crate::keyring::key::SharedKey;
use crate::observability::metrics;

/// Anything that can resolve, store and evict named credentials.
///
/// The keyring itself implements this, so a rung can be a whole sub-keyring.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Label for logs and metrics.
    fn label(&self) -> &str;

    async fn get_key(&self, name: &str) -> KeyringResult<SharedKey>;

    async fn add_key(&self, name: &str, key: SharedKey) -> KeyringResult<()>;

    async fn remove_key(&self, name: &str) -> KeyringResult<()>;
}

/// Listing entry; never carries secret material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeySummary {
    pub name: String,
    pub kind: &'static str,
    pub public: String,
}

/// A credential cache plus an ordered chain of fallback rungs.
pub struct Keyring {
    label: String,
    cache: DashMap<String, SharedKey>,
    rungs: RwLock<Vec<Arc<dyn KeyStore>>>,
}

impl Keyring {
    /// Create an empty keyring with no rungs.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            cache: DashMap::new(),
            rungs: RwLock::new(Vec::new()),
        }
    }

    /// Builder form of [`Keyring::push_rung`].
    pub fn with_rung(self, rung: Arc<dyn KeyStore>) -> Self {
        self.push_rung(rung);
        self
    }

    /// Append a rung to the end of the chain.
    pub fn push_rung(&self, rung: Arc<dyn KeyStore>) {
        tracing::info!(keyring = %self.label, rung = %rung.label(), "Keyring rung registered");
        self.rungs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(rung);
    }

    /// Number of registered rungs.
    pub fn rung_count(&self) -> usize {
        self.rungs.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Rung labels in resolution order.
    pub fn rung_labels(&self) -> Vec<String> {
        self.rung_snapshot()
            .iter()
            .map(|rung| rung.label().to_string())
            .collect()
    }

    /// True if `name` is currently cached.
    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }

    /// Summaries of every cached credential, sorted by name.
    pub fn list(&self) -> Vec<KeySummary> {
        let mut keys: Vec<KeySummary> = self
            .cache
            .iter()
            .map(|entry| KeySummary {
                name: entry.key().clone(),
                kind: entry.value().kind(),
                public: entry.value().public(),
            })
            .collect();
        keys.sort_by(|a, b| a.name.cmp(&b.name));
        keys
    }

    /// Evict every cached credential. Returns how many were dropped.
    pub fn clear_cache(&self) -> usize {
        let count = self.cache.len();
        self.cache.clear();
        tracing::info!(keyring = %self.label, evicted = count, "Keyring cache cleared");
        count
    }

    fn rung_snapshot(&self) -> Vec<Arc<dyn KeyStore>> {
        self.rungs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl KeyStore for Keyring {
    fn label(&self) -> &str {
        &self.label
    }

    async fn get_key(&self, name: &str) -> KeyringResult<SharedKey> {
        if let Some(entry) = self.cache.get(name) {
            metrics::record_key_resolution("cache");
            return Ok(entry.value().clone());
        }

        let mut failure = None;
        for rung in self.rung_snapshot() {
            match rung.get_key(name).await {
                Ok(key) => {
                    let key = self
                        .cache
                        .entry(name.to_string())
                        .or_insert(key)
                        .value()
                        .clone();
                    tracing::debug!(keyring = %self.label, key = %name, rung = %rung.label(), "Key resolved");
                    metrics::record_key_resolution(rung.label());
                    return Ok(key);
                }
                Err(KeyringError::KeyNotFound(_)) => {
                    tracing::trace!(keyring = %self.label, key = %name, rung = %rung.label(), "Rung miss");
                }
                Err(e) => {
                    tracing::warn!(
                        keyring = %self.label,
                        key = %name,
                        rung = %rung.label(),
                        error = %e,
                        "Rung failed, trying next"
                    );
                    failure = Some(e);
                }
            }
        }

        Err(failure.unwrap_or_else(|| KeyringError::KeyNotFound(name.to_string())))
    }

    async fn add_key(&self, name: &str, key: SharedKey) -> KeyringResult<()> {
        match self.cache.entry(name.to_string()) {
            Entry::Occupied(_) => Err(KeyringError::KeyExists(name.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(key);
                tracing::info!(keyring = %self.label, key = %name, "Key added to cache");
                Ok(())
            }
        }
    }

    async fn remove_key(&self, name: &str) -> KeyringResult<()> {
        self.get_key(name).await?;
        self.cache.remove(name);
        tracing::info!(keyring = %self.label, key = %name, "Key evicted from cache");
        Ok(())
    }
}
