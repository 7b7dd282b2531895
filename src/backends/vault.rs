//! Secrets vault collaborator, usable as a keyring rung.

use async_trait::async_trait;

use crate::backends::error::{BackendError, BackendResult};
use crate::backends::http::RestClient;
use crate::keyring::{Key, KeyStore, KeyringError, KeyringResult, SharedKey, VaultItem};

/// Secrets backend contract.
#[async_trait]
pub trait SecretsBackend: Send + Sync {
    async fn get_secret(&self, path: &str) -> BackendResult<VaultItem>;

    async fn put_secret(&self, path: &str, item: &VaultItem) -> BackendResult<()>;

    async fn delete_secret(&self, path: &str) -> BackendResult<()>;
}

/// Vault REST client: `GET|PUT|DELETE <base>/secrets/<path>`.
#[derive(Debug, Clone)]
pub struct HttpVault {
    client: RestClient,
}

impl HttpVault {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SecretsBackend for HttpVault {
    async fn get_secret(&self, path: &str) -> BackendResult<VaultItem> {
        self.client.get_json(&["secrets", path]).await
    }

    async fn put_secret(&self, path: &str, item: &VaultItem) -> BackendResult<()> {
        self.client.put_json(&["secrets", path], item).await
    }

    async fn delete_secret(&self, path: &str) -> BackendResult<()> {
        self.client.delete(&["secrets", path]).await
    }
}

/// Keyring rung backed by a [`SecretsBackend`]; the key name is the secret path.
pub struct VaultRung<S> {
    secrets: S,
}

impl<S: SecretsBackend> VaultRung<S> {
    pub fn new(secrets: S) -> Self {
        Self { secrets }
    }
}

fn keyring_error(name: &str, err: BackendError) -> KeyringError {
    match err {
        BackendError::NotFound { .. } => KeyringError::KeyNotFound(name.to_string()),
        other => KeyringError::Backend(other),
    }
}

fn to_item(name: &str, key: &dyn Key) -> VaultItem {
    VaultItem {
        id: name.to_string(),
        username: key.public(),
        password: key.secret(),
        fields: Default::default(),
    }
}

#[async_trait]
impl<S: SecretsBackend> KeyStore for VaultRung<S> {
    fn label(&self) -> &str {
        "vault"
    }

    async fn get_key(&self, name: &str) -> KeyringResult<SharedKey> {
        let item = self
            .secrets
            .get_secret(name)
            .await
            .map_err(|e| keyring_error(name, e))?;
        Ok(std::sync::Arc::new(item))
    }

    async fn add_key(&self, name: &str, key: SharedKey) -> KeyringResult<()> {
        self.secrets
            .put_secret(name, &to_item(name, key.as_ref()))
            .await
            .map_err(|e| keyring_error(name, e))
    }

    async fn remove_key(&self, name: &str) -> KeyringResult<()> {
        self.secrets
            .delete_secret(name)
            .await
            .map_err(|e| keyring_error(name, e))
    }
}
