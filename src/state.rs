//! Process-wide daemon state, constructed once at startup and shared by `Arc`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use url::Url;

use crate::backends::{
    AutomationServer, BackendError, CloudProvider, ConfigPersistence, Credential, HttpVault,
    RestClient, VaultRung, WireguardControl,
};
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::keyring::{KeyStore, Keyring};
use crate::topology::TopologyStore;

/// Everything request handlers operate on.
pub struct DaemonState {
    pub config: DaemonConfig,
    pub keyring: Arc<Keyring>,
    pub topology: Arc<TopologyStore>,
    pub persistence: Arc<dyn ConfigPersistence>,
    pub wireguard: Arc<dyn WireguardControl>,
    cloud: Option<Arc<dyn CloudProvider>>,
    automation: Option<Arc<dyn AutomationServer>>,
    vault_attached: AtomicBool,
    started_at: Instant,
}

impl DaemonState {
    pub fn new(
        config: DaemonConfig,
        keyring: Arc<Keyring>,
        topology: Arc<TopologyStore>,
        persistence: Arc<dyn ConfigPersistence>,
        wireguard: Arc<dyn WireguardControl>,
    ) -> Self {
        Self {
            config,
            keyring,
            topology,
            persistence,
            wireguard,
            cloud: None,
            automation: None,
            vault_attached: AtomicBool::new(false),
            started_at: Instant::now(),
        }
    }

    pub fn with_cloud(mut self, cloud: Arc<dyn CloudProvider>) -> Self {
        self.cloud = Some(cloud);
        self
    }

    pub fn with_automation(mut self, automation: Arc<dyn AutomationServer>) -> Self {
        self.automation = Some(automation);
        self
    }

    pub fn cloud(&self) -> DaemonResult<&Arc<dyn CloudProvider>> {
        self.cloud
            .as_ref()
            .ok_or(DaemonError::Backend(BackendError::NotConfigured("cloud")))
    }

    pub fn automation(&self) -> DaemonResult<&Arc<dyn AutomationServer>> {
        self.automation
            .as_ref()
            .ok_or(DaemonError::Backend(BackendError::NotConfigured("automation")))
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn vault_attached(&self) -> bool {
        self.vault_attached.load(Ordering::SeqCst)
    }

    /// Resolve the vault's bootstrap credential through the keyring itself and
    /// append the vault as the keyring's last rung.
    ///
    /// Returns false if the vault was already attached.
    pub async fn bootstrap_vault(&self) -> DaemonResult<bool> {
        let backends = &self.config.backends;
        let url = backends
            .vault_url
            .as_deref()
            .ok_or(DaemonError::Backend(BackendError::NotConfigured("vault")))?;
        let url = Url::parse(url).map_err(|e| DaemonError::validation(format!("vault_url: {e}")))?;

        if self.vault_attached() {
            return Ok(false);
        }

        let bootstrap = self.keyring.get_key(&backends.vault_credential).await?;
        let client = RestClient::new(
            "vault",
            url,
            Credential::Fixed(bootstrap),
            Duration::from_secs(backends.timeout_secs),
        )?;

        // Two concurrent bootstraps may both resolve the credential; only one attaches.
        if self.vault_attached.swap(true, Ordering::SeqCst) {
            return Ok(false);
        }
        self.keyring
            .push_rung(Arc::new(VaultRung::new(HttpVault::new(client))));
        tracing::info!(credential = %backends.vault_credential, "Vault rung attached");
        Ok(true)
    }
}

impl std::fmt::Debug for DaemonState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DaemonState")
            .field("socket", &self.config.listener.socket_path)
            .field("network", &self.topology.network())
            .field("persistence", &self.persistence.describe())
            .field("cloud", &self.cloud.is_some())
            .field("automation", &self.automation.is_some())
            .field("vault_attached", &self.vault_attached())
            .finish()
    }
}
