//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the keyring with its local rungs
//! - Build the topology and load whatever was persisted
//! - Connect the optional collaborators named in the config
//!
//! # Design Decisions
//! - Fail fast: a bad network block or unreadable snapshot is fatal
//! - Collaborators hold keyring references, not secrets; nothing is resolved here
//! - The vault rung is attached later, on `keyring bootstrap`

use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::backends::{
    ConfigPersistence, Credential, FileConfigStore, HttpAutomation, HttpCloud, HttpConfigStore,
    RestClient, WgQuick,
};
use crate::config::DaemonConfig;
use crate::error::{DaemonError, DaemonResult};
use crate::keyring::{EnvRung, FileRung, KeyStore, Keyring};
use crate::state::DaemonState;
use crate::topology::{NetworkBlock, TopologyStore};

fn client(
    service: &'static str,
    url: &str,
    keyring: &Arc<Keyring>,
    credential: &str,
    timeout: Duration,
) -> DaemonResult<RestClient> {
    let url = Url::parse(url).map_err(|e| DaemonError::validation(format!("{service} url: {e}")))?;
    let keyring: Arc<dyn KeyStore> = Arc::clone(keyring) as Arc<dyn KeyStore>;
    let credential = Credential::Keyring {
        keyring,
        name: credential.to_string(),
    };
    Ok(RestClient::new(service, url, credential, timeout)?)
}

fn build_keyring(config: &DaemonConfig) -> Arc<Keyring> {
    let keyring = Keyring::new("daemon").with_rung(Arc::new(EnvRung::new(&config.keyring.env_prefix)));
    let keyring = match &config.keyring.key_file {
        Some(path) => keyring.with_rung(Arc::new(FileRung::new(path.clone()))),
        None => keyring,
    };
    Arc::new(keyring)
}

/// Assemble the shared daemon state from `config`.
pub async fn build_state(config: DaemonConfig) -> DaemonResult<Arc<DaemonState>> {
    let keyring = build_keyring(&config);

    let network: NetworkBlock = config.network.cidr.parse()?;
    let topology = Arc::new(TopologyStore::new(network));

    let timeout = Duration::from_secs(config.backends.timeout_secs);
    let persistence: Arc<dyn ConfigPersistence> = match &config.persistence.config_server_url {
        Some(url) => Arc::new(HttpConfigStore::new(client(
            "config-server",
            url,
            &keyring,
            &config.persistence.config_server_credential,
            timeout,
        )?)),
        None => Arc::new(FileConfigStore::new(config.persistence.state_path.clone())),
    };
    persistence.propagate(&topology).await?;
    let (total, free) = topology.pool_stats();
    tracing::info!(network = %network, total, free, "Address pool ready");

    let backends = &config.backends;
    let cloud = match &backends.cloud_url {
        Some(url) => Some(HttpCloud::new(client(
            "cloud",
            url,
            &keyring,
            &backends.cloud_credential,
            timeout,
        )?)),
        None => None,
    };
    let automation = match &backends.automation_url {
        Some(url) => Some(HttpAutomation::new(
            client("automation", url, &keyring, &backends.automation_credential, timeout)?,
            backends.automation_project,
        )),
        None => None,
    };

    let wireguard = Arc::new(WgQuick::new(config.wireguard.program.clone()));
    let mut state = DaemonState::new(config, keyring, topology, persistence, wireguard);
    if let Some(cloud) = cloud {
        state = state.with_cloud(Arc::new(cloud));
    }
    if let Some(automation) = automation {
        state = state.with_automation(Arc::new(automation));
    }

    tracing::info!(
        rungs = ?state.keyring.rung_labels(),
        persistence = %state.persistence.describe(),
        "Daemon state initialized"
    );
    Ok(Arc::new(state))
}
