//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the daemon.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::topology::entity::DEFAULT_WIREGUARD_PORT;

/// Root configuration for the daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DaemonConfig {
    /// Unix socket settings.
    pub listener: ListenerConfig,

    /// VPN address space.
    pub network: NetworkConfig,

    /// Where the topology is persisted.
    pub persistence: PersistenceConfig,

    /// Local credential sources.
    pub keyring: KeyringConfig,

    /// External collaborators.
    pub backends: BackendsConfig,

    /// WireGuard interface rendering and control.
    pub wireguard: WireguardConfig,

    /// Logging settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Socket path; a stale file here is removed before binding.
    pub socket_path: PathBuf,

    /// Permission bits applied to the socket file.
    pub socket_mode: u32,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    pub read_timeout_secs: u64,

    pub write_timeout_secs: u64,

    /// Upper bound on a single frame, header included.
    pub max_frame_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from("/tmp/yosaid.sock"),
            socket_mode: 0o600,
            max_connections: 256,
            read_timeout_secs: 10,
            write_timeout_secs: 10,
            max_frame_bytes: 16 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// VPN block, e.g. "10.8.0.0/24".
    pub cidr: String,

    /// Listen port for servers registered without one.
    pub wireguard_port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cidr: "10.8.0.0/24".to_string(),
            wireguard_port: DEFAULT_WIREGUARD_PORT,
        }
    }
}

/// Topology persistence. `config_server_url` takes precedence over `state_path`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub state_path: PathBuf,

    /// Remote config server base URL.
    pub config_server_url: Option<String>,

    /// Keyring name of the config server credential.
    pub config_server_credential: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from("/var/lib/yosai/topology.json"),
            config_server_url: None,
            config_server_credential: "config-server".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KeyringConfig {
    /// Optional JSON key file rung.
    pub key_file: Option<PathBuf>,

    /// Prefix for environment variable lookups.
    pub env_prefix: String,
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            key_file: None,
            env_prefix: "YOSAI_KEY_".to_string(),
        }
    }
}

/// External collaborators. A collaborator without a URL is disabled.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendsConfig {
    /// Outbound request timeout.
    pub timeout_secs: u64,

    pub vault_url: Option<String>,
    /// Keyring name of the vault bootstrap credential.
    pub vault_credential: String,

    pub cloud_url: Option<String>,
    pub cloud_credential: String,

    pub automation_url: Option<String>,
    pub automation_credential: String,
    pub automation_project: u64,
    /// Keyring name of the SSH keypair pushed to automation hosts.
    pub automation_ssh_key: String,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 15,
            vault_url: None,
            vault_credential: "vault".to_string(),
            cloud_url: None,
            cloud_credential: "cloud".to_string(),
            automation_url: None,
            automation_credential: "automation".to_string(),
            automation_project: 1,
            automation_ssh_key: "automation-ssh".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WireguardConfig {
    pub interface: String,

    /// Directory receiving `<interface>.conf`.
    pub config_dir: PathBuf,

    /// Keyring name holding the server private key.
    pub private_key: String,

    /// Server whose address the interface uses; defaults to the first one.
    pub server: Option<String>,

    /// Control program, normally `wg-quick`.
    pub program: String,
}

impl Default for WireguardConfig {
    fn default() -> Self {
        Self {
            interface: "wg0".to_string(),
            config_dir: PathBuf::from("/etc/wireguard"),
            private_key: "wireguard".to_string(),
            server: None,
            program: "wg-quick".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Emit JSON log lines.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
