//! VPN servers, clients and the persisted topology snapshot.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::topology::network::NetworkBlock;

/// Default WireGuard listen port.
pub const DEFAULT_WIREGUARD_PORT: u16 = 51820;

/// A WireGuard endpoint host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnServer {
    pub name: String,
    pub vpn_address: Ipv4Addr,
    /// Public address peers dial (IP or hostname).
    pub wan_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_WIREGUARD_PORT
}

/// A WireGuard peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnClient {
    pub name: String,
    pub vpn_address: Ipv4Addr,
    pub public_key: String,
    #[serde(default)]
    pub is_default: bool,
}

/// Entity kinds that carry a label and an address.
pub(crate) trait Addressed {
    const KIND: &'static str;
    fn label(&self) -> &str;
    fn address(&self) -> Ipv4Addr;
}

impl Addressed for VpnServer {
    const KIND: &'static str = "server";

    fn label(&self) -> &str {
        &self.name
    }

    fn address(&self) -> Ipv4Addr {
        self.vpn_address
    }
}

impl Addressed for VpnClient {
    const KIND: &'static str = "client";

    fn label(&self) -> &str {
        &self.name
    }

    fn address(&self) -> Ipv4Addr {
        self.vpn_address
    }
}

/// Everything needed to rebuild the topology; the persisted form.
///
/// Map keys are storage keys and may differ from the entity's own `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub network: NetworkBlock,
    #[serde(default)]
    pub servers: BTreeMap<String, VpnServer>,
    #[serde(default)]
    pub clients: BTreeMap<String, VpnClient>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_parses_persisted_form() {
        let raw = r#"{
            "network": "10.8.0.0/24",
            "servers": {
                "edge": {"name": "edge", "vpn_address": "10.8.0.1", "wan_address": "203.0.113.7"}
            },
            "clients": {
                "laptop": {"name": "laptop", "vpn_address": "10.8.0.2", "public_key": "pk="}
            }
        }"#;
        let snapshot: TopologySnapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snapshot.servers["edge"].port, DEFAULT_WIREGUARD_PORT);
        assert!(!snapshot.clients["laptop"].is_default);
    }

    #[test]
    fn test_snapshot_rejects_bad_address() {
        let raw = r#"{
            "network": "10.8.0.0/24",
            "clients": {"x": {"name": "x", "vpn_address": "10.8.0.300", "public_key": "pk"}}
        }"#;
        assert!(serde_json::from_str::<TopologySnapshot>(raw).is_err());
    }
}
