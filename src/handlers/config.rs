//! `config` target: the VPN topology.

use std::net::Ipv4Addr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{DaemonError, DaemonResult};
use crate::handlers::{body, optional_body};
use crate::protocol::Message;
use crate::routing::Reply;
use crate::state::DaemonState;
use crate::topology::{NetworkBlock, TopologyStore, VpnClient, VpnServer};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Server,
    Client,
}

#[derive(Debug, Default, Deserialize)]
struct ShowRequest {
    kind: Option<EntityKind>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum AddRequest {
    Server {
        name: String,
        wan_address: String,
        #[serde(default)]
        port: Option<u16>,
        #[serde(default)]
        address: Option<String>,
    },
    Client {
        name: String,
        public_key: String,
        #[serde(default)]
        address: Option<String>,
    },
}

#[derive(Debug, Deserialize)]
struct EntityRef {
    kind: EntityKind,
    name: String,
}

#[derive(Debug, Deserialize)]
struct SetNetworkRequest {
    cidr: String,
}

#[derive(Debug, Serialize)]
pub struct PoolStats {
    pub total: usize,
    pub free: usize,
}

#[derive(Debug, Serialize)]
struct Overview {
    network: NetworkBlock,
    pool: PoolStats,
    servers: Vec<VpnServer>,
    clients: Vec<VpnClient>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Added {
    pub kind: EntityKind,
    pub name: String,
    pub address: Ipv4Addr,
}

pub(crate) fn pool_stats(topology: &TopologyStore) -> PoolStats {
    let (total, free) = topology.pool_stats();
    PoolStats { total, free }
}

fn parse_address(raw: &str) -> DaemonResult<Ipv4Addr> {
    raw.trim()
        .parse()
        .map_err(|_| DaemonError::validation(format!("'{raw}' is not an IPv4 address")))
}

fn requested_address(raw: Option<&str>) -> DaemonResult<Option<Ipv4Addr>> {
    raw.map(parse_address).transpose()
}

pub async fn show(state: Arc<DaemonState>, request: Message) -> DaemonResult<Reply> {
    let query: ShowRequest = optional_body(&request)?;
    let topology = &state.topology;

    match (query.kind, query.name) {
        (Some(EntityKind::Server), Some(name)) => Reply::json(&topology.get_server(&name)?),
        (Some(EntityKind::Client), Some(name)) => Reply::json(&topology.get_client(&name)?),
        (None, None) => Reply::json(&Overview {
            network: topology.network(),
            pool: pool_stats(topology),
            servers: topology.servers(),
            clients: topology.clients(),
        }),
        _ => Err(DaemonError::validation("show needs both kind and name, or neither")),
    }
}

pub async fn add(state: Arc<DaemonState>, request: Message) -> DaemonResult<Reply> {
    let topology = &state.topology;
    let added = match body::<AddRequest>(&request)? {
        AddRequest::Server {
            name,
            wan_address,
            port,
            address,
        } => {
            let port = port.unwrap_or(state.config.network.wireguard_port);
            let requested = requested_address(address.as_deref())?;
            let (name, address) = topology.add_server(requested, &name, &wan_address, port)?;
            Added {
                kind: EntityKind::Server,
                name,
                address,
            }
        }
        AddRequest::Client {
            name,
            public_key,
            address,
        } => {
            let requested = requested_address(address.as_deref())?;
            let (name, address) = topology.add_client(requested, &public_key, &name)?;
            Added {
                kind: EntityKind::Client,
                name,
                address,
            }
        }
    };
    Reply::json(&added)
}

pub async fn delete(state: Arc<DaemonState>, request: Message) -> DaemonResult<Reply> {
    let target: EntityRef = body(&request)?;
    match target.kind {
        EntityKind::Server => Reply::json(&state.topology.remove_server(&target.name)?),
        EntityKind::Client => Reply::json(&state.topology.remove_client(&target.name)?),
    }
}

pub async fn save(state: Arc<DaemonState>, _request: Message) -> DaemonResult<Reply> {
    state.persistence.save(&state.topology).await?;
    Reply::json(&serde_json::json!({
        "saved": true,
        "store": state.persistence.describe(),
    }))
}

pub async fn reload(state: Arc<DaemonState>, _request: Message) -> DaemonResult<Reply> {
    let loaded = state.persistence.propagate(&state.topology).await?;
    state.topology.recompute_address_space();
    Reply::json(&serde_json::json!({
        "loaded": loaded,
        "pool": pool_stats(&state.topology),
    }))
}

pub async fn set_network(state: Arc<DaemonState>, request: Message) -> DaemonResult<Reply> {
    let req: SetNetworkRequest = body(&request)?;
    let network: NetworkBlock = req.cidr.parse()?;
    state.topology.set_network(network)?;
    Reply::json(&serde_json::json!({
        "network": network,
        "pool": pool_stats(&state.topology),
    }))
}

#[cfg(test)]
mod tests {
    use crate::handlers::build_router;
    use crate::handlers::testing::{call, config, state_with, wg_key};
    use crate::protocol::StatusCode;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_add_allocates_and_resolves_collisions() {
        let dir = tempfile::tempdir().unwrap();
        let router = build_router(&Arc::new(state_with(config(dir.path()))));

        let (status, body) = call(
            &router,
            "config",
            "add",
            json!({"kind": "server", "name": "edge", "wan_address": "203.0.113.7"}),
        )
        .await;
        assert_eq!(status, StatusCode::Ok);
        assert_eq!(body, json!({"kind": "server", "name": "edge", "address": "10.8.0.0"}));

        for expected in ["a", "a0", "a1"] {
            let (_, body) = call(
                &router,
                "config",
                "add",
                json!({"kind": "client", "name": "a", "public_key": wg_key(1)}),
            )
            .await;
            assert_eq!(body["name"], expected);
        }

        let (_, overview) = call(&router, "config", "show", json!(null)).await;
        assert_eq!(overview["pool"], json!({"total": 8, "free": 4}));
        assert_eq!(overview["clients"][0]["is_default"], true);
        assert_eq!(overview["clients"][1]["is_default"], false);
    }

    #[tokio::test]
    async fn test_explicit_address_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(state_with(config(dir.path())));
        let router = build_router(&state);

        let add = |name: &str, address: &str| {
            json!({"kind": "client", "name": name, "public_key": wg_key(2), "address": address})
        };
        let (status, _) = call(&router, "config", "add", add("one", "10.8.0.5")).await;
        assert_eq!(status, StatusCode::Ok);

        let (status, body) = call(&router, "config", "add", add("two", "10.8.0.5")).await;
        assert_eq!(status, StatusCode::Failed);
        assert!(body["error"].as_str().unwrap().contains("already assigned"));

        let (status, _) = call(&router, "config", "add", add("three", "192.168.1.1")).await;
        assert_eq!(status, StatusCode::Failed);

        let (status, body) = call(&router, "config", "add", add("four", "10.8.0.999")).await;
        assert_eq!(status, StatusCode::Failed);
        assert!(body["error"].as_str().unwrap().starts_with("validation error"));

        assert_eq!(state.topology.pool_stats(), (8, 7));
    }

    #[tokio::test]
    async fn test_failed_add_returns_allocated_address() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(state_with(config(dir.path())));
        let router = build_router(&state);

        let (status, _) = call(
            &router,
            "config",
            "add",
            json!({"kind": "client", "name": "bad name", "public_key": wg_key(3)}),
        )
        .await;
        assert_eq!(status, StatusCode::Failed);
        assert_eq!(state.topology.pool_stats(), (8, 8));
    }

    #[tokio::test]
    async fn test_show_delete_and_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let router = build_router(&Arc::new(state_with(config(dir.path()))));

        call(
            &router,
            "config",
            "add",
            json!({"kind": "client", "name": "laptop", "public_key": wg_key(4)}),
        )
        .await;

        let (status, body) = call(&router, "config", "show", json!({"kind": "client", "name": "laptop"})).await;
        assert_eq!(status, StatusCode::Ok);
        assert_eq!(body["public_key"], wg_key(4));

        let (status, _) = call(&router, "config", "delete", json!({"kind": "client", "name": "laptop"})).await;
        assert_eq!(status, StatusCode::Ok);

        let (status, body) = call(&router, "config", "show", json!({"kind": "client", "name": "laptop"})).await;
        assert_eq!(status, StatusCode::Failed);
        assert!(body["error"].as_str().unwrap().contains("laptop"));

        let (status, _) = call(&router, "config", "show", json!({"kind": "client"})).await;
        assert_eq!(status, StatusCode::Failed);
    }

    #[tokio::test]
    async fn test_save_then_reload() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(state_with(config(dir.path())));
        let router = build_router(&state);

        call(
            &router,
            "config",
            "add",
            json!({"kind": "server", "name": "edge", "wan_address": "h", "port": 51000}),
        )
        .await;
        let (status, body) = call(&router, "config", "save", json!(null)).await;
        assert_eq!(status, StatusCode::Ok);
        assert_eq!(body["saved"], true);

        state.topology.remove_server("edge").unwrap();
        let (status, body) = call(&router, "config", "reload", json!(null)).await;
        assert_eq!(status, StatusCode::Ok);
        assert_eq!(body["loaded"], true);
        assert_eq!(body["pool"], json!({"total": 8, "free": 7}));
        assert_eq!(state.topology.get_server("edge").unwrap().port, 51000);
    }

    #[tokio::test]
    async fn test_set_network() {
        let dir = tempfile::tempdir().unwrap();
        let router = build_router(&Arc::new(state_with(config(dir.path()))));

        let (status, body) = call(&router, "config", "set-network", json!({"cidr": "10.9.0.0/30"})).await;
        assert_eq!(status, StatusCode::Ok);
        assert_eq!(body["network"], "10.9.0.0/30");
        assert_eq!(body["pool"]["total"], 4);

        let (status, _) = call(&router, "config", "set-network", json!({"cidr": "10.9.0.0/2"})).await;
        assert_eq!(status, StatusCode::Failed);
    }

    #[tokio::test]
    async fn test_set_network_refuses_to_strand_clients() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(state_with(config(dir.path())));
        let router = build_router(&state);

        let client = json!({"kind": "client", "name": "laptop", "public_key": wg_key(1), "address": "10.8.0.6"});
        let (status, _) = call(&router, "config", "add", client).await;
        assert_eq!(status, StatusCode::Ok);

        let (status, body) = call(&router, "config", "set-network", json!({"cidr": "10.8.0.0/30"})).await;
        assert_eq!(status, StatusCode::Failed);
        assert!(body["error"].as_str().unwrap().contains("laptop"));
        assert_eq!(state.topology.network().to_string(), "10.8.0.0/29");
        assert_eq!(state.topology.is_address_used("10.8.0.6".parse().unwrap()), Some(true));
    }

    #[tokio::test]
    async fn test_explicit_address_skips_pending_allocation() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(state_with(config(dir.path())));
        let router = build_router(&state);

        let reserved = state.topology.get_available_address().unwrap();
        let client = json!({"kind": "client", "name": "laptop", "public_key": wg_key(1), "address": reserved.to_string()});
        let (status, body) = call(&router, "config", "add", client).await;
        assert_eq!(status, StatusCode::Failed);
        assert!(body["error"].as_str().unwrap().contains("pending allocation"));

        let (status, body) = call(
            &router,
            "config",
            "add",
            json!({"kind": "client", "name": "laptop", "public_key": wg_key(1)}),
        )
        .await;
        assert_eq!(status, StatusCode::Ok);
        assert_ne!(body["address"], reserved.to_string());
    }
}
