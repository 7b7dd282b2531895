//! `cloud` target: provision instances and register them as VPN servers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backends::{InstanceInfo, InstanceSpec};
use crate::error::DaemonResult;
use crate::handlers::body;
use crate::protocol::Message;
use crate::routing::Reply;
use crate::state::DaemonState;

#[derive(Debug, Deserialize)]
struct InstanceRef {
    id: String,
    /// VPN server to drop along with the instance.
    #[serde(default)]
    server: Option<String>,
}

#[derive(Debug, Serialize)]
struct Provisioned {
    instance: InstanceInfo,
    /// Registered VPN server label, once the instance has a public address.
    server: Option<String>,
}

/// Register `instance` as a VPN server unless one with its label exists.
fn register(state: &DaemonState, instance: &InstanceInfo) -> DaemonResult<Option<String>> {
    if !instance.is_ready() {
        return Ok(None);
    }
    let port = state.config.network.wireguard_port;
    let (server, created) = state
        .topology
        .add_server_if_absent(&instance.label, &instance.main_ip, port)?;
    if created {
        tracing::info!(
            instance = %instance.id,
            server = %server.name,
            address = %server.vpn_address,
            "Instance registered as server"
        );
    }
    Ok(Some(server.name))
}

fn provisioned(state: &DaemonState, instance: InstanceInfo) -> DaemonResult<Reply> {
    let server = register(state, &instance)?;
    let ready = server.is_some();
    let reply = Provisioned { instance, server };
    if ready {
        Reply::json(&reply)
    } else {
        Reply::accepted(&reply)
    }
}

/// Create an instance. Replies ACCEPTED while it has no public address yet;
/// `poll` completes the registration.
pub async fn add(state: Arc<DaemonState>, request: Message) -> DaemonResult<Reply> {
    let spec: InstanceSpec = body(&request)?;
    let instance = state.cloud()?.create_instance(&spec).await?;
    provisioned(&state, instance)
}

pub async fn poll(state: Arc<DaemonState>, request: Message) -> DaemonResult<Reply> {
    let target: InstanceRef = body(&request)?;
    let instance = state.cloud()?.poll_instance(&target.id).await?;
    provisioned(&state, instance)
}

pub async fn delete(state: Arc<DaemonState>, request: Message) -> DaemonResult<Reply> {
    let target: InstanceRef = body(&request)?;
    state.cloud()?.delete_instance(&target.id).await?;

    let removed = match target.server {
        Some(name) => Some(state.topology.remove_server(&name)?.name),
        None => None,
    };
    Reply::json(&serde_json::json!({ "deleted": target.id, "server_removed": removed }))
}

pub async fn regions(state: Arc<DaemonState>, _request: Message) -> DaemonResult<Reply> {
    let regions = state.cloud()?.list_regions().await?;
    Reply::json(&regions)
}
