//! `daemon` target: status and the local WireGuard interface.

use std::sync::Arc;

use crate::backends::wireguard::{config_path, render_config as render, write_config, InterfaceSettings};
use crate::error::{DaemonError, DaemonResult};
use crate::handlers::config::pool_stats;
use crate::keyring::KeyStore;
use crate::protocol::Message;
use crate::routing::Reply;
use crate::state::DaemonState;
use crate::topology::VpnServer;

pub async fn status(state: Arc<DaemonState>, _request: Message) -> DaemonResult<Reply> {
    Reply::json(&serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.uptime().as_secs(),
        "network": state.topology.network(),
        "pool": pool_stats(&state.topology),
        "servers": state.topology.servers().len(),
        "clients": state.topology.clients().len(),
        "cached_keys": state.keyring.list().len(),
        "rungs": state.keyring.rung_labels(),
        "vault_attached": state.vault_attached(),
    }))
}

/// The server this host's interface represents.
fn local_server(state: &DaemonState) -> DaemonResult<VpnServer> {
    match &state.config.wireguard.server {
        Some(name) => Ok(state.topology.get_server(name)?),
        None => state
            .topology
            .servers()
            .into_iter()
            .next()
            .ok_or_else(|| DaemonError::validation("no server registered to render an interface for")),
    }
}

/// Render the interface config from the live topology and write it to disk.
pub async fn render_config(state: Arc<DaemonState>, _request: Message) -> DaemonResult<Reply> {
    let wg = &state.config.wireguard;
    let server = local_server(&state)?;
    let private_key = state.keyring.get_key(&wg.private_key).await?;
    let secret = private_key.secret();

    let clients = state.topology.clients();
    let settings = InterfaceSettings {
        network: state.topology.network(),
        server_address: server.vpn_address,
        listen_port: server.port,
        private_key: &secret,
    };
    let contents = render(&settings, &clients);
    let path = write_config(&wg.config_dir, &wg.interface, &contents).await?;

    Reply::json(&serde_json::json!({
        "path": path,
        "server": server.name,
        "peers": clients.len(),
    }))
}

pub async fn wg_up(state: Arc<DaemonState>, _request: Message) -> DaemonResult<Reply> {
    let wg = &state.config.wireguard;
    let path = config_path(&wg.config_dir, &wg.interface);
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(DaemonError::validation(format!(
            "{} does not exist; run daemon render-config first",
            path.display()
        )));
    }
    state.wireguard.up(&path).await?;
    Reply::json(&serde_json::json!({ "interface": wg.interface, "up": true }))
}

pub async fn wg_down(state: Arc<DaemonState>, _request: Message) -> DaemonResult<Reply> {
    let wg = &state.config.wireguard;
    let path = config_path(&wg.config_dir, &wg.interface);
    state.wireguard.down(&path).await?;
    Reply::json(&serde_json::json!({ "interface": wg.interface, "up": false }))
}
