//! Shared utilities for integration, load and failure testing.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio::net::UnixStream;
use tokio::task::JoinHandle;

use yosai_daemon::config::DaemonConfig;
use yosai_daemon::handlers::build_router;
use yosai_daemon::lifecycle::{build_state, Shutdown};
use yosai_daemon::net::Listener;
use yosai_daemon::protocol::{read_frame, write_frame, Message, StatusCode};
use yosai_daemon::{DaemonServer, DaemonState};

/// A daemon serving on a socket inside its own temp dir.
#[allow(dead_code)]
pub struct TestDaemon {
    pub dir: TempDir,
    pub socket: PathBuf,
    pub state: Arc<DaemonState>,
    pub shutdown: Shutdown,
    handle: JoinHandle<()>,
}

impl TestDaemon {
    /// Stop accepting, drain, and wait for the server task.
    pub async fn stop(self) {
        self.shutdown.trigger();
        self.handle.await.unwrap();
    }
}

/// A well-formed WireGuard public key derived from `seed`.
pub fn wg_key(seed: u8) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode([seed; 32])
}

pub fn test_config(dir: &Path, cidr: &str) -> DaemonConfig {
    let mut config = DaemonConfig::default();
    config.listener.socket_path = dir.join("yosaid.sock");
    config.listener.read_timeout_secs = 2;
    config.network.cidr = cidr.to_string();
    config.persistence.state_path = dir.join("topology.json");
    config.wireguard.config_dir = dir.join("wireguard");
    config.keyring.env_prefix = "YOSAI_TEST_KEY_".to_string();
    config
}

/// Start a daemon over `cidr`, with `tweak` applied to the config.
pub async fn start_daemon_with<F>(cidr: &str, tweak: F) -> TestDaemon
where
    F: FnOnce(&mut DaemonConfig),
{
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path(), cidr);
    tweak(&mut config);

    let listener_config = config.listener.clone();
    let state = build_state(config).await.unwrap();
    let router = build_router(&state);
    let listener = Listener::bind(&listener_config).await.unwrap();

    let shutdown = Shutdown::new();
    let server = DaemonServer::new(router, &listener_config);
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

    TestDaemon {
        socket: listener_config.socket_path,
        dir,
        state,
        shutdown,
        handle,
    }
}

#[allow(dead_code)]
pub async fn start_daemon(cidr: &str) -> TestDaemon {
    start_daemon_with(cidr, |_| {}).await
}

/// One request/response exchange over a fresh connection.
pub async fn send(socket: &Path, request: Message) -> Message {
    let mut stream = UnixStream::connect(socket).await.unwrap();
    write_frame(&mut stream, &request).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), read_frame(&mut stream, 64 * 1024 * 1024))
        .await
        .expect("daemon did not answer")
        .unwrap()
}

/// `send` with a JSON body, returning the status and decoded body.
pub async fn call(
    socket: &Path,
    target: &str,
    method: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let body = if body.is_null() {
        Vec::new()
    } else {
        body.to_string().into_bytes()
    };
    let response = send(socket, Message::request(target, method, body)).await;
    let json = if response.body.is_empty() {
        serde_json::Value::Null
    } else {
        response.json().unwrap()
    };
    (response.status, json)
}
