//! End-to-end exchanges over the daemon socket.

use serde_json::json;
use yosai_daemon::protocol::{Message, StatusCode};

mod common;
use common::{call, send, start_daemon, start_daemon_with, wg_key};

#[tokio::test]
async fn test_topology_over_socket() {
    let daemon = start_daemon("10.8.0.0/30").await;

    let (status, body) = call(
        &daemon.socket,
        "config",
        "add",
        json!({"kind": "server", "name": "edge", "wan_address": "203.0.113.7"}),
    )
    .await;
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["address"], "10.8.0.0");

    let (status, body) = call(
        &daemon.socket,
        "config",
        "add",
        json!({"kind": "client", "name": "laptop", "public_key": wg_key(1)}),
    )
    .await;
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["address"], "10.8.0.1");

    let (status, overview) = call(&daemon.socket, "config", "show", json!(null)).await;
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(overview["network"], "10.8.0.0/30");
    assert_eq!(overview["pool"], json!({"total": 4, "free": 2}));
    assert_eq!(overview["clients"][0]["is_default"], true);

    let (status, body) = call(&daemon.socket, "config", "save", json!(null)).await;
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["saved"], true);
    assert!(daemon.dir.path().join("topology.json").exists());

    daemon.stop().await;
}

#[tokio::test]
async fn test_unresolved_routes_list_alternatives() {
    let daemon = start_daemon("10.8.0.0/29").await;

    let response = send(&daemon.socket, Message::request("config", "explode", vec![])).await;
    assert_eq!(response.status, StatusCode::Unresolved);
    assert_eq!(response.target, "config");
    assert_eq!(response.method, "explode");
    let body: serde_json::Value = response.json().unwrap();
    assert!(body["methods"]
        .as_array()
        .unwrap()
        .contains(&json!("set-network")));

    let response = send(&daemon.socket, Message::request("nowhere", "show", vec![])).await;
    assert_eq!(response.status, StatusCode::Unresolved);
    let body: serde_json::Value = response.json().unwrap();
    assert!(body["targets"].as_array().unwrap().contains(&json!("keyring")));

    daemon.stop().await;
}

#[tokio::test]
async fn test_keyring_over_socket_never_leaks_secrets() {
    let daemon = start_daemon("10.8.0.0/29").await;

    let (status, _) = call(
        &daemon.socket,
        "keyring",
        "add",
        json!({"name": "cloud", "key": {"kind": "bearer", "token": "s3cret"}}),
    )
    .await;
    assert_eq!(status, StatusCode::Ok);

    let response = send(&daemon.socket, Message::request("keyring", "show", vec![])).await;
    assert_eq!(response.status, StatusCode::Ok);
    assert!(!String::from_utf8_lossy(&response.body).contains("s3cret"));

    let (status, body) = call(&daemon.socket, "keyring", "show", json!({"name": "missing"})).await;
    assert_eq!(status, StatusCode::Failed);
    assert_eq!(body["error"], "key not found: missing");

    daemon.stop().await;
}

#[tokio::test]
async fn test_large_body_round_trips() {
    let daemon = start_daemon("10.8.0.0/29").await;

    // Larger than any single socket buffer, so reads must loop.
    let wan = "h".repeat(256 * 1024);
    let (status, body) = call(
        &daemon.socket,
        "config",
        "add",
        json!({"kind": "server", "name": "big", "wan_address": wan}),
    )
    .await;
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["name"], "big");

    let (_, server) = call(&daemon.socket, "config", "show", json!({"kind": "server", "name": "big"})).await;
    assert_eq!(server["wan_address"].as_str().unwrap().len(), 256 * 1024);

    daemon.stop().await;
}

#[tokio::test]
async fn test_invalid_body_is_failed_not_dropped() {
    let daemon = start_daemon("10.8.0.0/29").await;

    let response = send(
        &daemon.socket,
        Message::request("config", "add", b"{not json".to_vec()),
    )
    .await;
    assert_eq!(response.status, StatusCode::Failed);
    let body: serde_json::Value = response.json().unwrap();
    assert!(body["error"].as_str().unwrap().starts_with("validation error"));

    daemon.stop().await;
}

#[tokio::test]
async fn test_persisted_topology_survives_restart() {
    let first = start_daemon("10.8.0.0/29").await;
    call(
        &first.socket,
        "config",
        "add",
        json!({"kind": "client", "name": "phone", "public_key": wg_key(2)}),
    )
    .await;
    call(&first.socket, "config", "save", json!(null)).await;
    let saved = std::fs::read(first.dir.path().join("topology.json")).unwrap();
    first.stop().await;

    let second = start_daemon_with("10.8.0.0/29", |config| {
        config.persistence.state_path = config.listener.socket_path.with_file_name("restored.json");
    })
    .await;
    std::fs::write(second.dir.path().join("restored.json"), saved).unwrap();
    let (status, body) = call(&second.socket, "config", "reload", json!(null)).await;
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(body["loaded"], true);

    let (status, phone) = call(&second.socket, "config", "show", json!({"kind": "client", "name": "phone"})).await;
    assert_eq!(status, StatusCode::Ok);
    assert_eq!(phone["vpn_address"], "10.8.0.0");

    second.stop().await;
}
