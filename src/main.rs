//! Yosai daemon (`yosaid`)
//!
//! Owns the VPN fleet state and serves it over a local Unix socket.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────────┐
//!                         │                     YOSAID                       │
//!                         │                                                  │
//!   yosai-cli / client    │  ┌──────────┐   ┌──────────┐   ┌─────────────┐   │
//!   ──────── frame ───────┼─▶│   net    │──▶│ protocol │──▶│   routing   │   │
//!                         │  │ listener │   │  codec   │   │ target/meth │   │
//!                         │  └──────────┘   └──────────┘   └──────┬──────┘   │
//!                         │                                       │          │
//!                         │                                       ▼          │
//!                         │          ┌───────────┐  ┌──────────────────────┐ │
//!                         │          │  keyring  │◀─│       handlers       │ │
//!                         │          │ cache +   │  │ config keyring cloud │ │
//!                         │          │  rungs    │  │ automation daemon    │ │
//!                         │          └───────────┘  └──────────┬───────────┘ │
//!                         │          ┌───────────┐             │             │
//!                         │          │ topology  │◀────────────┤             │
//!                         │          │ pool+names│             ▼             │
//!                         │          └───────────┘  ┌──────────────────────┐ │
//!   ◀──────── frame ──────┼─────────────────────────│      backends        │─┼──▶ vault / cloud /
//!                         │                         │ http wg persistence  │ │    automation /
//!                         │                         └──────────────────────┘ │    config server
//!                         └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use yosai_daemon::config::load_config_or_default;
use yosai_daemon::handlers::build_router;
use yosai_daemon::lifecycle::{build_state, wait_for_shutdown_signal, Shutdown};
use yosai_daemon::net::Listener;
use yosai_daemon::observability::init_logging;
use yosai_daemon::DaemonServer;

#[derive(Parser)]
#[command(name = "yosaid")]
#[command(about = "VPN fleet orchestration daemon", long_about = None)]
struct Args {
    /// Daemon configuration file; missing means built-in defaults.
    #[arg(short, long, env = "YOSAI_CONFIG", default_value = "/etc/yosai/yosaid.toml")]
    config: PathBuf,

    /// Override the control socket path.
    #[arg(short, long)]
    socket: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = load_config_or_default(&args.config)?;
    if let Some(socket) = args.socket {
        config.listener.socket_path = socket;
    }
    init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        socket = %config.listener.socket_path.display(),
        network = %config.network.cidr,
        "yosaid starting"
    );

    let listener_config = config.listener.clone();
    let state = build_state(config).await?;
    let router = build_router(&state);

    let listener = Listener::bind(&listener_config).await?;
    let shutdown = Shutdown::new();
    let server = DaemonServer::new(router, &listener_config);
    let serving = tokio::spawn(server.run(listener, shutdown.subscribe()));

    let signal_result = wait_for_shutdown_signal().await;
    shutdown.trigger();
    serving.await?;
    signal_result?;

    tracing::info!("Shutdown complete");
    Ok(())
}
