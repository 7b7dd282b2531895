//! OS signal handling.
//!
//! # Responsibilities
//! - Wait for SIGTERM or SIGINT
//! - Hand the daemon a single "stop now" event
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - Failing to install a handler is a startup error, not a panic

use std::io;

use tokio::signal::unix::{signal, SignalKind};

/// Resolve once SIGTERM or SIGINT arrives.
pub async fn wait_for_shutdown_signal() -> io::Result<()> {
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = terminate.recv() => tracing::info!(signal = "SIGTERM", "Shutdown signal received"),
        _ = interrupt.recv() => tracing::info!(signal = "SIGINT", "Shutdown signal received"),
    }
    Ok(())
}
