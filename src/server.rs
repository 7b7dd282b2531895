//! Accept loop for the control socket.
//!
//! # Responsibilities
//! - Accept connections under the listener's admission limit
//! - Spawn one task per connection, each with its own tracing span
//! - Stop accepting on shutdown, then drain in-flight exchanges
//!
//! # Design Decisions
//! - Accept errors are logged and the loop continues
//! - Exchange errors end only that connection
//! - The socket file is removed when the listener drops

use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use crate::config::ListenerConfig;
use crate::lifecycle::ShutdownSignal;
use crate::net::{handle_connection, ConnectionLimits, ConnectionTracker, Listener};
use crate::routing::Router;

/// How long in-flight connections get to finish after shutdown.
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Serves the router over a bound Unix socket.
pub struct DaemonServer {
    router: Arc<Router>,
    limits: ConnectionLimits,
    tracker: ConnectionTracker,
}

impl DaemonServer {
    pub fn new(router: Router, config: &ListenerConfig) -> Self {
        Self {
            router: Arc::new(router),
            limits: ConnectionLimits::from(config),
            tracker: ConnectionTracker::new(),
        }
    }

    /// Handle to the in-flight connection count.
    pub fn tracker(&self) -> ConnectionTracker {
        self.tracker.clone()
    }

    /// Run until `shutdown` fires, then drain and release the socket.
    pub async fn run(self, listener: Listener, mut shutdown: ShutdownSignal) {
        tracing::info!(
            socket = %listener.path().display(),
            max_connections = listener.max_connections(),
            "Daemon accepting connections"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, permit) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            tracing::error!(error = %e, "Accept failed");
                            continue;
                        }
                    };

                    let guard = self.tracker.track();
                    let router = Arc::clone(&self.router);
                    let limits = self.limits;
                    let span = tracing::info_span!("connection", connection_id = %guard.id());

                    tokio::spawn(
                        async move {
                            let _permit = permit;
                            let _guard = guard;
                            match handle_connection(stream, &router, &limits).await {
                                Ok(status) => tracing::debug!(status = status.as_str(), "Exchange complete"),
                                Err(e) => tracing::warn!(error = %e, "Connection aborted"),
                            }
                        }
                        .instrument(span),
                    );
                }
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
            }
        }

        let active = self.tracker.active_count();
        if active > 0 {
            tracing::info!(active, "Draining in-flight connections");
        }
        if !self.tracker.wait_for_idle(DRAIN_TIMEOUT).await {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Drain deadline passed with connections still open"
            );
        }
        drop(listener);
        tracing::info!("Daemon stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use crate::protocol::{read_frame, write_frame, Message, StatusCode};
    use crate::routing::{with_state, Reply};
    use tokio::net::UnixStream;

    fn config(dir: &std::path::Path) -> ListenerConfig {
        ListenerConfig {
            socket_path: dir.join("d.sock"),
            ..ListenerConfig::default()
        }
    }

    fn router() -> Router {
        let mut router = Router::new();
        router.register(
            "test",
            "echo",
            with_state(&Arc::new(()), |_, request: Message| async move {
                Ok::<_, crate::error::DaemonError>(Reply::ok(request.body))
            }),
        );
        router
    }

    #[tokio::test]
    async fn test_serves_until_shutdown_and_removes_socket() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let listener = Listener::bind(&config).await.unwrap();
        let shutdown = Shutdown::new();
        let server = DaemonServer::new(router(), &config);
        let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));

        let mut stream = UnixStream::connect(&config.socket_path).await.unwrap();
        write_frame(&mut stream, &Message::request("test", "echo", b"hi".to_vec()))
            .await
            .unwrap();
        let response = read_frame(&mut stream, 1024).await.unwrap();
        assert_eq!(response.status, StatusCode::Ok);
        assert_eq!(response.body, b"hi");

        shutdown.trigger();
        handle.await.unwrap();
        assert!(!config.socket_path.exists());
    }

    #[tokio::test]
    async fn test_bad_frame_does_not_stop_server() {
        use tokio::io::AsyncWriteExt;

        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path());
        let listener = Listener::bind(&config).await.unwrap();
        let shutdown = Shutdown::new();
        let handle = tokio::spawn(DaemonServer::new(router(), &config).run(listener, shutdown.subscribe()));

        let mut bad = UnixStream::connect(&config.socket_path).await.unwrap();
        bad.write_all(&[1, 200, 0]).await.unwrap();
        bad.shutdown().await.unwrap();

        let mut good = UnixStream::connect(&config.socket_path).await.unwrap();
        write_frame(&mut good, &Message::request("test", "echo", b"ok".to_vec()))
            .await
            .unwrap();
        assert_eq!(read_frame(&mut good, 1024).await.unwrap().body, b"ok");

        shutdown.trigger();
        handle.await.unwrap();
    }
}
