//! Per-connection exchange and lifecycle tracking.
//!
//! # Responsibilities
//! - Run exactly one request/response exchange per connection
//! - Put deadlines on the read and the write
//! - Generate unique connection IDs for tracing
//! - Count active connections for shutdown draining and metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::config::ListenerConfig;
use crate::observability::metrics;
use crate::protocol::{read_frame, write_frame, FrameError, StatusCode};
use crate::resilience::{with_deadline, Elapsed};
use crate::routing::Router;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique connection id, rendered as `conn-N` in spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Limits applied to every connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub max_frame_bytes: usize,
}

impl From<&ListenerConfig> for ConnectionLimits {
    fn from(config: &ListenerConfig) -> Self {
        Self {
            read_timeout: Duration::from_secs(config.read_timeout_secs),
            write_timeout: Duration::from_secs(config.write_timeout_secs),
            max_frame_bytes: config.max_frame_bytes,
        }
    }
}

/// Why a connection ended without a response being written.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("reading request: {0}")]
    Read(#[source] FrameError),

    #[error("writing response: {0}")]
    Write(#[source] FrameError),

    #[error(transparent)]
    Timeout(#[from] Elapsed),
}

/// Read one request frame, dispatch it, write the response.
///
/// Handler failures are already folded into the response by the router, so
/// an error here means the exchange itself broke (framing, I/O, deadline).
pub async fn handle_connection<S>(
    mut stream: S,
    router: &Router,
    limits: &ConnectionLimits,
) -> Result<StatusCode, ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let request = with_deadline(
        "read",
        limits.read_timeout,
        read_frame(&mut stream, limits.max_frame_bytes),
    )
    .await?
    .map_err(ConnectionError::Read)?;

    let response = router.dispatch(request).await;
    let status = response.status;

    with_deadline(
        "write",
        limits.write_timeout,
        write_frame(&mut stream, &response),
    )
    .await?
    .map_err(ConnectionError::Write)?;

    if let Err(e) = stream.shutdown().await {
        tracing::trace!(error = %e, "Shutdown after response failed");
    }
    Ok(status)
}

/// Counts in-flight exchanges so shutdown can drain them.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    active_count: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more connection until the returned guard drops.
    pub fn track(&self) -> ConnectionGuard {
        let active = self.active_count.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_active_connections(active as usize);
        ConnectionGuard {
            active_count: Arc::clone(&self.active_count),
            id: ConnectionId::new(),
        }
    }

    /// Connections currently being served.
    pub fn active_count(&self) -> u64 {
        self.active_count.load(Ordering::SeqCst)
    }

    /// Wait until all connections are closed or `deadline` passes.
    /// Returns true if every connection finished.
    pub async fn wait_for_idle(&self, deadline: Duration) -> bool {
        let drained = async {
            while self.active_count() > 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        };
        tokio::time::timeout(deadline, drained).await.is_ok()
    }
}

/// Held by a connection task for its whole lifetime.
#[derive(Debug)]
pub struct ConnectionGuard {
    active_count: Arc<AtomicU64>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let active = self.active_count.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::record_active_connections(active as usize);
        tracing::trace!(connection_id = %self.id, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Message;
    use crate::routing::{with_state, Reply};
    use tokio::io::AsyncReadExt;

    fn limits() -> ConnectionLimits {
        ConnectionLimits::from(&ListenerConfig::default())
    }

    fn echo_router() -> Router {
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

    #[test]
    fn connection_id_unique() {
        let id1 = ConnectionId::new();
        let id2 = ConnectionId::new();
        assert_ne!(id1, id2);
        assert!(id2.as_u64() > id1.as_u64());
        assert_eq!(id1.to_string(), format!("conn-{}", id1.as_u64()));
    }

    #[test]
    fn connection_tracker_counts() {
        let tracker = ConnectionTracker::new();
        assert_eq!(tracker.active_count(), 0);

        let guard1 = tracker.track();
        assert_eq!(tracker.active_count(), 1);

        let guard2 = tracker.track();
        assert_eq!(tracker.active_count(), 2);
        assert_ne!(guard1.id(), guard2.id());

        drop(guard1);
        assert_eq!(tracker.active_count(), 1);

        drop(guard2);
        assert_eq!(tracker.active_count(), 0);
    }

    #[tokio::test]
    async fn test_wait_for_idle() {
        let tracker = ConnectionTracker::new();
        assert!(tracker.wait_for_idle(Duration::from_millis(10)).await);

        let guard = tracker.track();
        assert!(!tracker.wait_for_idle(Duration::from_millis(60)).await);

        let waiter = tracker.clone();
        let handle = tokio::spawn(async move { waiter.wait_for_idle(Duration::from_secs(5)).await });
        drop(guard);
        assert!(handle.await.unwrap());
    }

    #[tokio::test]
    async fn test_single_exchange() {
        let (mut client, server) = tokio::io::duplex(4096);
        let router = echo_router();

        let request = Message::request("test", "echo", b"ping".to_vec());
        write_frame(&mut client, &request).await.unwrap();

        let status = handle_connection(server, &router, &limits()).await.unwrap();
        assert_eq!(status, StatusCode::Ok);

        let response = read_frame(&mut client, 1024).await.unwrap();
        assert_eq!(response.body, b"ping");

        // The server side closed after one response.
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_garbage_aborts_connection() {
        let (mut client, server) = tokio::io::duplex(4096);
        let mut frame = Message::request("test", "echo", vec![]).encode().unwrap();
        frame[1] = 42;
        client.write_all(&frame).await.unwrap();

        let err = handle_connection(server, &echo_router(), &limits()).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Read(FrameError::UnknownStatus(42))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_client_times_out() {
        let (_client, server) = tokio::io::duplex(64);
        let err = handle_connection(server, &echo_router(), &limits()).await.unwrap_err();
        assert!(matches!(err, ConnectionError::Timeout(Elapsed { operation: "read", .. })));
    }
}
