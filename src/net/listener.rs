//! Unix socket listener with backpressure.
//!
//! # Responsibilities
//! - Remove a stale socket file and bind the configured path
//! - Apply the configured permission bits (the socket's trust boundary)
//! - Enforce max_connections limit via semaphore
//! - Remove the socket file when the listener is dropped

use std::os::unix::fs::{FileTypeExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Semaphore;

use crate::config::ListenerConfig;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// A non-socket file occupies the socket path.
    #[error("{} exists and is not a socket", .0.display())]
    PathOccupied(PathBuf),

    /// Failed to bind to the socket path.
    #[error("Failed to bind {}: {source}", .path.display())]
    Bind {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to set socket permissions.
    #[error("Failed to set permissions on {}: {source}", .path.display())]
    Permissions {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to accept connection.
    #[error("Failed to accept: {0}")]
    Accept(#[source] std::io::Error),

    /// The admission semaphore was closed.
    #[error("Listener is closed")]
    Closed,
}

/// A bounded Unix socket listener that limits concurrent connections.
///
/// Uses a semaphore to enforce `max_connections`. When the limit is reached,
/// new connections will wait until a slot becomes available.
#[derive(Debug)]
pub struct Listener {
    /// The underlying socket listener.
    inner: UnixListener,
    /// Path of the socket file, removed on drop.
    path: PathBuf,
    /// Semaphore to limit concurrent connections.
    connection_limit: Arc<Semaphore>,
    /// Configured maximum connections.
    max_connections: usize,
}

impl Listener {
    /// Bind to the configured socket path with connection limits.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, ListenerError> {
        let path = config.socket_path.clone();
        remove_stale_socket(&path).await?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|source| ListenerError::Bind {
                        path: path.clone(),
                        source,
                    })?;
            }
        }

        let listener = UnixListener::bind(&path).map_err(|source| ListenerError::Bind {
            path: path.clone(),
            source,
        })?;

        set_mode(&path, config.socket_mode).await?;

        tracing::info!(
            socket = %path.display(),
            mode = %format!("{:o}", config.socket_mode),
            max_connections = config.max_connections,
            "Listener bound"
        );

        Ok(Self {
            inner: listener,
            path,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Accept a new connection, respecting the connection limit.
    ///
    /// This will wait if the connection limit has been reached.
    /// Returns the stream and a permit that must be held for the connection's lifetime.
    pub async fn accept(&self) -> Result<(UnixStream, ConnectionPermit), ListenerError> {
        // Acquire permit first (backpressure)
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        // Then accept the connection
        let (stream, _addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::debug!(
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, ConnectionPermit { _permit: permit }))
    }

    /// Path of the bound socket.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get current available connection slots.
    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    /// Get configured maximum connections.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::info!(socket = %self.path.display(), "Socket file removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(socket = %self.path.display(), error = %e, "Failed to remove socket file"),
        }
    }
}

/// Remove a socket file left behind by a previous run. Refuses to delete
/// anything that is not a socket.
async fn remove_stale_socket(path: &Path) -> Result<(), ListenerError> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(ListenerError::Bind {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    if !metadata.file_type().is_socket() {
        return Err(ListenerError::PathOccupied(path.to_path_buf()));
    }

    tracing::warn!(socket = %path.display(), "Removing stale socket file");
    tokio::fs::remove_file(path)
        .await
        .map_err(|source| ListenerError::Bind {
            path: path.to_path_buf(),
            source,
        })
}

async fn set_mode(path: &Path, mode: u32) -> Result<(), ListenerError> {
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(|source| ListenerError::Permissions {
            path: path.to_path_buf(),
            source,
        })
}

/// A permit representing a connection slot.
///
/// When dropped, the connection slot is released back to the pool.
/// This ensures backpressure is maintained even if the connection handler panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: tokio::sync::OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(path: PathBuf, max_connections: usize) -> ListenerConfig {
        ListenerConfig {
            socket_path: path,
            max_connections,
            ..ListenerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_bind_sets_mode_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yosaid.sock");

        let listener = Listener::bind(&config(path.clone(), 4)).await.unwrap();
        let metadata = std::fs::metadata(&path).unwrap();
        assert!(metadata.file_type().is_socket());
        assert_eq!(metadata.permissions().mode() & 0o777, 0o600);

        drop(listener);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_stale_socket_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yosaid.sock");

        // A socket file whose listener is gone.
        let stale = std::os::unix::net::UnixListener::bind(&path).unwrap();
        drop(stale);
        assert!(path.exists());

        let listener = Listener::bind(&config(path.clone(), 4)).await.unwrap();
        assert_eq!(listener.path(), path.as_path());
    }

    #[tokio::test]
    async fn test_regular_file_not_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-socket");
        std::fs::write(&path, b"keep me").unwrap();

        let err = Listener::bind(&config(path.clone(), 4)).await.unwrap_err();
        assert!(matches!(err, ListenerError::PathOccupied(_)));
        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");
    }

    #[tokio::test]
    async fn test_permits_bound_concurrency() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("yosaid.sock");
        let listener = Listener::bind(&config(path.clone(), 1)).await.unwrap();

        let _c1 = UnixStream::connect(&path).await.unwrap();
        let (_s1, permit) = listener.accept().await.unwrap();
        assert_eq!(listener.available_permits(), 0);

        drop(permit);
        assert_eq!(listener.available_permits(), 1);
        assert_eq!(listener.max_connections(), 1);
    }
}
