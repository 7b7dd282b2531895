//! Keyring error definitions.

use thiserror::Error;

use crate::backends::BackendError;

/// Errors that can occur while resolving or storing credentials.
#[derive(Debug, Error)]
pub enum KeyringError {
    /// No cache entry and no rung could resolve the name.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The name is already cached.
    #[error("key already exists: {0}")]
    KeyExists(String),

    /// This store does not accept writes.
    #[error("{store} is read-only")]
    ReadOnly { store: &'static str },

    /// Stored credential material could not be parsed.
    #[error("invalid key material for {name}: {reason}")]
    InvalidKey { name: String, reason: String },

    /// A rung's backing service failed.
    #[error("keyring backend unavailable: {0}")]
    Backend(#[from] BackendError),

    /// Local key file could not be read or written.
    #[error("key file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for keyring operations.
pub type KeyringResult<T> = Result<T, KeyringError>;
