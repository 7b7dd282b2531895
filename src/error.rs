//! Daemon-wide error taxonomy and its mapping onto response status codes.

use thiserror::Error;

use crate::backends::BackendError;
use crate::config::ConfigError;
use crate::keyring::KeyringError;
use crate::protocol::{FrameError, StatusCode};
use crate::topology::TopologyError;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("framing error: {0}")]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Keyring(#[from] KeyringError),

    #[error(transparent)]
    Topology(#[from] TopologyError),

    /// Collaborator network/HTTP failure.
    #[error("backend unavailable: {0}")]
    Backend(#[from] BackendError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Malformed request input.
    #[error("validation error: {0}")]
    Validation(String),
}

impl From<serde_json::Error> for DaemonError {
    fn from(err: serde_json::Error) -> Self {
        DaemonError::Validation(format!("invalid request body: {err}"))
    }
}

impl DaemonError {
    pub fn validation(msg: impl Into<String>) -> Self {
        DaemonError::Validation(msg.into())
    }

    fn backend(&self) -> Option<&BackendError> {
        match self {
            DaemonError::Backend(e) | DaemonError::Keyring(KeyringError::Backend(e)) => Some(e),
            _ => None,
        }
    }

    /// Status code reported to the socket client.
    pub fn status_code(&self) -> StatusCode {
        match self.backend() {
            Some(e) if e.is_timeout() => StatusCode::Timeout,
            Some(e) if e.is_unauthorized() => StatusCode::Unauthorized,
            _ => StatusCode::Failed,
        }
    }
}

/// Result type for request handlers and startup.
pub type DaemonResult<T> = Result<T, DaemonError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let timeout = DaemonError::from(BackendError::Timeout {
            service: "cloud",
            secs: 15,
        });
        assert_eq!(timeout.status_code(), StatusCode::Timeout);

        let denied = DaemonError::from(KeyringError::Backend(BackendError::Unauthorized {
            service: "vault",
            status: 401,
        }));
        assert_eq!(denied.status_code(), StatusCode::Unauthorized);

        let missing = DaemonError::from(KeyringError::KeyNotFound("x".into()));
        assert_eq!(missing.status_code(), StatusCode::Failed);

        let exhausted = DaemonError::from(TopologyError::AddressSpaceExhausted("10.0.0.0/30".into()));
        assert_eq!(exhausted.status_code(), StatusCode::Failed);
    }

    #[test]
    fn test_bad_json_is_validation() {
        let err: DaemonError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, DaemonError::Validation(_)));
        assert!(err.to_string().starts_with("validation error: invalid request body"));
    }
}
