//! Collaborator error definitions.

use thiserror::Error;

/// Errors raised while talking to an external collaborator.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The request exceeded its deadline.
    #[error("{service} timed out after {secs}s")]
    Timeout { service: &'static str, secs: u64 },

    /// The collaborator rejected our credential.
    #[error("{service} rejected credentials (HTTP {status})")]
    Unauthorized { service: &'static str, status: u16 },

    /// The requested resource does not exist.
    #[error("{service} has no {resource}")]
    NotFound { service: &'static str, resource: String },

    /// Any other non-success HTTP status.
    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Connection-level failure.
    #[error("{service} unreachable: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    /// Response body did not match the expected shape.
    #[error("{service} sent an unreadable response: {reason}")]
    Decode { service: &'static str, reason: String },

    /// Base URL cannot take path segments.
    #[error("{service} base URL is invalid: {url}")]
    InvalidUrl { service: &'static str, url: String },

    /// No credential could be obtained for the collaborator.
    #[error("{service} credential unavailable: {reason}")]
    Credential { service: &'static str, reason: String },

    /// The collaborator is not configured on this daemon.
    #[error("{0} backend is not configured")]
    NotConfigured(&'static str),

    /// A local helper program failed.
    #[error("{program} exited with {status}: {stderr}")]
    Command {
        program: String,
        status: String,
        stderr: String,
    },

    /// Local file or process I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BackendError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, BackendError::Timeout { .. })
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BackendError::Unauthorized { .. })
    }
}

/// Result type for collaborator calls.
pub type BackendResult<T> = Result<T, BackendError>;
