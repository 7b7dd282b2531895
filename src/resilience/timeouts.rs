//! Timeout enforcement.
//!
//! # Responsibilities
//! - Put a deadline on socket reads and writes
//! - Report which operation timed out
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from the wrapped operation's own errors
//! - Outbound HTTP calls carry their deadline in the reqwest client instead

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// An operation did not finish before its deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{operation} timed out after {}ms", .after.as_millis())]
pub struct Elapsed {
    pub operation: &'static str,
    pub after: Duration,
}

/// Run `fut` with a deadline of `after`.
pub async fn with_deadline<F, T>(operation: &'static str, after: Duration, fut: F) -> Result<T, Elapsed>
where
    F: Future<Output = T>,
{
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| Elapsed { operation, after })
}
