//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Socket I/O on a connection:
//!     → timeouts.rs (read deadline, write deadline)
//!     → on expiry the connection is dropped; the listener carries on
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every blocking exchange has a deadline
//! - No retries: each request is attempted once and the caller decides

pub mod timeouts;

pub use timeouts::{with_deadline, Elapsed};
