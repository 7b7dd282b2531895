//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Decoded Message (target, method, body)
//!     → router.rs (target lookup, then method lookup)
//!     → handler.rs Handler::call
//!     → Reply (status, body) or DaemonError
//!     → response Message echoing target and method
//!
//! No handler registered:
//!     → REQUEST_UNRESOLVED with the known targets or methods
//! ```
//!
//! # Design Decisions
//! - Routes registered at startup, immutable at runtime
//! - Handlers close over explicitly constructed state, never globals
//! - Deterministic: same (target, method) always reaches the same handler

pub mod handler;
pub mod router;

pub use handler::{with_state, FnHandler, Handler, Reply};
pub use router::Router;
