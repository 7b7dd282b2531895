//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Unix socket connection
//!     → listener.rs (admission semaphore, connection limits)
//!     → connection.rs (read one frame → Router::dispatch → write one frame)
//!     → close
//! ```
//!
//! # Design Decisions
//! - Bounded admission prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - Socket file permissions are the only access control

pub mod connection;
pub mod listener;

pub use connection::{handle_connection, ConnectionError, ConnectionId, ConnectionLimits, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
