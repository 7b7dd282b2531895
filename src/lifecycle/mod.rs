//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Keyring rungs → Topology (+ persisted snapshot) → Collaborators → DaemonState
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Remove socket
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: credentials first, since collaborators resolve theirs lazily
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has timeout: the drain gives up after a deadline

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use signals::wait_for_shutdown_signal;
pub use startup::build_state;
