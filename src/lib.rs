//! Yosai fleet-orchestration daemon library.

// Wire and transport
pub mod net;
pub mod protocol;
pub mod routing;
pub mod server;

// Domain
pub mod handlers;
pub mod keyring;
pub mod state;
pub mod topology;

// Collaborators
pub mod backends;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::DaemonConfig;
pub use error::{DaemonError, DaemonResult};
pub use lifecycle::Shutdown;
pub use server::DaemonServer;
pub use state::DaemonState;
