//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → DaemonConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_config_or_default, parse_config, ConfigError};
pub use schema::{
    BackendsConfig, DaemonConfig, KeyringConfig, ListenerConfig, NetworkConfig,
    ObservabilityConfig, PersistenceConfig, WireguardConfig,
};
pub use validation::ValidationError;
