//! External collaborators: secrets vault, cloud provider, automation server,
//! configuration persistence and WireGuard control.
//!
//! # Responsibilities
//! - Define one trait per collaborator capability
//! - Provide thin reqwest-based implementations authorized from the keyring
//!
//! # Design Decisions
//! - Handlers depend on the traits only; tests substitute fakes or mock servers
//! - Every outbound call carries a timeout and is attempted once

pub mod automation;
pub mod cloud;
pub mod error;
pub mod http;
pub mod persistence;
pub mod vault;
pub mod wireguard;

pub use automation::{AutomationServer, HostEntry, HttpAutomation, Job, Project, Repository};
pub use cloud::{CloudProvider, HttpCloud, InstanceInfo, InstanceSpec, Region};
pub use error::{BackendError, BackendResult};
pub use http::{Credential, RestClient};
pub use persistence::{ConfigPersistence, FileConfigStore, HttpConfigStore};
pub use vault::{HttpVault, SecretsBackend, VaultRung};
pub use wireguard::{InterfaceSettings, WgQuick, WireguardControl};
