//! Credential keyring subsystem.
//!
//! # Data Flow
//! ```text
//! get_key(name)
//!     → chain.rs cache hit? return
//!     → rung 0 (env) → rung 1 (file) → rung 2 (vault, after bootstrap) ...
//!     → first success committed to cache, then returned
//!     → no success: last rung failure, or KeyNotFound if every rung missed
//! ```
//!
//! # Design Decisions
//! - Rungs share the keyring's own `KeyStore` trait, so chains nest
//! - Secrets never appear in Debug output or listings

pub mod chain;
pub mod error;
pub mod key;
pub mod rungs;

pub use chain::{KeyStore, KeySummary, Keyring};
pub use error::{KeyringError, KeyringResult};
pub use key::{
    BasicAuth, BearerToken, Key, KeySpec, OAuthClientCredentials, SharedKey, SshKeypair, VaultItem,
};
pub use rungs::{EnvRung, FileRung};
