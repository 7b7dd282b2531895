//! Topology error definitions.

use std::net::Ipv4Addr;

use thiserror::Error;

/// Errors raised by the topology store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TopologyError {
    /// Every address in the pool is assigned.
    #[error("address space {0} exhausted")]
    AddressSpaceExhausted(String),

    /// The address is not a member of the configured block.
    #[error("address {0} is not in the pool")]
    AddressNotInPool(Ipv4Addr),

    /// Another entity already holds the address.
    #[error("address {address} is already assigned to {holder}")]
    AddressInUse { address: Ipv4Addr, holder: String },

    /// No server or client with that name.
    #[error("{kind} not found: {name}")]
    EntityNotFound { kind: &'static str, name: String },

    /// Two entities claim the same label and it could not be resolved.
    #[error("duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    /// CIDR string could not be parsed or has an unsupported prefix.
    #[error("invalid network block '{input}': {reason}")]
    InvalidCidr { input: String, reason: String },

    /// Entity fields failed validation.
    #[error("validation failed: {0}")]
    Validation(String),
}

/// Result type for topology operations.
pub type TopologyResult<T> = Result<T, TopologyError>;
