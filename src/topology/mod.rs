//! VPN topology subsystem.
//!
//! # Data Flow
//! ```text
//! NetworkBlock (configured CIDR)
//!     → network.rs hosts() (bounded walk)
//!     → pool.rs AddressPool (address → in use)
//!     → store.rs recompute marks every server/client address used
//!
//! add_server / add_client
//!     → resolve label collisions (numeric suffix)
//!     → claim the requested address, or allocate the lowest free one,
//!       in the same lock scope as the insert
//! ```
//!
//! # Design Decisions
//! - One mutex guards servers, clients and pool together; it is never held
//!   across an await point
//! - Pool keys are typed `Ipv4Addr`, ordered ascending, so allocation order
//!   is deterministic

pub mod entity;
pub mod error;
pub mod network;
pub mod pool;
pub mod store;

pub use entity::{TopologySnapshot, VpnClient, VpnServer};
pub use error::{TopologyError, TopologyResult};
pub use network::NetworkBlock;
pub use pool::AddressPool;
pub use store::TopologyStore;
