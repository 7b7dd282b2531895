//! Address pool derived from a network block.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;

use crate::topology::error::{TopologyError, TopologyResult};
use crate::topology::network::NetworkBlock;

/// Mapping of every block address to its in-use flag, ordered ascending.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AddressPool {
    slots: BTreeMap<Ipv4Addr, bool>,
}

impl AddressPool {
    /// Pool with every address of `block` marked free.
    pub fn from_block(block: &NetworkBlock) -> Self {
        Self {
            slots: block.hosts().into_iter().map(|addr| (addr, false)).collect(),
        }
    }

    /// Claim the lowest free address.
    pub fn allocate(&mut self) -> Option<Ipv4Addr> {
        let (addr, used) = self.slots.iter_mut().find(|(_, used)| !**used)?;
        *used = true;
        Some(*addr)
    }

    /// Mark `addr` as in use.
    pub fn mark_used(&mut self, addr: Ipv4Addr) -> TopologyResult<()> {
        match self.slots.get_mut(&addr) {
            Some(used) => {
                *used = true;
                Ok(())
            }
            None => Err(TopologyError::AddressNotInPool(addr)),
        }
    }

    /// Mark `addr` as free.
    pub fn free(&mut self, addr: Ipv4Addr) -> TopologyResult<()> {
        match self.slots.get_mut(&addr) {
            Some(used) => {
                *used = false;
                Ok(())
            }
            None => Err(TopologyError::AddressNotInPool(addr)),
        }
    }

    /// `Some(in_use)` for pool members, `None` otherwise.
    pub fn is_used(&self, addr: Ipv4Addr) -> Option<bool> {
        self.slots.get(&addr).copied()
    }

    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        self.slots.contains_key(&addr)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Number of unassigned addresses.
    pub fn free_count(&self) -> usize {
        self.slots.values().filter(|used| !**used).count()
    }

    /// Addresses currently marked used, ascending.
    pub fn in_use(&self) -> Vec<Ipv4Addr> {
        self.slots
            .iter()
            .filter(|(_, used)| **used)
            .map(|(addr, _)| *addr)
            .collect()
    }
}
