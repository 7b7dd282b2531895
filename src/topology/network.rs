//! IPv4 network blocks and CIDR enumeration.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::topology::error::TopologyError;

/// Smallest prefix accepted; a /8 already enumerates 16M addresses.
pub const MIN_PREFIX: u8 = 8;

/// An IPv4 address plus prefix length defining the VPN address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NetworkBlock {
    address: Ipv4Addr,
    prefix: u8,
}

impl NetworkBlock {
    /// Create a block, validating the prefix.
    pub fn new(address: Ipv4Addr, prefix: u8) -> Result<Self, TopologyError> {
        if !(MIN_PREFIX..=32).contains(&prefix) {
            return Err(TopologyError::InvalidCidr {
                input: format!("{address}/{prefix}"),
                reason: format!("prefix must be between {MIN_PREFIX} and 32"),
            });
        }
        Ok(Self { address, prefix })
    }

    /// Address as configured (host bits may be set).
    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn prefix(&self) -> u8 {
        self.prefix
    }

    /// Netmask as an integer.
    pub fn mask(&self) -> u32 {
        if self.prefix == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix as u32)
        }
    }

    /// Network address (host bits zero).
    pub fn network(&self) -> Ipv4Addr {
        Ipv4Addr::from(u32::from(self.address) & self.mask())
    }

    /// True if `addr` falls within this block.
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        u32::from(addr) & self.mask() == u32::from(self.network())
    }

    /// Number of addresses in the block, network and broadcast included.
    pub fn capacity(&self) -> u64 {
        1u64 << (32 - self.prefix as u32)
    }

    /// Every address in the block, ascending, network and broadcast included.
    ///
    /// Walks forward from the network address, keeping each successor while it
    /// still masks to the same network. The walk is a loop bounded by the
    /// block's capacity, so stack use is constant regardless of block size.
    pub fn hosts(&self) -> Vec<Ipv4Addr> {
        let mask = self.mask();
        let network = u32::from(self.network());
        let capacity = self.capacity();

        let mut hosts = Vec::with_capacity(capacity as usize);
        let mut current = network;
        hosts.push(Ipv4Addr::from(current));

        for _ in 1..capacity {
            let next = match current.checked_add(1) {
                Some(next) => next,
                None => break,
            };
            if next & mask != network {
                break;
            }
            hosts.push(Ipv4Addr::from(next));
            current = next;
        }

        hosts
    }
}

impl fmt::Display for NetworkBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.prefix)
    }
}

impl FromStr for NetworkBlock {
    type Err = TopologyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| TopologyError::InvalidCidr {
            input: s.to_string(),
            reason: reason.to_string(),
        };

        let (addr, prefix) = s.trim().split_once('/').ok_or_else(|| invalid("missing '/prefix'"))?;
        let address: Ipv4Addr = addr.parse().map_err(|_| invalid("bad IPv4 address"))?;
        let prefix: u8 = prefix.parse().map_err(|_| invalid("bad prefix length"))?;
        Self::new(address, prefix)
    }
}

impl TryFrom<String> for NetworkBlock {
    type Error = TopologyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NetworkBlock> for String {
    fn from(block: NetworkBlock) -> Self {
        block.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slash_30_membership() {
        let block: NetworkBlock = "192.168.50.0/30".parse().unwrap();
        let expected: Vec<Ipv4Addr> = vec![
            Ipv4Addr::new(192, 168, 50, 0),
            Ipv4Addr::new(192, 168, 50, 1),
            Ipv4Addr::new(192, 168, 50, 2),
            Ipv4Addr::new(192, 168, 50, 3),
        ];
        assert_eq!(block.hosts(), expected);
    }

    #[test]
    fn test_slash_24_membership() {
        let block: NetworkBlock = "10.0.0.0/24".parse().unwrap();
        let hosts = block.hosts();
        assert_eq!(hosts.len(), 256);
        for (i, addr) in hosts.iter().enumerate() {
            assert_eq!(*addr, Ipv4Addr::new(10, 0, 0, i as u8));
        }
        assert!(!hosts.contains(&Ipv4Addr::new(10, 0, 1, 0)));
    }

    #[test]
    fn test_host_bits_are_masked() {
        let block: NetworkBlock = "10.8.0.77/29".parse().unwrap();
        assert_eq!(block.network(), Ipv4Addr::new(10, 8, 0, 72));
        let hosts = block.hosts();
        assert_eq!(hosts.first(), Some(&Ipv4Addr::new(10, 8, 0, 72)));
        assert_eq!(hosts.last(), Some(&Ipv4Addr::new(10, 8, 0, 79)));
    }

    #[test]
    fn test_single_address_and_top_of_space() {
        let block: NetworkBlock = "10.1.2.3/32".parse().unwrap();
        assert_eq!(block.hosts(), vec![Ipv4Addr::new(10, 1, 2, 3)]);

        let block: NetworkBlock = "255.255.255.252/30".parse().unwrap();
        assert_eq!(block.hosts().len(), 4);
        assert_eq!(block.hosts().last(), Some(&Ipv4Addr::BROADCAST));
    }

    #[test]
    fn test_large_block_does_not_recurse() {
        let block: NetworkBlock = "10.0.0.0/12".parse().unwrap();
        let hosts = block.hosts();
        assert_eq!(hosts.len() as u64, block.capacity());
        assert_eq!(hosts.last(), Some(&Ipv4Addr::new(10, 15, 255, 255)));
    }

    #[test]
    fn test_contains() {
        let block: NetworkBlock = "10.0.0.0/24".parse().unwrap();
        assert!(block.contains(Ipv4Addr::new(10, 0, 0, 200)));
        assert!(!block.contains(Ipv4Addr::new(10, 0, 1, 1)));
    }

    #[test]
    fn test_parse_errors() {
        assert!("10.0.0.0".parse::<NetworkBlock>().is_err());
        assert!("10.0.0/24".parse::<NetworkBlock>().is_err());
        assert!("10.0.0.0/33".parse::<NetworkBlock>().is_err());
        assert!("10.0.0.0/4".parse::<NetworkBlock>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let block: NetworkBlock = serde_json::from_str("\"10.8.0.0/24\"").unwrap();
        assert_eq!(serde_json::to_string(&block).unwrap(), "\"10.8.0.0/24\"");
        assert!(serde_json::from_str::<NetworkBlock>("\"nope\"").is_err());
    }
}
