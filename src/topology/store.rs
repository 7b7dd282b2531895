//! Topology store: servers, clients and the address pool behind one lock.
//!
//! # Responsibilities
//! - Register servers/clients under collision-free labels
//! - Hand out and reclaim pool addresses exclusively
//! - Rebuild the pool from the configured block and current entities
//! - Produce and restore persistence snapshots
//!
//! # Design Decisions
//! - Address placement and entity insertion happen in one lock scope, so an
//!   address handed to a new entity can never be claimed twice
//! - A network change or restore that would strand an entity outside the
//!   block is rejected and leaves the store untouched
//! - Client keys and server WAN addresses end up in wg-quick files, so both
//!   are validated strictly before they are stored

use std::collections::{BTreeMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::observability::metrics;
use crate::topology::entity::{Addressed, TopologySnapshot, VpnClient, VpnServer};
use crate::topology::error::{TopologyError, TopologyResult};
use crate::topology::network::NetworkBlock;
use crate::topology::pool::AddressPool;

/// Decoded length of a WireGuard public key.
const WG_KEY_LEN: usize = 32;

#[derive(Debug)]
struct Topology {
    network: NetworkBlock,
    servers: BTreeMap<String, VpnServer>,
    clients: BTreeMap<String, VpnClient>,
    pool: AddressPool,
}

impl Topology {
    /// Label of the entity holding `addr`, if any.
    fn holder_of(&self, addr: Ipv4Addr) -> Option<String> {
        self.servers
            .values()
            .find(|s| s.vpn_address == addr)
            .map(|s| format!("server {}", s.name))
            .or_else(|| {
                self.clients
                    .values()
                    .find(|c| c.vpn_address == addr)
                    .map(|c| format!("client {}", c.name))
            })
    }

    /// Mark `addr` used on behalf of a new entity.
    fn claim(&mut self, addr: Ipv4Addr) -> TopologyResult<()> {
        match self.pool.is_used(addr) {
            None => Err(TopologyError::AddressNotInPool(addr)),
            Some(true) => Err(TopologyError::AddressInUse {
                address: addr,
                holder: self
                    .holder_of(addr)
                    .unwrap_or_else(|| "a pending allocation".to_string()),
            }),
            Some(false) => self.pool.mark_used(addr),
        }
    }

    /// Claim `requested`, or the lowest free address when none is given.
    fn place(&mut self, requested: Option<Ipv4Addr>) -> TopologyResult<Ipv4Addr> {
        match requested {
            Some(addr) => self.claim(addr).map(|()| addr),
            None => self
                .pool
                .allocate()
                .ok_or_else(|| TopologyError::AddressSpaceExhausted(self.network.to_string())),
        }
    }

    fn insert_server(
        &mut self,
        requested: Option<Ipv4Addr>,
        name: &str,
        wan_address: &str,
        port: u16,
    ) -> TopologyResult<VpnServer> {
        let label = resolve_label(&self.servers, name)?;
        let address = self.place(requested)?;
        let server = VpnServer {
            name: label.clone(),
            vpn_address: address,
            wan_address: wan_address.to_string(),
            port,
        };
        self.servers.insert(label, server.clone());
        metrics::record_pool_free(self.pool.free_count());

        tracing::info!(server = %server.name, address = %address, wan = %wan_address, "Server added");
        Ok(server)
    }

    /// Return an entity's address to the pool.
    fn release(&mut self, addr: Ipv4Addr) {
        if let Err(e) = self.pool.free(addr) {
            tracing::warn!(address = %addr, error = %e, "Released address was outside the pool");
        }
        metrics::record_pool_free(self.pool.free_count());
    }

    fn recompute(&mut self) {
        let mut pool = AddressPool::from_block(&self.network);
        let assigned = self
            .servers
            .values()
            .map(|s| (s.vpn_address, &s.name))
            .chain(self.clients.values().map(|c| (c.vpn_address, &c.name)));

        for (addr, name) in assigned {
            if pool.mark_used(addr).is_err() {
                tracing::error!(
                    address = %addr,
                    entity = %name,
                    network = %self.network,
                    "Assigned address lies outside the network block"
                );
            }
        }

        tracing::debug!(
            network = %self.network,
            total = pool.len(),
            free = pool.free_count(),
            "Address space recomputed"
        );
        metrics::record_pool_free(pool.free_count());
        self.pool = pool;
    }
}

/// Process-wide VPN topology.
#[derive(Debug)]
pub struct TopologyStore {
    inner: Mutex<Topology>,
}

impl TopologyStore {
    /// Empty topology over `network` with a freshly derived pool.
    pub fn new(network: NetworkBlock) -> Self {
        let mut topology = Topology {
            network,
            servers: BTreeMap::new(),
            clients: BTreeMap::new(),
            pool: AddressPool::default(),
        };
        topology.recompute();
        Self {
            inner: Mutex::new(topology),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Topology> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a server at `address`, or at the lowest free address when
    /// `None`. Returns the label actually stored and the address assigned.
    pub fn add_server(
        &self,
        address: Option<Ipv4Addr>,
        name: &str,
        wan_address: &str,
        port: u16,
    ) -> TopologyResult<(String, Ipv4Addr)> {
        validate_name(name)?;
        let wan_address = validate_wan_address(wan_address)?;
        validate_port(port)?;

        let server = self
            .lock()
            .insert_server(address, name, wan_address, port)?;
        Ok((server.name, server.vpn_address))
    }

    /// Return the server labelled `name`, registering it at the lowest free
    /// address first if it does not exist. The flag is true when it was
    /// created by this call.
    pub fn add_server_if_absent(
        &self,
        name: &str,
        wan_address: &str,
        port: u16,
    ) -> TopologyResult<(VpnServer, bool)> {
        validate_name(name)?;
        let wan_address = validate_wan_address(wan_address)?;
        validate_port(port)?;

        let mut topology = self.lock();
        if let Some((_, existing)) = find(&topology.servers, name) {
            return Ok((existing.clone(), false));
        }
        let server = topology.insert_server(None, name, wan_address, port)?;
        Ok((server, true))
    }

    /// Register a client at `address`, or at the lowest free address when
    /// `None`. The first client becomes the default one.
    /// Returns the label actually stored and the address assigned.
    pub fn add_client(
        &self,
        address: Option<Ipv4Addr>,
        public_key: &str,
        name: &str,
    ) -> TopologyResult<(String, Ipv4Addr)> {
        validate_name(name)?;
        let public_key = validate_public_key(public_key)?;

        let mut topology = self.lock();
        let label = resolve_label(&topology.clients, name)?;
        let address = topology.place(address)?;
        let is_default = topology.clients.is_empty();
        topology.clients.insert(
            label.clone(),
            VpnClient {
                name: label.clone(),
                vpn_address: address,
                public_key: public_key.to_string(),
                is_default,
            },
        );
        metrics::record_pool_free(topology.pool.free_count());

        tracing::info!(client = %label, address = %address, "Client added");
        Ok((label, address))
    }

    pub fn get_server(&self, name: &str) -> TopologyResult<VpnServer> {
        let topology = self.lock();
        find(&topology.servers, name)
            .map(|(_, server)| server.clone())
            .ok_or_else(|| not_found::<VpnServer>(name))
    }

    pub fn get_client(&self, name: &str) -> TopologyResult<VpnClient> {
        let topology = self.lock();
        find(&topology.clients, name)
            .map(|(_, client)| client.clone())
            .ok_or_else(|| not_found::<VpnClient>(name))
    }

    /// Remove a server and free its address.
    pub fn remove_server(&self, name: &str) -> TopologyResult<VpnServer> {
        let mut topology = self.lock();
        let key = find(&topology.servers, name)
            .map(|(key, _)| key.clone())
            .ok_or_else(|| not_found::<VpnServer>(name))?;
        let server = topology
            .servers
            .remove(&key)
            .ok_or_else(|| not_found::<VpnServer>(name))?;
        topology.release(server.vpn_address);

        tracing::info!(server = %server.name, address = %server.vpn_address, "Server removed");
        Ok(server)
    }

    /// Remove a client and free its address.
    pub fn remove_client(&self, name: &str) -> TopologyResult<VpnClient> {
        let mut topology = self.lock();
        let key = find(&topology.clients, name)
            .map(|(key, _)| key.clone())
            .ok_or_else(|| not_found::<VpnClient>(name))?;
        let client = topology
            .clients
            .remove(&key)
            .ok_or_else(|| not_found::<VpnClient>(name))?;
        topology.release(client.vpn_address);

        tracing::info!(client = %client.name, address = %client.vpn_address, "Client removed");
        Ok(client)
    }

    pub fn servers(&self) -> Vec<VpnServer> {
        self.lock().servers.values().cloned().collect()
    }

    pub fn clients(&self) -> Vec<VpnClient> {
        self.lock().clients.values().cloned().collect()
    }

    /// Claim the lowest free address in the pool.
    pub fn get_available_address(&self) -> TopologyResult<Ipv4Addr> {
        let mut topology = self.lock();
        let addr = topology
            .pool
            .allocate()
            .ok_or_else(|| TopologyError::AddressSpaceExhausted(topology.network.to_string()))?;
        metrics::record_pool_free(topology.pool.free_count());
        tracing::debug!(address = %addr, "Address allocated");
        Ok(addr)
    }

    /// Return an address to the pool.
    pub fn free_address(&self, addr: Ipv4Addr) -> TopologyResult<()> {
        let mut topology = self.lock();
        topology.pool.free(addr)?;
        metrics::record_pool_free(topology.pool.free_count());
        tracing::debug!(address = %addr, "Address freed");
        Ok(())
    }

    /// Rebuild the pool from the network block and current entities.
    pub fn recompute_address_space(&self) {
        self.lock().recompute();
    }

    /// Switch to a new network block and rebuild the pool.
    ///
    /// Fails without changing anything if a current entity's address lies
    /// outside `network`.
    pub fn set_network(&self, network: NetworkBlock) -> TopologyResult<()> {
        let mut topology = self.lock();
        ensure_within(&network, &topology.servers, &topology.clients)?;

        tracing::info!(from = %topology.network, to = %network, "Network block changed");
        topology.network = network;
        topology.recompute();
        Ok(())
    }

    pub fn network(&self) -> NetworkBlock {
        self.lock().network
    }

    /// `(total, free)` pool addresses.
    pub fn pool_stats(&self) -> (usize, usize) {
        let topology = self.lock();
        (topology.pool.len(), topology.pool.free_count())
    }

    /// `Some(in_use)` for pool members.
    pub fn is_address_used(&self, addr: Ipv4Addr) -> Option<bool> {
        self.lock().pool.is_used(addr)
    }

    pub fn snapshot(&self) -> TopologySnapshot {
        let topology = self.lock();
        TopologySnapshot {
            network: topology.network,
            servers: topology.servers.clone(),
            clients: topology.clients.clone(),
        }
    }

    /// Replace the whole topology with `snapshot` and rebuild the pool.
    pub fn restore(&self, snapshot: TopologySnapshot) -> TopologyResult<()> {
        check_unique_names(&snapshot.servers)?;
        check_unique_names(&snapshot.clients)?;
        for server in snapshot.servers.values() {
            validate_name(&server.name)?;
            validate_wan_address(&server.wan_address)?;
            validate_port(server.port)?;
        }
        for client in snapshot.clients.values() {
            validate_name(&client.name)?;
            validate_public_key(&client.public_key)?;
        }
        ensure_within(&snapshot.network, &snapshot.servers, &snapshot.clients)?;

        let mut seen: BTreeMap<Ipv4Addr, &str> = BTreeMap::new();
        let assigned = snapshot
            .servers
            .values()
            .map(|s| (s.vpn_address, s.name.as_str()))
            .chain(snapshot.clients.values().map(|c| (c.vpn_address, c.name.as_str())));
        for (addr, name) in assigned {
            if let Some(holder) = seen.insert(addr, name) {
                return Err(TopologyError::AddressInUse {
                    address: addr,
                    holder: holder.to_string(),
                });
            }
        }

        let mut topology = self.lock();
        topology.network = snapshot.network;
        topology.servers = snapshot.servers;
        topology.clients = snapshot.clients;
        topology.recompute();

        tracing::info!(
            network = %topology.network,
            servers = topology.servers.len(),
            clients = topology.clients.len(),
            "Topology restored"
        );
        Ok(())
    }
}

fn validate_name(name: &str) -> TopologyResult<()> {
    if name.trim().is_empty() {
        return Err(TopologyError::Validation("name is empty".into()));
    }
    if name.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(TopologyError::Validation(format!(
            "name {name:?} contains whitespace or control characters"
        )));
    }
    Ok(())
}

fn validate_port(port: u16) -> TopologyResult<()> {
    if port == 0 {
        return Err(TopologyError::Validation("port must be non-zero".into()));
    }
    Ok(())
}

/// Trimmed WAN address; a host name or IP, so no inner whitespace.
fn validate_wan_address(wan_address: &str) -> TopologyResult<&str> {
    let trimmed = wan_address.trim();
    if trimmed.is_empty() {
        return Err(TopologyError::Validation("wan address is empty".into()));
    }
    if trimmed.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(TopologyError::Validation(format!(
            "wan address {trimmed:?} contains whitespace or control characters"
        )));
    }
    Ok(trimmed)
}

/// Trimmed public key; must be 32 bytes in padded standard base64.
fn validate_public_key(public_key: &str) -> TopologyResult<&str> {
    let trimmed = public_key.trim();
    if trimmed.is_empty() {
        return Err(TopologyError::Validation("public key is empty".into()));
    }
    let decoded = STANDARD
        .decode(trimmed)
        .map_err(|e| TopologyError::Validation(format!("public key is not base64: {e}")))?;
    if decoded.len() != WG_KEY_LEN {
        return Err(TopologyError::Validation(format!(
            "public key decodes to {} bytes, expected {WG_KEY_LEN}",
            decoded.len()
        )));
    }
    Ok(trimmed)
}

/// Every entity address must be a member of `network`.
fn ensure_within(
    network: &NetworkBlock,
    servers: &BTreeMap<String, VpnServer>,
    clients: &BTreeMap<String, VpnClient>,
) -> TopologyResult<()> {
    let assigned = servers
        .values()
        .map(|s| (VpnServer::KIND, s.name.as_str(), s.vpn_address))
        .chain(clients.values().map(|c| (VpnClient::KIND, c.name.as_str(), c.vpn_address)));
    for (kind, name, addr) in assigned {
        if !network.contains(addr) {
            return Err(TopologyError::Validation(format!(
                "{kind} {name} holds {addr}, which is outside {network}"
            )));
        }
    }
    Ok(())
}

fn not_found<E: Addressed>(name: &str) -> TopologyError {
    TopologyError::EntityNotFound {
        kind: E::KIND,
        name: name.to_string(),
    }
}

/// Keyed lookup first, then a scan on the entity's own name.
fn find<'a, E: Addressed>(map: &'a BTreeMap<String, E>, name: &str) -> Option<(&'a String, &'a E)> {
    map.get_key_value(name)
        .or_else(|| map.iter().find(|(_, entity)| entity.label() == name))
}

/// Split a trailing run of ASCII digits off `name`.
fn split_numeric_suffix(name: &str) -> (&str, Option<u64>) {
    let base = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if base.len() == name.len() {
        return (name, None);
    }
    (base, name[base.len()..].parse().ok())
}

/// Pick a label for `requested` that no entity in `map` uses yet.
///
/// On collision the colliding entity's numeric suffix is incremented
/// (`a0` → `a1`); a colliding name without one gets suffix `0` (`a` → `a0`).
fn resolve_label<E: Addressed>(map: &BTreeMap<String, E>, requested: &str) -> TopologyResult<String> {
    let mut candidate = requested.to_string();

    for _ in 0..=map.len() {
        let Some((_, existing)) = find(map, &candidate) else {
            return Ok(candidate);
        };

        let stored = existing.label();
        candidate = match split_numeric_suffix(stored) {
            (base, Some(n)) if n < u64::MAX => format!("{base}{}", n + 1),
            _ => {
                tracing::warn!(
                    kind = E::KIND,
                    name = %stored,
                    "Name collision without numeric suffix, appending 0"
                );
                format!("{stored}0")
            }
        };
    }

    Err(TopologyError::DuplicateName {
        kind: E::KIND,
        name: requested.to_string(),
    })
}

fn check_unique_names<E: Addressed>(map: &BTreeMap<String, E>) -> TopologyResult<()> {
    let mut names = HashSet::new();
    for entity in map.values() {
        if !names.insert(entity.label()) {
            return Err(TopologyError::DuplicateName {
                kind: E::KIND,
                name: entity.label().to_string(),
            });
        }
    }
    Ok(())
}
