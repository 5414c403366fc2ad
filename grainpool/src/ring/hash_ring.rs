//! The consistent-hashing ring structure.

use std::collections::{BTreeMap, HashMap};

use crate::cluster::{NodeAddress, Routable};

use super::RingKey;

/// Default number of virtual replicas per physical node.
pub const DEFAULT_REPLICATION_FACTOR: usize = 100;

/// Consistent-hashing ring over physical nodes.
///
/// Each member occupies `virtual_replicas` positions so that load spreads
/// evenly even with few physical nodes. Lookup takes the bucket at the
/// smallest occupied key at or above the target, wrapping to the ring
/// minimum.
///
/// The `BTreeMap` doubles as the ordered key index: nearest-key lookup
/// and per-key insert/remove are all O(log n), which matters because
/// membership churn sits on the critical path. Replica keys are cached
/// per member at add time so removal never recomputes digests.
///
/// Buckets hold a list of owners rather than a single slot: two distinct
/// nodes can digest onto the same key. The list is kept ordered by node
/// address so that removing and re-adding any set of nodes, in any order,
/// restores the exact prior key-to-node assignment.
#[derive(Debug, Clone)]
pub struct HashRing<N> {
    members: HashMap<NodeAddress, N>,
    replica_keys: HashMap<NodeAddress, Vec<RingKey>>,
    ring: BTreeMap<RingKey, Vec<N>>,
    virtual_replicas: usize,
}

impl<N: Routable + Clone> HashRing<N> {
    /// Create an empty ring with the given replication factor.
    ///
    /// A factor of zero is clamped to one; a node must occupy at least
    /// one position to be routable.
    pub fn new(virtual_replicas: usize) -> Self {
        Self {
            members: HashMap::new(),
            replica_keys: HashMap::new(),
            ring: BTreeMap::new(),
            virtual_replicas: virtual_replicas.max(1),
        }
    }

    /// The number of virtual replicas each member occupies.
    pub fn virtual_replicas(&self) -> usize {
        self.virtual_replicas
    }

    /// Number of physical members.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// True when no member occupies the ring.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// True when a member with this address is on the ring.
    pub fn contains(&self, address: &NodeAddress) -> bool {
        self.members.contains_key(address)
    }

    /// Iterate over the physical members.
    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.members.values()
    }

    /// Add a node to the ring. No-op if it is already a member.
    pub fn add_node(&mut self, node: N) {
        let address = node.address().clone();
        if self.members.contains_key(&address) {
            return;
        }

        let node_key = address.ring_key();
        let keys: Vec<RingKey> = (0..self.virtual_replicas as u64)
            .map(|index| node_key.replica(index))
            .collect();

        for key in &keys {
            let bucket = self.ring.entry(*key).or_default();
            let position =
                bucket.partition_point(|existing| existing.address() < node.address());
            bucket.insert(position, node.clone());
        }

        self.replica_keys.insert(address.clone(), keys);
        self.members.insert(address, node);
    }

    /// Remove the member with this address from every bucket it occupies.
    ///
    /// Emptied buckets are dropped from the key index. No-op (returning
    /// `None`) if the address is not a member.
    pub fn remove_address(&mut self, address: &NodeAddress) -> Option<N> {
        let node = self.members.remove(address)?;
        if let Some(keys) = self.replica_keys.remove(address) {
            for key in keys {
                if let Some(bucket) = self.ring.get_mut(&key) {
                    bucket.retain(|member| member.address() != address);
                    if bucket.is_empty() {
                        self.ring.remove(&key);
                    }
                }
            }
        }
        Some(node)
    }

    /// Remove a node from the ring. No-op if it is not a member.
    pub fn remove_node(&mut self, node: &N) {
        self.remove_address(node.address());
    }

    /// The node owning `key`: smallest occupied key at or above it,
    /// wrapping to the ring minimum. `None` when the ring is empty.
    ///
    /// With fixed membership this is a pure, repeatable function of the
    /// key.
    pub fn get_node(&self, key: RingKey) -> Option<&N> {
        self.ring
            .range(key..)
            .next()
            .or_else(|| self.ring.iter().next())
            .and_then(|(_, bucket)| bucket.first())
    }

    /// Resolve an arbitrary byte key by digesting it first.
    pub fn get_node_for(&self, key: &[u8]) -> Option<&N> {
        self.get_node(RingKey::digest(key))
    }
}
