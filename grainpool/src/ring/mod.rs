//! Consistent-hashing ring mapping logical identifiers to physical nodes.
//!
//! Two pieces: a stable wide digest ([`RingKey`]) and the ring structure
//! itself ([`HashRing`]). The digest is explicit and seed-free so every
//! cluster member computes identical coordinates from identical input;
//! the ring smooths load with virtual replicas and rebalances with
//! logarithmic updates as membership churns.

mod hash_ring;
mod key;

pub use hash_ring::{HashRing, DEFAULT_REPLICATION_FACTOR};
pub use key::RingKey;
