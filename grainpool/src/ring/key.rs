//! Stable ring coordinates.
//!
//! [`RingKey`] is a 128-bit digest split into two 64-bit words with a
//! total lexicographic order. Keys come from MurmurHash3 x64/128 with a
//! fixed zero seed: deterministic across process restarts and across
//! members, unlike `std`'s randomized default hasher, which must never
//! be used for ring coordinates.

use std::fmt;
use std::io::Cursor;

use serde::{Deserialize, Serialize};

/// A point on the consistent-hashing ring.
///
/// Equal inputs digest to equal keys on every member. Field order gives
/// the derived `Ord` the lexicographic `(first, second)` comparison.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RingKey {
    /// High 64 bits of the digest.
    pub first: u64,
    /// Low 64 bits of the digest.
    pub second: u64,
}

impl RingKey {
    /// Digest a byte string into a ring coordinate.
    pub fn digest(bytes: &[u8]) -> Self {
        let wide = murmur3::murmur3_x64_128(&mut Cursor::new(bytes), 0)
            .expect("reading from an in-memory cursor cannot fail");
        Self {
            first: (wide >> 64) as u64,
            second: wide as u64,
        }
    }

    /// Derive the key for one virtual replica of this node key.
    ///
    /// Re-digests the node key concatenated with the replica index, so
    /// replica keys spread over the whole ring instead of clustering
    /// around the node key.
    pub fn replica(&self, index: u64) -> Self {
        let mut bytes = [0u8; 24];
        bytes[..8].copy_from_slice(&self.first.to_be_bytes());
        bytes[8..16].copy_from_slice(&self.second.to_be_bytes());
        bytes[16..].copy_from_slice(&index.to_be_bytes());
        Self::digest(&bytes)
    }
}

impl fmt::Display for RingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{:016x}", self.first, self.second)
    }
}
