//! Domain-separated node hashing.
//!
//! Leaf and internal digests use distinct prefixes so that no leaf payload can
//! be passed off as an internal node, and vice versa.

use merklesync_primitives::hash::Hash;
use sha2::{Digest, Sha256};

pub const LEAF_PREFIX: &[u8] = b"LEAF:";
pub const INTERNAL_PREFIX: &[u8] = b"INTERNAL:";

/// Compute the hash for a leaf payload.
///
/// Formula: H("LEAF:" || payload)
#[must_use]
pub fn leaf_hash(payload: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(LEAF_PREFIX);
    hasher.update(payload);

    let hash_bytes: [u8; 32] = hasher.finalize().into();
    hash_bytes.into()
}

/// Compute the hash for an internal node.
///
/// Formula: H("INTERNAL:" || left || right). Not commutative.
#[must_use]
pub fn internal_hash(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(INTERNAL_PREFIX);
    hasher.update(left.as_bytes());
    hasher.update(right.as_bytes());

    let hash_bytes: [u8; 32] = hasher.finalize().into();
    hash_bytes.into()
}
