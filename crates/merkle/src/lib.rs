//! Binary Merkle tree engine for block synchronisation
//!
//! This crate builds an in-memory binary hash tree over an ordered list of
//! opaque blocks, produces inclusion proofs for any non-empty subset of
//! leaves, verifies those proofs against a root hash and reports the leaves at
//! which two trees disagree. It holds no state between calls and performs no
//! I/O, which keeps it independent of the service and transport layers.
//!
//! ## Core Concepts
//!
//! - **MerkleTree**: immutable tree built from `(BlockId, payload)` pairs
//! - **MerkleProof**: level-by-level record of derived and supplied positions
//! - **verify_proof**: replays a proof against caller-held leaves
//! - **diff**: structural comparison of two trees

pub mod bundle;
pub mod diff;
pub mod error;
pub mod hashing;
pub mod proof;
pub mod tree;
pub mod verify;


pub use bundle::{BundledLeaf, ProofBundle};
pub use diff::{diff, DiffSide, LeafDiff, TreeDiff};
pub use error::{MerkleError, MerkleResult, ProofDefect};
pub use hashing::{internal_hash, leaf_hash, INTERNAL_PREFIX, LEAF_PREFIX};
pub use merklesync_primitives::block::BlockId;
pub use merklesync_primitives::hash::Hash;
pub use proof::{MerkleProof, ProofEntry, ProofLevel, ProofSlot};
pub use tree::{Leaf, MerkleTree, Node, NodeIndex};
pub use verify::verify_proof;
