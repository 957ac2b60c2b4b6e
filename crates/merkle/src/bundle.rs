//! Self-contained proof package for handing leaves to a remote verifier.

use merklesync_primitives::block::BlockId;
use merklesync_primitives::hash::Hash;
use serde::{Deserialize, Serialize};

use crate::error::MerkleResult;
use crate::proof::MerkleProof;
use crate::tree::MerkleTree;
use crate::verify::verify_proof;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundledLeaf {
    pub id: BlockId,
    #[serde(with = "hex::serde")]
    pub payload: Vec<u8>,
}

/// A root hash, the proven leaves and the proof tying them together.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofBundle {
    pub root_hash: Hash,
    pub leaves: Vec<BundledLeaf>,
    pub proof: MerkleProof,
}

impl ProofBundle {
    /// Prove `ids` against `tree` and package the result with the leaf payloads.
    pub fn create<I>(tree: &MerkleTree, ids: I) -> MerkleResult<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let proof = tree.generate_proof(ids)?;

        // Root exists: proof generation rejects empty trees
        let root_hash = tree.root_hash().unwrap_or_default();

        let leaves = proof
            .leaf_ids()
            .filter_map(|id| tree.position_of(id.as_str()))
            .filter_map(|position| tree.leaf(position))
            .map(|leaf| BundledLeaf {
                id: leaf.id().clone(),
                payload: leaf.payload().to_vec(),
            })
            .collect();

        Ok(Self {
            root_hash,
            leaves,
            proof,
        })
    }

    /// Verify against the root carried in the bundle.
    pub fn verify(&self) -> MerkleResult<bool> {
        self.verify_against(&self.root_hash)
    }

    /// Verify against an independently trusted root.
    pub fn verify_against(&self, root_hash: &Hash) -> MerkleResult<bool> {
        let leaves: Vec<(BlockId, &[u8])> = self
            .leaves
            .iter()
            .map(|leaf| (leaf.id.clone(), leaf.payload.as_slice()))
            .collect();

        verify_proof(root_hash, &leaves, &self.proof)
    }
}
