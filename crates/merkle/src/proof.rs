//! Multi-leaf inclusion proofs.
//!
//! A proof walks the tree from the leaf level to the root. Each level states
//! how many nodes the builder produced there and, for every position the
//! verifier needs, whether that position is derived from the requested leaves
//! or supplied as proof material. Positions are explicit, so a verifier can
//! replay the builder's pairing for any subset of leaves, including the
//! duplication of an odd trailing node.

use std::collections::BTreeMap;

use merklesync_primitives::block::BlockId;
use merklesync_primitives::hash::Hash;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{MerkleError, MerkleResult};
use crate::tree::MerkleTree;

/// What the verifier does at one position of one level.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofSlot {
    /// Leaf level only: hash the payload the verifier holds for this leaf.
    Leaf(BlockId),

    /// Above the leaf level: combine the two children from the level below.
    Derived,

    /// Take this hash as given.
    Supplied(Hash),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofEntry {
    pub position: usize,
    pub slot: ProofSlot,
}

/// One level of a proof.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofLevel {
    /// Total node count the builder produced at this level.
    pub width: usize,

    /// Positions the verifier needs, in ascending order.
    pub entries: Vec<ProofEntry>,
}

impl ProofLevel {
    fn new(width: usize, entries: BTreeMap<usize, ProofSlot>) -> Self {
        Self {
            width,
            entries: entries
                .into_iter()
                .map(|(position, slot)| ProofEntry { position, slot })
                .collect(),
        }
    }

    pub fn supplied(&self) -> impl Iterator<Item = (usize, &Hash)> + '_ {
        self.entries.iter().filter_map(|entry| match &entry.slot {
            ProofSlot::Supplied(hash) => Some((entry.position, hash)),
            ProofSlot::Leaf(_) | ProofSlot::Derived => None,
        })
    }
}

/// Proof that a set of leaves belongs to a tree with a given root.
///
/// `levels[0]` is the leaf level and the last level holds the root.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    pub levels: Vec<ProofLevel>,
}

impl MerkleProof {
    /// Leaf count of the tree the proof was generated from.
    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.levels.first().map_or(0, |level| level.width)
    }

    /// Identifiers the proof expects the verifier to supply, in leaf order.
    pub fn leaf_ids(&self) -> impl Iterator<Item = &BlockId> + '_ {
        self.levels
            .first()
            .into_iter()
            .flat_map(|level| &level.entries)
            .filter_map(|entry| match &entry.slot {
                ProofSlot::Leaf(id) => Some(id),
                ProofSlot::Derived | ProofSlot::Supplied(_) => None,
            })
    }

    /// Number of hashes carried as proof material across every level.
    #[must_use]
    pub fn supplied_count(&self) -> usize {
        self.levels
            .iter()
            .map(|level| level.supplied().count())
            .sum()
    }
}

impl MerkleTree {
    /// Generate a proof covering every leaf named in `ids`.
    ///
    /// Repeated identifiers are collapsed. Requested leaves that are siblings
    /// of each other need no supplied hash between them.
    pub fn generate_proof<I>(&self, ids: I) -> MerkleResult<MerkleProof>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        if self.is_empty() {
            return Err(MerkleError::EmptyTree);
        }

        let mut known = BTreeMap::new();

        for id in ids {
            let id = id.as_ref();
            let position = self
                .position_of(id)
                .ok_or_else(|| MerkleError::NotFound(BlockId::from(id)))?;

            let _ignored = known.insert(position, ProofSlot::Leaf(BlockId::from(id)));
        }

        if known.is_empty() {
            return Err(MerkleError::EmptyRequest);
        }

        let requested = known.len();
        let mut levels = Vec::with_capacity(self.height());

        for level in 0..self.height() {
            let width = self.level_width(level);
            let mut entries = known.clone();

            for &position in known.keys() {
                let sibling = position ^ 1;

                if known.contains_key(&sibling) {
                    continue;
                }

                // A missing sibling is the odd node out: the verifier duplicates
                if let Some(hash) = self.level_hash(level, sibling) {
                    let _ignored = entries.insert(sibling, ProofSlot::Supplied(hash));
                }
            }

            levels.push(ProofLevel::new(width, entries));

            known = known
                .keys()
                .map(|position| (position / 2, ProofSlot::Derived))
                .collect();
        }

        let proof = MerkleProof { levels };

        debug!(
            requested,
            levels = proof.levels.len(),
            supplied = proof.supplied_count(),
            "Generated merkle proof"
        );

        Ok(proof)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::{internal_hash, leaf_hash};

    fn tree_of(payloads: &[&str]) -> MerkleTree {
        MerkleTree::build(
            payloads
                .iter()
                .enumerate()
                .map(|(i, p)| (BlockId::from(i.to_string()), p.as_bytes().to_vec())),
        )
    }

    #[test]
    fn test_proof_for_first_of_four_supplies_two_hashes() {
        let tree = tree_of(&["data1", "data2", "data3", "data4"]);
        let proof = tree.generate_proof(["0"]).unwrap();

        assert_eq!(proof.levels.len(), 3);
        assert_eq!(proof.supplied_count(), 2);

        let level0: Vec<_> = proof.levels[0].supplied().collect();
        assert_eq!(level0, vec![(1, &leaf_hash(b"data2"))]);

        let level1: Vec<_> = proof.levels[1].supplied().collect();
        let h34 = internal_hash(&leaf_hash(b"data3"), &leaf_hash(b"data4"));
        assert_eq!(level1, vec![(1, &h34)]);

        assert_eq!(
            proof.levels[2].entries,
            vec![ProofEntry {
                position: 0,
                slot: ProofSlot::Derived
            }]
        );
    }

    #[test]
    fn test_sibling_leaves_need_no_supplied_hash_between_them() {
        let tree = tree_of(&["data1", "data2", "data3", "data4"]);
        let proof = tree.generate_proof(["0", "1"]).unwrap();

        assert_eq!(proof.levels[0].supplied().count(), 0);
        assert_eq!(proof.supplied_count(), 1);
    }

    #[test]
    fn test_all_leaves_need_no_supplied_hashes() {
        let tree = tree_of(&["a", "b", "c", "d", "e"]);
        let proof = tree.generate_proof(["0", "1", "2", "3", "4"]).unwrap();

        assert_eq!(proof.supplied_count(), 0);
        assert_eq!(proof.leaf_ids().count(), 5);
    }

    #[test]
    fn test_odd_trailing_leaf_has_no_supplied_sibling() {
        let tree = tree_of(&["a", "b", "c"]);
        let proof = tree.generate_proof(["2"]).unwrap();

        // Level 0: leaf 2 alone, duplicated by the verifier
        assert_eq!(proof.levels[0].entries.len(), 1);
        // Level 1: sibling (0) is supplied
        let level1: Vec<_> = proof.levels[1].supplied().collect();
        let h01 = internal_hash(&leaf_hash(b"a"), &leaf_hash(b"b"));
        assert_eq!(level1, vec![(0, &h01)]);
    }

    #[test]
    fn test_widths_follow_tree_levels() {
        let tree = tree_of(&["a", "b", "c", "d", "e", "f"]);
        let proof = tree.generate_proof(["3"]).unwrap();

        let widths: Vec<_> = proof.levels.iter().map(|level| level.width).collect();
        assert_eq!(widths, vec![6, 3, 2, 1]);
        assert_eq!(proof.leaf_count(), 6);
    }

    #[test]
    fn test_repeated_ids_are_collapsed() {
        let tree = tree_of(&["a", "b", "c", "d"]);
        let once = tree.generate_proof(["2"]).unwrap();
        let twice = tree.generate_proof(["2", "2"]).unwrap();

        assert_eq!(once, twice);
    }

    #[test]
    fn test_errors() {
        let empty = tree_of(&[]);
        assert_eq!(empty.generate_proof(["0"]), Err(MerkleError::EmptyTree));

        let tree = tree_of(&["a", "b"]);
        assert_eq!(
            tree.generate_proof(Vec::<BlockId>::new()),
            Err(MerkleError::EmptyRequest)
        );
        assert_eq!(
            tree.generate_proof(["0", "missing"]),
            Err(MerkleError::NotFound(BlockId::from("missing")))
        );
    }

    #[test]
    fn test_single_leaf_tree_proof() {
        let tree = tree_of(&["only"]);
        let proof = tree.generate_proof(["0"]).unwrap();

        assert_eq!(proof.levels.len(), 1);
        assert_eq!(proof.levels[0].width, 1);
        assert_eq!(proof.supplied_count(), 0);
    }

    #[test]
    fn test_proof_serializes_with_hex_hashes() {
        let tree = tree_of(&["data1", "data2"]);
        let proof = tree.generate_proof(["0"]).unwrap();

        let json = serde_json::to_value(&proof).unwrap();
        assert_eq!(
            json["levels"][0]["entries"][1]["slot"]["supplied"],
            serde_json::json!(leaf_hash(b"data2").to_hex())
        );

        let back: MerkleProof = serde_json::from_value(json).unwrap();
        assert_eq!(back, proof);
    }
}
