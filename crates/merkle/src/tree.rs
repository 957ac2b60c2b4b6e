//! Merkle tree construction.

use std::collections::HashMap;

use merklesync_primitives::block::{BlockId, DataBlock};
use merklesync_primitives::hash::Hash;
use tracing::debug;

use crate::hashing::{internal_hash, leaf_hash};

/// Index of a node in the tree's arena.
pub type NodeIndex = usize;

/// A leaf of the tree: one input payload and its identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Leaf {
    id: BlockId,
    payload: Vec<u8>,
    hash: Hash,
}

impl Leaf {
    fn new(id: BlockId, payload: Vec<u8>) -> Self {
        let hash = leaf_hash(&payload);
        Self { id, payload, hash }
    }

    #[must_use]
    pub const fn id(&self) -> &BlockId {
        &self.id
    }

    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    #[must_use]
    pub const fn hash(&self) -> Hash {
        self.hash
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Node {
    /// Wraps the leaf at `position` in the tree's leaf sequence.
    Leaf { hash: Hash, position: usize },

    /// Combines two children.
    ///
    /// `right` is `None` when `left` was the odd node out on its level and
    /// was paired with a copy of its own hash. Such a node covers only the
    /// leaves under `left`.
    Internal {
        hash: Hash,
        left: NodeIndex,
        right: Option<NodeIndex>,
    },
}

impl Node {
    #[must_use]
    pub const fn hash(&self) -> Hash {
        match *self {
            Self::Leaf { hash, .. } | Self::Internal { hash, .. } => hash,
        }
    }

    #[must_use]
    pub const fn is_leaf(&self) -> bool {
        matches!(self, Self::Leaf { .. })
    }
}

/// An immutable binary Merkle tree over an ordered list of leaves.
///
/// Nodes live in a single arena and refer to their children by index. Level
/// 0 holds the leaf nodes in insertion order; the last level holds the root.
#[derive(Clone, Debug, Default)]
pub struct MerkleTree {
    leaves: Vec<Leaf>,
    nodes: Vec<Node>,
    levels: Vec<Vec<NodeIndex>>,
    positions: HashMap<BlockId, usize>,
}

impl MerkleTree {
    /// Build a tree from `(identifier, payload)` pairs in order.
    ///
    /// Never fails. Zero leaves produce an empty tree without a root.
    pub fn build<I, P>(leaves: I) -> Self
    where
        I: IntoIterator<Item = (BlockId, P)>,
        P: Into<Vec<u8>>,
    {
        let leaves: Vec<Leaf> = leaves
            .into_iter()
            .map(|(id, payload)| Leaf::new(id, payload.into()))
            .collect();

        let mut positions = HashMap::with_capacity(leaves.len());
        for (position, leaf) in leaves.iter().enumerate() {
            // Identifiers are expected to be unique; lookups resolve to the first
            let _ignored = positions.entry(leaf.id.clone()).or_insert(position);
        }

        let (nodes, levels) = build_levels(&leaves);

        let tree = Self {
            leaves,
            nodes,
            levels,
            positions,
        };

        debug!(
            leaves = tree.leaf_count(),
            height = tree.height(),
            root = %tree.root_hash_hex(),
            "Built merkle tree"
        );

        tree
    }

    /// Build a tree from data blocks, using each block's id and payload.
    pub fn from_blocks<'a, I>(blocks: I) -> Self
    where
        I: IntoIterator<Item = &'a DataBlock>,
    {
        Self::build(
            blocks
                .into_iter()
                .map(|block| (block.id.clone(), block.payload.clone())),
        )
    }

    #[must_use]
    pub fn root(&self) -> Option<NodeIndex> {
        self.levels.last().and_then(|level| level.first()).copied()
    }

    #[must_use]
    pub fn root_hash(&self) -> Option<Hash> {
        self.root().map(|index| self.nodes[index].hash())
    }

    /// Root hash as lowercase hex, or an empty string for an empty tree.
    #[must_use]
    pub fn root_hash_hex(&self) -> String {
        self.root_hash().map(|hash| hash.to_hex()).unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    #[must_use]
    pub fn leaf_count(&self) -> usize {
        self.leaves.len()
    }

    #[must_use]
    pub fn leaves(&self) -> &[Leaf] {
        &self.leaves
    }

    #[must_use]
    pub fn leaf(&self, position: usize) -> Option<&Leaf> {
        self.leaves.get(position)
    }

    /// Position of the first leaf carrying `id`.
    #[must_use]
    pub fn position_of(&self, id: &str) -> Option<usize> {
        self.positions.get(id).copied()
    }

    /// Number of levels, including the leaf level. Zero for an empty tree.
    #[must_use]
    pub fn height(&self) -> usize {
        self.levels.len()
    }

    #[must_use]
    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.nodes.get(index)
    }

    /// Number of nodes at `level`, not counting synthetic duplicates.
    #[must_use]
    pub fn level_width(&self, level: usize) -> usize {
        self.levels.get(level).map_or(0, Vec::len)
    }

    /// Hash of the node at `position` on `level`.
    #[must_use]
    pub fn level_hash(&self, level: usize, position: usize) -> Option<Hash> {
        let index = *self.levels.get(level)?.get(position)?;
        Some(self.nodes[index].hash())
    }

    /// Leaf positions covered by the subtree rooted at `index`, in order.
    #[must_use]
    pub fn leaves_under(&self, index: NodeIndex) -> Vec<usize> {
        let mut positions = Vec::new();
        let mut stack = vec![index];

        while let Some(current) = stack.pop() {
            match self.nodes.get(current) {
                Some(Node::Leaf { position, .. }) => positions.push(*position),
                Some(Node::Internal { left, right, .. }) => {
                    if let Some(right) = right {
                        stack.push(*right);
                    }
                    stack.push(*left);
                }
                None => {}
            }
        }

        positions
    }
}

/// Build every level bottom-up and return the node arena with the per-level
/// node indices.
fn build_levels(leaves: &[Leaf]) -> (Vec<Node>, Vec<Vec<NodeIndex>>) {
    if leaves.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let mut nodes: Vec<Node> = leaves
        .iter()
        .enumerate()
        .map(|(position, leaf)| Node::Leaf {
            hash: leaf.hash,
            position,
        })
        .collect();

    let mut levels = vec![(0..nodes.len()).collect::<Vec<NodeIndex>>()];

    while let Some(current) = levels.last().filter(|level| level.len() > 1) {
        let mut next = Vec::with_capacity(current.len().div_ceil(2));

        for pair in current.chunks(2) {
            let left = pair[0];
            let right = pair.get(1).copied();

            let left_hash = nodes[left].hash();
            // Odd node out is hashed against a copy of itself
            let right_hash = right.map_or(left_hash, |index| nodes[index].hash());

            next.push(nodes.len());
            nodes.push(Node::Internal {
                hash: internal_hash(&left_hash, &right_hash),
                left,
                right,
            });
        }

        levels.push(next);
    }

    (nodes, levels)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(payloads: &[&str]) -> MerkleTree {
        MerkleTree::build(
            payloads
                .iter()
                .enumerate()
                .map(|(i, p)| (BlockId::from(i.to_string()), p.as_bytes().to_vec())),
        )
    }

    #[test]
    fn test_build_empty() {
        let tree = tree_of(&[]);

        assert!(tree.is_empty());
        assert_eq!(tree.root(), None);
        assert_eq!(tree.root_hash(), None);
        assert_eq!(tree.root_hash_hex(), "");
        assert_eq!(tree.height(), 0);
    }

    #[test]
    fn test_build_single_leaf_is_root() {
        let tree = tree_of(&["only"]);

        assert_eq!(tree.root_hash(), Some(leaf_hash(b"only")));
        assert_eq!(tree.height(), 1);
        assert!(tree.node(tree.root().unwrap()).unwrap().is_leaf());
    }

    #[test]
    fn test_build_level_widths() {
        let tree = tree_of(&["a", "b", "c", "d", "e"]);

        // 5 -> 3 -> 2 -> 1
        assert_eq!(tree.height(), 4);
        assert_eq!(tree.level_width(0), 5);
        assert_eq!(tree.level_width(1), 3);
        assert_eq!(tree.level_width(2), 2);
        assert_eq!(tree.level_width(3), 1);
    }

    #[test]
    fn test_odd_node_parent_has_no_right_child() {
        let tree = tree_of(&["a", "b", "c"]);

        let parent = tree.levels[1][1];
        match tree.node(parent) {
            Some(Node::Internal { right, hash, .. }) => {
                assert_eq!(*right, None);
                let h2 = leaf_hash(b"c");
                assert_eq!(*hash, internal_hash(&h2, &h2));
            }
            other => panic!("expected internal node, got {other:?}"),
        }
        assert_eq!(tree.leaves_under(parent), vec![2]);
    }

    #[test]
    fn test_leaves_under_root_is_every_leaf_in_order() {
        let tree = tree_of(&["a", "b", "c", "d", "e", "f", "g"]);
        assert_eq!(
            tree.leaves_under(tree.root().unwrap()),
            (0..7).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_position_of_resolves_first_duplicate() {
        let tree = MerkleTree::build([
            (BlockId::from("x"), b"1".to_vec()),
            (BlockId::from("y"), b"2".to_vec()),
            (BlockId::from("x"), b"3".to_vec()),
        ]);

        assert_eq!(tree.position_of("x"), Some(0));
        assert_eq!(tree.position_of("y"), Some(1));
        assert_eq!(tree.position_of("z"), None);
    }

    #[test]
    fn test_from_blocks_matches_build() {
        let blocks = vec![
            DataBlock::new("1", b"data1".to_vec()).with_table("t"),
            DataBlock::new("2", b"data2".to_vec()).with_table("t"),
        ];

        let from_blocks = MerkleTree::from_blocks(&blocks);
        let built = MerkleTree::build([
            (BlockId::from("1"), b"data1".to_vec()),
            (BlockId::from("2"), b"data2".to_vec()),
        ]);

        assert_eq!(from_blocks.root_hash(), built.root_hash());
    }
}
