//! Structural comparison of two trees.
//!
//! Both trees are walked top-down in lockstep. Subtrees with equal hashes are
//! pruned. Leaves are not aligned across positions: a leaf that moved reports
//! as differing on both sides.

use merklesync_primitives::block::BlockId;
use merklesync_primitives::hash::Hash;
use serde::Serialize;
use tracing::debug;

use crate::tree::{MerkleTree, Node, NodeIndex};

/// Which of the two compared trees a differing leaf belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffSide {
    Local,
    Remote,
}

/// A leaf that has no identical counterpart at the same place in the other tree.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct LeafDiff {
    pub side: DiffSide,
    pub position: usize,
    pub id: BlockId,
    pub hash: Hash,
}

/// The set of differing leaves, ordered by side then position.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TreeDiff {
    entries: Vec<LeafDiff>,
}

impl TreeDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn entries(&self) -> &[LeafDiff] {
        &self.entries
    }

    pub fn side(&self, side: DiffSide) -> impl Iterator<Item = &LeafDiff> + '_ {
        self.entries.iter().filter(move |entry| entry.side == side)
    }
}

impl IntoIterator for TreeDiff {
    type Item = LeafDiff;
    type IntoIter = std::vec::IntoIter<LeafDiff>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// Report the leaves at which `local` and `remote` disagree.
#[must_use]
pub fn diff(local: &MerkleTree, remote: &MerkleTree) -> TreeDiff {
    let mut collector = Collector {
        local,
        remote,
        entries: Vec::new(),
    };

    match (local.root(), remote.root()) {
        (None, None) => {}
        (Some(root), None) => collector.emit(DiffSide::Local, root),
        (None, Some(root)) => collector.emit(DiffSide::Remote, root),
        (Some(local_root), Some(remote_root)) => collector.walk(local_root, remote_root),
    }

    let mut entries = collector.entries;
    entries.sort();
    entries.dedup();

    debug!(
        local_leaves = local.leaf_count(),
        remote_leaves = remote.leaf_count(),
        differing = entries.len(),
        "Compared merkle trees"
    );

    TreeDiff { entries }
}

struct Collector<'a> {
    local: &'a MerkleTree,
    remote: &'a MerkleTree,
    entries: Vec<LeafDiff>,
}

impl Collector<'_> {
    fn walk(&mut self, local_root: NodeIndex, remote_root: NodeIndex) {
        let mut pending = vec![(local_root, remote_root)];

        while let Some((local_index, remote_index)) = pending.pop() {
            let (Some(local_node), Some(remote_node)) = (
                self.local.node(local_index),
                self.remote.node(remote_index),
            ) else {
                continue;
            };

            if local_node.hash() == remote_node.hash() {
                continue;
            }

            match (*local_node, *remote_node) {
                (
                    Node::Internal {
                        left: local_left,
                        right: local_right,
                        ..
                    },
                    Node::Internal {
                        left: remote_left,
                        right: remote_right,
                        ..
                    },
                ) => {
                    pending.push((local_left, remote_left));

                    // A missing right child is the duplicate of the left one,
                    // which the left pair already covers
                    match (local_right, remote_right) {
                        (Some(l), Some(r)) => pending.push((l, r)),
                        (Some(l), None) => self.emit(DiffSide::Local, l),
                        (None, Some(r)) => self.emit(DiffSide::Remote, r),
                        (None, None) => {}
                    }
                }
                _ => {
                    self.emit(DiffSide::Local, local_index);
                    self.emit(DiffSide::Remote, remote_index);
                }
            }
        }
    }

    /// Record every leaf under `index` in the tree on `side`.
    fn emit(&mut self, side: DiffSide, index: NodeIndex) {
        let tree = match side {
            DiffSide::Local => self.local,
            DiffSide::Remote => self.remote,
        };

        for position in tree.leaves_under(index) {
            if let Some(leaf) = tree.leaf(position) {
                self.entries.push(LeafDiff {
                    side,
                    position,
                    id: leaf.id().clone(),
                    hash: leaf.hash(),
                });
            }
        }
    }
}
