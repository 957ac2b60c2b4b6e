//! Block intake and proof service built on the Merkle engine.
//!
//! [`MerkleService`] owns the ordered block list, rebuilds the tree after every
//! accepted submission and publishes the result as an immutable [`Snapshot`].
//! Readers clone the current snapshot and work on it without blocking writers,
//! so a proof and the root it was generated against always come from the same
//! tree.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use merklesync_merkle::{
    diff, verify_proof, BlockId, Hash, MerkleProof, MerkleTree, ProofBundle, TreeDiff,
};
use merklesync_primitives::block::{DataBlock, InvalidBlockId};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

pub use crate::error::{ServiceError, ServiceResult};
use crate::journal::Journal;

pub mod error;
pub mod journal;
#[cfg(test)]
mod tests;

pub const DEFAULT_MAX_PROOF_LEAVES: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub struct ServiceConfig {
    /// Upper bound on the number of leaves a single proof may cover.
    #[serde(default = "default_max_proof_leaves")]
    pub max_proof_leaves: usize,
}

impl ServiceConfig {
    #[must_use]
    pub const fn new(max_proof_leaves: usize) -> Self {
        Self { max_proof_leaves }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PROOF_LEAVES)
    }
}

const fn default_max_proof_leaves() -> usize {
    DEFAULT_MAX_PROOF_LEAVES
}

/// An immutable view of the service state after one rebuild.
#[derive(Debug)]
pub struct Snapshot {
    tree: MerkleTree,
    table_counts: BTreeMap<String, usize>,
    built_at: DateTime<Utc>,
    generation: u64,
}

impl Snapshot {
    fn build(blocks: &[DataBlock], generation: u64) -> Self {
        let mut table_counts = BTreeMap::new();
        for block in blocks {
            *table_counts.entry(block.table_name.clone()).or_default() += 1;
        }

        Self {
            tree: MerkleTree::from_blocks(blocks),
            table_counts,
            built_at: Utc::now(),
            generation,
        }
    }

    #[must_use]
    pub const fn tree(&self) -> &MerkleTree {
        &self.tree
    }

    #[must_use]
    pub const fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Number of rebuilds that preceded this snapshot.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    /// Blocks recorded for `table`, or for every table when `None`.
    #[must_use]
    pub fn block_count(&self, table: Option<&str>) -> usize {
        match table {
            Some(table) => self.table_counts.get(table).copied().unwrap_or(0),
            None => self.tree.leaf_count(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SubmitReceipt {
    pub root_hash: Hash,
    pub leaf_hash: Hash,
    pub leaf_count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct BatchReceipt {
    pub root_hash: Option<Hash>,
    pub accepted: usize,
    pub leaf_count: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RootInfo {
    /// `None` while no block has been accepted.
    pub root_hash: Option<Hash>,
    pub leaf_count: usize,
    pub block_count: usize,
    pub built_at: DateTime<Utc>,
    pub generation: u64,
}

#[derive(Debug)]
struct Writer {
    blocks: Vec<DataBlock>,
    ids: HashSet<BlockId>,
    journal: Option<Journal>,
}

#[derive(Debug)]
pub struct MerkleService {
    config: ServiceConfig,
    writer: Mutex<Writer>,
    current: RwLock<Arc<Snapshot>>,
}

impl MerkleService {
    /// An empty in-memory service.
    #[must_use]
    pub fn new(config: ServiceConfig) -> Self {
        Self::from_parts(config, Vec::new(), HashSet::new(), None)
    }

    /// A service backed by `journal`, replaying every block it already holds.
    pub fn open(config: ServiceConfig, journal: Journal) -> ServiceResult<Self> {
        let blocks = journal.load()?;

        let mut ids = HashSet::with_capacity(blocks.len());
        for block in &blocks {
            if !ids.insert(block.id.clone()) {
                return Err(ServiceError::DuplicateBlock(block.id.clone()));
            }
        }

        info!(
            path = %journal.path(),
            blocks = blocks.len(),
            "Replayed block journal"
        );

        Ok(Self::from_parts(config, blocks, ids, Some(journal)))
    }

    fn from_parts(
        config: ServiceConfig,
        blocks: Vec<DataBlock>,
        ids: HashSet<BlockId>,
        journal: Option<Journal>,
    ) -> Self {
        let snapshot = Snapshot::build(&blocks, 0);

        Self {
            config,
            writer: Mutex::new(Writer {
                blocks,
                ids,
                journal,
            }),
            current: RwLock::new(Arc::new(snapshot)),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// The current snapshot. It stays valid after later submissions.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.current.read())
    }

    /// Accept one block and rebuild the tree.
    pub fn submit(&self, block: DataBlock) -> ServiceResult<SubmitReceipt> {
        let id = block.id.clone();
        let snapshot = self.accept(vec![block])?;
        let tree = snapshot.tree();

        let leaf_hash = tree
            .position_of(id.as_str())
            .and_then(|position| tree.leaf(position))
            .map(|leaf| leaf.hash())
            .unwrap_or_default();

        Ok(SubmitReceipt {
            root_hash: tree.root_hash().unwrap_or_default(),
            leaf_hash,
            leaf_count: tree.leaf_count(),
        })
    }

    /// Accept `blocks` in order with a single rebuild.
    ///
    /// Nothing is accepted if any identifier is empty, already known or
    /// repeated within the batch.
    pub fn submit_batch(&self, blocks: Vec<DataBlock>) -> ServiceResult<BatchReceipt> {
        let accepted = blocks.len();
        let snapshot = self.accept(blocks)?;

        Ok(BatchReceipt {
            root_hash: snapshot.tree().root_hash(),
            accepted,
            leaf_count: snapshot.tree().leaf_count(),
        })
    }

    /// Append `blocks` and publish the rebuilt snapshot.
    fn accept(&self, mut blocks: Vec<DataBlock>) -> ServiceResult<Arc<Snapshot>> {
        for block in &mut blocks {
            if block.id.is_empty() {
                warn!("Rejected block without identifier");
                return Err(InvalidBlockId.into());
            }

            if block
                .fill_payload_from_metadata()
                .map_err(ServiceError::Encode)?
            {
                debug!(id = %block.id, "Filled empty payload from metadata");
            }
        }

        let mut writer = self.writer.lock();

        let mut fresh = HashSet::with_capacity(blocks.len());
        for block in &blocks {
            if writer.ids.contains(&block.id) || !fresh.insert(block.id.clone()) {
                warn!(id = %block.id, "Rejected duplicate block");
                return Err(ServiceError::DuplicateBlock(block.id.clone()));
            }
        }

        if let Some(journal) = writer.journal.as_mut() {
            journal.append_all(&blocks)?;
        }

        let accepted = blocks.len();
        writer.ids.extend(fresh);
        writer.blocks.extend(blocks);

        let generation = self.current.read().generation() + 1;
        let snapshot = Arc::new(Snapshot::build(&writer.blocks, generation));

        *self.current.write() = Arc::clone(&snapshot);
        drop(writer);

        info!(
            accepted,
            leaves = snapshot.tree().leaf_count(),
            root = %snapshot.tree().root_hash_hex(),
            generation,
            "Rebuilt merkle tree"
        );

        Ok(snapshot)
    }

    /// Root of the current tree with the block count for `table`.
    #[must_use]
    pub fn root(&self, table: Option<&str>) -> RootInfo {
        let snapshot = self.snapshot();

        RootInfo {
            root_hash: snapshot.tree().root_hash(),
            leaf_count: snapshot.tree().leaf_count(),
            block_count: snapshot.block_count(table),
            built_at: snapshot.built_at(),
            generation: snapshot.generation(),
        }
    }

    /// A proof for `ids` against the current tree.
    pub fn generate_proof<I>(&self, ids: I) -> ServiceResult<MerkleProof>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let ids = self.check_request(ids)?;
        Ok(self.snapshot().tree().generate_proof(ids)?)
    }

    /// A proof for `ids` packaged with the root and payloads it was built from.
    pub fn prove_bundle<I>(&self, ids: I) -> ServiceResult<ProofBundle>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let ids = self.check_request(ids)?;
        Ok(ProofBundle::create(self.snapshot().tree(), ids)?)
    }

    fn check_request<I>(&self, ids: I) -> ServiceResult<Vec<I::Item>>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let ids: Vec<_> = ids.into_iter().collect();
        let limit = self.config.max_proof_leaves;

        if ids.len() > limit {
            warn!(requested = ids.len(), limit, "Rejected oversized proof request");
            return Err(ServiceError::ProofRequestTooLarge {
                requested: ids.len(),
                limit,
            });
        }

        Ok(ids)
    }

    /// Check `leaves` against `root_hash`. Needs no service state.
    pub fn verify_proof<P: AsRef<[u8]>>(
        root_hash: &Hash,
        leaves: &[(BlockId, P)],
        proof: &MerkleProof,
    ) -> ServiceResult<bool> {
        Ok(verify_proof(root_hash, leaves, proof)?)
    }

    /// Compare the current tree (local) against `other` (remote).
    #[must_use]
    pub fn diff(&self, other: &MerkleTree) -> TreeDiff {
        diff(self.snapshot().tree(), other)
    }
}
