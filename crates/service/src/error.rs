use merklesync_merkle::{BlockId, MerkleError};
use merklesync_primitives::block::InvalidBlockId;
use thiserror::Error;

use crate::journal::JournalError;

pub type ServiceResult<T, E = ServiceError> = Result<T, E>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ServiceError {
    #[error(transparent)]
    Merkle(#[from] MerkleError),

    #[error(transparent)]
    InvalidBlockId(#[from] InvalidBlockId),

    #[error("block already submitted: {0}")]
    DuplicateBlock(BlockId),

    #[error("proof requested for {requested} leaves, limit is {limit}")]
    ProofRequestTooLarge { requested: usize, limit: usize },

    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error("failed to encode block metadata: {0}")]
    Encode(#[source] serde_json::Error),
}
