//! Error types for tree and proof operations.

use merklesync_primitives::block::BlockId;
use thiserror::Error;

pub type MerkleResult<T> = Result<T, MerkleError>;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum MerkleError {
    /// The operation needs a root but the tree was built from zero leaves
    #[error("cannot perform operation on an empty tree")]
    EmptyTree,

    #[error("no leaf identifiers were requested")]
    EmptyRequest,

    #[error("no leaf with identifier {0:?}")]
    NotFound(BlockId),

    /// The proof is structurally inconsistent and cannot be replayed
    #[error("malformed proof: {0}")]
    MalformedProof(#[from] ProofDefect),
}

/// What exactly is wrong with a proof that failed structural validation.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProofDefect {
    #[error("proof has no levels")]
    NoLevels,

    #[error("leaf level declares {0} nodes")]
    EmptyLeafLevel(usize),

    #[error("level {level} declares {found} nodes, expected {expected}")]
    LevelWidth {
        level: usize,
        expected: usize,
        found: usize,
    },

    #[error("top level declares {0} nodes, expected a single root")]
    RootWidth(usize),

    #[error("level {0} sits above a level that already holds the root")]
    ExtraLevel(usize),

    #[error("level {level} position {position} is outside a level of {width} nodes")]
    PositionOutOfRange {
        level: usize,
        position: usize,
        width: usize,
    },

    #[error("level {level} position {position} is declared more than once")]
    DuplicatePosition { level: usize, position: usize },

    #[error("level {level} position {position} names a leaf above the leaf level")]
    LeafAboveLeafLevel { level: usize, position: usize },

    #[error("leaf level position {0} asks to derive without naming a leaf")]
    DerivedAtLeafLevel(usize),

    #[error("level {level} position {position} is missing a child needed to derive it")]
    MissingChild { level: usize, position: usize },

    #[error("level {level} position {position} is not consumed by a derived parent")]
    UnusedPosition { level: usize, position: usize },

    #[error("top level does not derive the root")]
    RootNotDerived,

    #[error("leaf {0:?} has no derive marker at the leaf level")]
    MissingLeaf(BlockId),

    #[error("leaf level expects {0:?} but no such leaf was supplied")]
    UnsuppliedLeaf(BlockId),
}
