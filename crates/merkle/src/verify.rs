//! Proof replay against caller-held leaves.

use std::collections::{BTreeMap, HashMap, VecDeque};

use merklesync_primitives::block::BlockId;
use merklesync_primitives::hash::Hash;
use tracing::debug;

use crate::error::{MerkleError, MerkleResult, ProofDefect};
use crate::hashing::{internal_hash, leaf_hash};
use crate::proof::{MerkleProof, ProofLevel, ProofSlot};

/// Verify that `leaves` belong to the tree whose root is `root_hash`.
///
/// Returns `Ok(false)` when the proof replays cleanly but yields a different
/// root. Structural problems with the proof, or a mismatch between the leaves
/// the proof names and the leaves supplied, are reported as
/// [`MerkleError::MalformedProof`].
pub fn verify_proof<P: AsRef<[u8]>>(
    root_hash: &Hash,
    leaves: &[(BlockId, P)],
    proof: &MerkleProof,
) -> MerkleResult<bool> {
    if leaves.is_empty() {
        return Err(MerkleError::EmptyRequest);
    }

    check_shape(proof)?;

    let mut values = leaf_level_values(&proof.levels[0], leaves)?;

    for (index, pair) in proof.levels.windows(2).enumerate() {
        let (below, above) = (&pair[0], &pair[1]);
        values = next_level_values(index + 1, below, &values, above)?;
    }

    let top = proof.levels.len() - 1;
    let computed = match (proof.levels[top].entries.as_slice(), values.get(&0)) {
        ([entry], Some(hash)) if !matches!(entry.slot, ProofSlot::Supplied(_)) => *hash,
        _ => return Err(ProofDefect::RootNotDerived.into()),
    };

    let valid = computed == *root_hash;

    if !valid {
        debug!(expected = %root_hash, %computed, "Merkle proof root mismatch");
    }

    Ok(valid)
}

/// Check level widths, positions and slot kinds before any hashing happens.
fn check_shape(proof: &MerkleProof) -> Result<(), ProofDefect> {
    let Some(leaf_level) = proof.levels.first() else {
        return Err(ProofDefect::NoLevels);
    };

    if leaf_level.width == 0 {
        return Err(ProofDefect::EmptyLeafLevel(leaf_level.width));
    }

    for (level, current) in proof.levels.iter().enumerate() {
        if level > 0 {
            let below = proof.levels[level - 1].width;

            if below == 1 {
                return Err(ProofDefect::ExtraLevel(level));
            }

            let expected = below.div_ceil(2);
            if current.width != expected {
                return Err(ProofDefect::LevelWidth {
                    level,
                    expected,
                    found: current.width,
                });
            }
        }

        let mut seen = None;
        for entry in &current.entries {
            let position = entry.position;

            if position >= current.width {
                return Err(ProofDefect::PositionOutOfRange {
                    level,
                    position,
                    width: current.width,
                });
            }

            // Entries are ascending; anything else repeats or reorders a position
            if seen.is_some_and(|previous| previous >= position) {
                return Err(ProofDefect::DuplicatePosition { level, position });
            }
            seen = Some(position);

            match entry.slot {
                ProofSlot::Derived if level == 0 => {
                    return Err(ProofDefect::DerivedAtLeafLevel(position));
                }
                ProofSlot::Leaf(_) if level > 0 => {
                    return Err(ProofDefect::LeafAboveLeafLevel { level, position });
                }
                _ => {}
            }
        }
    }

    let top = proof.levels.len() - 1;
    if proof.levels[top].width != 1 {
        return Err(ProofDefect::RootWidth(proof.levels[top].width));
    }

    Ok(())
}

/// Place hashed payloads at the positions the proof declares for them and
/// fill the rest from supplied hashes.
fn leaf_level_values<P: AsRef<[u8]>>(
    level: &ProofLevel,
    leaves: &[(BlockId, P)],
) -> Result<BTreeMap<usize, Hash>, ProofDefect> {
    let mut pending: HashMap<&str, VecDeque<Hash>> = HashMap::new();
    for (id, payload) in leaves {
        pending
            .entry(id.as_str())
            .or_default()
            .push_back(leaf_hash(payload.as_ref()));
    }

    let mut values = BTreeMap::new();

    for entry in &level.entries {
        let hash = match &entry.slot {
            ProofSlot::Leaf(id) => pending
                .get_mut(id.as_str())
                .and_then(VecDeque::pop_front)
                .ok_or_else(|| ProofDefect::UnsuppliedLeaf(id.clone()))?,
            ProofSlot::Supplied(hash) => *hash,
            ProofSlot::Derived => return Err(ProofDefect::DerivedAtLeafLevel(entry.position)),
        };

        let _ignored = values.insert(entry.position, hash);
    }

    if let Some((id, _)) = leaves
        .iter()
        .find(|(id, _)| pending.get(id.as_str()).is_some_and(|left| !left.is_empty()))
    {
        return Err(ProofDefect::MissingLeaf(id.clone()));
    }

    Ok(values)
}

/// Compute the values of level `level` from the values of the level below.
fn next_level_values(
    level: usize,
    below: &ProofLevel,
    below_values: &BTreeMap<usize, Hash>,
    above: &ProofLevel,
) -> Result<BTreeMap<usize, Hash>, ProofDefect> {
    let derived: BTreeMap<usize, &ProofSlot> = above
        .entries
        .iter()
        .map(|entry| (entry.position, &entry.slot))
        .collect();

    // Every value below must feed a derived parent, or it proves nothing
    for &position in below_values.keys() {
        if !matches!(derived.get(&(position / 2)), Some(ProofSlot::Derived)) {
            return Err(ProofDefect::UnusedPosition {
                level: level - 1,
                position,
            });
        }
    }

    let mut values = BTreeMap::new();

    for (&position, slot) in &derived {
        let hash = match slot {
            ProofSlot::Supplied(hash) => *hash,
            ProofSlot::Derived => {
                let missing = ProofDefect::MissingChild { level, position };

                let left_position = position * 2;
                let right_position = left_position + 1;

                let left = below_values.get(&left_position).ok_or(missing.clone())?;
                let right = if right_position < below.width {
                    below_values.get(&right_position).ok_or(missing)?
                } else {
                    left
                };

                internal_hash(left, right)
            }
            ProofSlot::Leaf(_) => return Err(ProofDefect::LeafAboveLeafLevel { level, position }),
        };

        let _ignored = values.insert(position, hash);
    }

    Ok(values)
}
