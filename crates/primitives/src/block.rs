#[cfg(test)]
#[path = "tests/block.rs"]
mod tests;

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{de, Deserialize, Deserializer, Serialize};
use thiserror::Error;

/// Externally assigned identifier of a data block, and of the leaf built from it.
///
/// Parsing and deserialization reject the empty string.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct BlockId(String);

impl BlockId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0)
    }
}

impl AsRef<str> for BlockId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for BlockId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for BlockId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for BlockId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<BlockId> for String {
    fn from(id: BlockId) -> Self {
        id.0
    }
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("block id must not be empty")]
pub struct InvalidBlockId;

impl FromStr for BlockId {
    type Err = InvalidBlockId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(InvalidBlockId);
        }

        Ok(Self(s.to_owned()))
    }
}

impl<'de> Deserialize<'de> for BlockId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let id = String::deserialize(deserializer)?;

        if id.is_empty() {
            return Err(de::Error::custom(InvalidBlockId));
        }

        Ok(Self(id))
    }
}

/// A unit of replicated data, as handed over by a change-capture connector.
///
/// Only `id` and `payload` take part in the Merkle tree. The remaining fields
/// are bookkeeping for the owning service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataBlock {
    pub id: BlockId,

    /// Opaque block contents, usually ciphertext produced upstream.
    #[serde(with = "hex::serde")]
    pub payload: Vec<u8>,

    #[serde(default)]
    pub table_name: String,

    #[serde(default)]
    pub operation: String,

    /// Unix timestamp (seconds) assigned by the producer.
    #[serde(default)]
    pub timestamp: i64,

    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl DataBlock {
    #[must_use]
    pub fn new(id: impl Into<BlockId>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: id.into(),
            payload: payload.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = operation.into();
        self
    }

    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let _ignored = self.metadata.insert(key.into(), value.into());
        self
    }

    /// Fills an empty payload with the canonical JSON encoding of `metadata`.
    ///
    /// Keys are emitted in sorted order so the same metadata always produces
    /// the same leaf. Returns `true` if the payload was replaced.
    pub fn fill_payload_from_metadata(&mut self) -> serde_json::Result<bool> {
        if !self.payload.is_empty() {
            return Ok(false);
        }

        self.payload = serde_json::to_vec(&self.metadata)?;

        Ok(true)
    }
}
