//! Append-only block journal.
//!
//! One JSON-encoded [`DataBlock`] per line, in submission order. Replaying the
//! journal reproduces the exact leaf order, and therefore the exact root.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};

use camino::{Utf8Path, Utf8PathBuf};
use merklesync_primitives::block::DataBlock;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum JournalError {
    #[error("journal I/O failed for {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("journal {path} line {line} is not a valid block: {source}")]
    Decode {
        path: Utf8PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode block for the journal: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("journal {path} holds an unrecoverable partial write, reopen it to continue")]
    Poisoned { path: Utf8PathBuf },
}

/// Writable handle on a block journal.
///
/// A failed append is truncated back to the last complete record so the
/// file never holds blocks the caller was told were rejected.
#[derive(Debug)]
pub struct Journal {
    path: Utf8PathBuf,
    file: File,
    /// Length of the file up to the end of the last complete record.
    committed: u64,
    /// Set when a failed append could not be rolled back.
    poisoned: bool,
}

impl Journal {
    /// Open `path` for appending, creating it and its parent directories.
    ///
    /// A trailing record without its newline is left over from an
    /// interrupted append and is cut off.
    pub fn open(path: impl Into<Utf8PathBuf>) -> Result<Self, JournalError> {
        let path = path.into();

        if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
            create_dir_all(parent).map_err(|source| JournalError::Io {
                path: parent.to_owned(),
                source,
            })?;
        }

        let io_error = |source| JournalError::Io {
            path: path.clone(),
            source,
        };

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .map_err(io_error)?;

        let length = file.metadata().map_err(io_error)?.len();
        let committed = complete_length(&mut file, length).map_err(io_error)?;

        if committed < length {
            warn!(
                %path,
                discarded = length - committed,
                "Discarding incomplete record at the end of the journal"
            );
            file.set_len(committed)
                .and_then(|()| file.sync_data())
                .map_err(io_error)?;
        }

        Ok(Self {
            path,
            file,
            committed,
            poisoned: false,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Read every block recorded in this journal.
    pub fn load(&self) -> Result<Vec<DataBlock>, JournalError> {
        read_blocks(&self.path)
    }

    /// Append `blocks` and flush them to disk before returning.
    ///
    /// On failure nothing from `blocks` remains in the file.
    pub fn append_all(&mut self, blocks: &[DataBlock]) -> Result<(), JournalError> {
        if self.poisoned {
            return Err(JournalError::Poisoned {
                path: self.path.clone(),
            });
        }

        let mut buffer = Vec::new();
        for block in blocks {
            serde_json::to_writer(&mut buffer, block)?;
            buffer.push(b'\n');
        }

        if let Err(source) = self
            .file
            .write_all(&buffer)
            .and_then(|()| self.file.sync_data())
        {
            self.rollback();
            return Err(JournalError::Io {
                path: self.path.clone(),
                source,
            });
        }

        self.committed += buffer.len() as u64;

        debug!(path = %self.path, appended = blocks.len(), "Appended blocks to journal");

        Ok(())
    }

    /// Truncate anything written past the last complete record.
    fn rollback(&mut self) {
        let result = self
            .file
            .set_len(self.committed)
            .and_then(|()| self.file.sync_data());

        if let Err(err) = result {
            error!(path = %self.path, %err, "Failed to roll back journal after a failed append");
            self.poisoned = true;
        }
    }
}

/// Length of the prefix of `file` that ends in a newline.
fn complete_length(file: &mut File, length: u64) -> io::Result<u64> {
    if length == 0 {
        return Ok(0);
    }

    let mut last = [0_u8; 1];
    let _ = file.seek(SeekFrom::Start(length - 1))?;
    file.read_exact(&mut last)?;

    if last[0] == b'\n' {
        return Ok(length);
    }

    let mut contents = Vec::new();
    let _ = file.seek(SeekFrom::Start(0))?;
    let _ = file.read_to_end(&mut contents)?;

    Ok(contents
        .iter()
        .rposition(|byte| *byte == b'\n')
        .map_or(0, |index| index as u64 + 1))
}

/// Read every block from the journal at `path` without opening it for writing.
///
/// Blank lines are skipped.
pub fn read_blocks(path: &Utf8Path) -> Result<Vec<DataBlock>, JournalError> {
    let io_error = |source| JournalError::Io {
        path: path.to_owned(),
        source,
    };

    let file = File::open(path).map_err(io_error)?;
    let mut blocks = Vec::new();

    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(io_error)?;

        if line.trim().is_empty() {
            continue;
        }

        let block = serde_json::from_str(&line).map_err(|source| JournalError::Decode {
            path: path.to_owned(),
            line: index + 1,
            source,
        })?;

        blocks.push(block);
    }

    Ok(blocks)
}
