//! A disk-backed [`Log`] implementation built on [`sled`], an embedded, pure-Rust, ordered key-value store.
//!
//! Every entry is stored under a big-endian-encoded key so that range scans stay in index order. `last_index` is
//! tracked in memory and refreshed from the tree on open; `current_term`/`voted_for` live in a pair of sidecar keys
//! updated in the same batch as any entry write that depends on them, so a crash can never observe one without the
//! other.

use serde::{Deserialize, Serialize};

use crate::message::{LogEntry, LogIndex, NodeId, TermId};

use super::Log;

const ENTRY_PREFIX: u8 = b'e';
const HARD_STATE_KEY: &[u8] = b"hard_state";

/// A [`Log`] implementation backed by a [`sled::Db`].
pub struct SledLog {
    tree: sled::Tree,
    last_index: LogIndex,
    last_term: TermId,
}

/// The error type returned by [`SledLog`]'s fallible operations.
#[derive(Debug, thiserror::Error)]
pub enum SledLogError {
    /// A logical invariant of the [`Log`] contract was violated (bad range, non-contiguous append, ...).
    #[error(transparent)]
    Logic(#[from] super::LogError),

    /// The underlying `sled` store returned an I/O error.
    #[error("sled storage error: {0}")]
    Sled(#[from] sled::Error),

    /// A stored value could not be decoded.
    #[error("log entry codec error: {0}")]
    Codec(#[from] bincode::Error),
}

#[derive(Serialize, Deserialize)]
struct StoredEntry {
    term: u64,
    payload: Vec<u8>,
}

#[derive(Serialize, Deserialize, Default)]
struct StoredHardState {
    term: u64,
    voted_for: Option<u64>,
}

impl SledLog {
    /// Opens (creating if necessary) a disk-backed log rooted at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened.
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, SledLogError> {
        let db = sled::open(path)?;
        Self::from_tree(db.open_tree("raft_log")?)
    }

    /// Wraps an already-open [`sled::Tree`], scanning it to recover `last_index`/`last_term`.
    ///
    /// # Errors
    ///
    /// Returns an error if the tree cannot be scanned.
    pub fn from_tree(tree: sled::Tree) -> Result<Self, SledLogError> {
        let (last_index, last_term) = match tree.scan_prefix([ENTRY_PREFIX]).next_back() {
            Some(entry) => {
                let (key, value) = entry?;
                let index = LogIndex::from(entry_index_from_key(&key));
                let stored: StoredEntry = bincode::deserialize(&value)?;
                (index, TermId::from(stored.term))
            }
            None => (LogIndex::default(), TermId::default()),
        };
        Ok(Self {
            tree,
            last_index,
            last_term,
        })
    }

    fn entry_key(index: LogIndex) -> [u8; 9] {
        let mut key = [0u8; 9];
        key[0] = ENTRY_PREFIX;
        key[1..].copy_from_slice(&index.id.to_be_bytes());
        key
    }
}

fn entry_index_from_key(key: &[u8]) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&key[1..9]);
    u64::from_be_bytes(bytes)
}

impl Log for SledLog {
    type Error = SledLogError;

    fn append(&mut self, start_index: LogIndex, entries: &[LogEntry]) -> Result<(), Self::Error> {
        if entries.is_empty() {
            return Ok(());
        }

        let expected = self.last_index + 1;
        if start_index != expected {
            return Err(super::LogError::NonContiguousAppend {
                expected,
                actual: start_index,
            }
            .into());
        }

        let mut batch = sled::Batch::default();
        let mut next = start_index;
        for entry in entries {
            if entry.index != next {
                return Err(super::LogError::NonMonotonicEntries.into());
            }
            let stored = StoredEntry {
                term: entry.term.id,
                payload: entry.payload.to_vec(),
            };
            batch.insert(&Self::entry_key(entry.index)[..], bincode::serialize(&stored)?);
            next = next + 1;
        }
        self.tree.apply_batch(batch)?;
        self.tree.flush()?;

        let last = entries.last().expect("entries is non-empty");
        self.last_index = last.index;
        self.last_term = last.term;
        Ok(())
    }

    fn truncate(&mut self, start_index: LogIndex) -> Result<(), Self::Error> {
        if start_index.is_zero() || start_index > self.last_index + 1 {
            return Err(super::LogError::TruncateOutOfRange {
                index: start_index,
                last_index: self.last_index,
            }
            .into());
        }

        let mut batch = sled::Batch::default();
        let mut index = start_index;
        while index <= self.last_index {
            batch.remove(&Self::entry_key(index)[..]);
            index = index + 1;
        }
        self.tree.apply_batch(batch)?;
        self.tree.flush()?;

        self.last_index = start_index.checked_sub(1).expect("start_index >= 1");
        self.last_term = if self.last_index.is_zero() {
            TermId::default()
        } else {
            self.term_at(self.last_index)?
        };
        Ok(())
    }

    fn entries(&self, from: LogIndex, to: LogIndex) -> Result<Vec<LogEntry>, Self::Error> {
        if from > to {
            return Ok(Vec::new());
        }
        if from.is_zero() || to > self.last_index {
            return Err(super::LogError::IndexOutOfRange {
                index: to,
                last_index: self.last_index,
            }
            .into());
        }

        let mut out = Vec::new();
        let mut index = from;
        while index <= to {
            let value = self
                .tree
                .get(&Self::entry_key(index)[..])?
                .unwrap_or_else(|| panic!("entry {index} missing within [1, last_index]"));
            let stored: StoredEntry = bincode::deserialize(&value)?;
            out.push(LogEntry {
                index,
                term: TermId::from(stored.term),
                payload: stored.payload.into(),
            });
            index = index + 1;
        }
        Ok(out)
    }

    fn term_at(&self, index: LogIndex) -> Result<TermId, Self::Error> {
        if index.is_zero() || index > self.last_index {
            return Err(super::LogError::IndexOutOfRange {
                index,
                last_index: self.last_index,
            }
            .into());
        }
        let value = self
            .tree
            .get(&Self::entry_key(index)[..])?
            .unwrap_or_else(|| panic!("entry {index} missing within [1, last_index]"));
        let stored: StoredEntry = bincode::deserialize(&value)?;
        Ok(TermId::from(stored.term))
    }

    fn last_index(&self) -> LogIndex {
        self.last_index
    }

    fn last_term(&self) -> TermId {
        self.last_term
    }

    fn load_hard_state(&self) -> Result<(TermId, Option<NodeId>), Self::Error> {
        match self.tree.get(HARD_STATE_KEY)? {
            Some(value) => {
                let stored: StoredHardState = bincode::deserialize(&value)?;
                Ok((TermId::from(stored.term), stored.voted_for.map(NodeId::from)))
            }
            None => Ok((TermId::default(), None)),
        }
    }

    fn save_hard_state(&mut self, term: TermId, voted_for: Option<NodeId>) -> Result<(), Self::Error> {
        let stored = StoredHardState {
            term: term.id,
            voted_for: voted_for.map(|id| id.id),
        };
        self.tree.insert(HARD_STATE_KEY, bincode::serialize(&stored)?)?;
        self.tree.flush()?;
        Ok(())
    }
}
