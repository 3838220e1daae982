//! A naive in-memory implementation of [`Log`], primarily for testing.

use std::convert::TryFrom;

use crate::message::{LogEntry, LogIndex, NodeId, TermId};

use super::{Log, LogError};

/// A naive in-memory implementation of [`Log`], backed by a `Vec`.
///
/// "Durable" hard state is only as durable as the process: it survives for the lifetime of this value, not across
/// restarts. Useful for tests and for hosts that reconstruct cluster state some other way.
#[derive(Default)]
pub struct InMemoryLog {
    entries: Vec<LogEntry>,
    current_term: TermId,
    voted_for: Option<NodeId>,
}

impl InMemoryLog {
    /// Constructs an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    fn entry_index(&self, index: LogIndex) -> Option<usize> {
        usize::try_from(index.checked_sub(1)?.id).ok()
    }
}

impl Log for InMemoryLog {
    type Error = LogError;

    fn append(&mut self, start_index: LogIndex, entries: &[LogEntry]) -> Result<(), Self::Error> {
        if entries.is_empty() {
            return Ok(());
        }

        let expected = self.last_index() + 1;
        if start_index != expected {
            return Err(LogError::NonContiguousAppend {
                expected,
                actual: start_index,
            });
        }

        let mut next = start_index;
        for entry in entries {
            if entry.index != next {
                return Err(LogError::NonMonotonicEntries);
            }
            next = next + 1;
        }

        self.entries.extend_from_slice(entries);
        Ok(())
    }

    fn truncate(&mut self, start_index: LogIndex) -> Result<(), Self::Error> {
        let last_index = self.last_index();
        if start_index.is_zero() || start_index > last_index + 1 {
            return Err(LogError::TruncateOutOfRange { index: start_index, last_index });
        }
        let keep = self.entry_index(start_index).unwrap_or(self.entries.len());
        self.entries.truncate(keep);
        Ok(())
    }

    fn entries(&self, from: LogIndex, to: LogIndex) -> Result<Vec<LogEntry>, Self::Error> {
        if from > to {
            return Ok(Vec::new());
        }
        let last_index = self.last_index();
        if from.is_zero() || to > last_index {
            return Err(LogError::IndexOutOfRange { index: to, last_index });
        }
        let start = self.entry_index(from).expect("from is within [1, last_index]");
        let end = self.entry_index(to).expect("to is within [1, last_index]");
        Ok(self.entries[start..=end].to_vec())
    }

    fn term_at(&self, index: LogIndex) -> Result<TermId, Self::Error> {
        let last_index = self.last_index();
        if index.is_zero() || index > last_index {
            return Err(LogError::IndexOutOfRange { index, last_index });
        }
        let position = self.entry_index(index).expect("index is within [1, last_index]");
        Ok(self.entries[position].term)
    }

    fn last_index(&self) -> LogIndex {
        LogIndex::from(self.entries.len() as u64)
    }

    fn last_term(&self) -> TermId {
        self.entries.last().map(|entry| entry.term).unwrap_or_default()
    }

    fn load_hard_state(&self) -> Result<(TermId, Option<NodeId>), Self::Error> {
        Ok((self.current_term, self.voted_for))
    }

    fn save_hard_state(&mut self, term: TermId, voted_for: Option<NodeId>) -> Result<(), Self::Error> {
        self.current_term = term;
        self.voted_for = voted_for;
        Ok(())
    }
}
