//! Types related to Raft log storage.
//!
//! Raft requires backing storage for entries of its distributed log as they are replicated to and from other nodes.
//! The [`Log`] trait is implemented for that purpose, and an implementation is supplied to an
//! [`Engine`](crate::engine::Engine).

use crate::message::{LogEntry, LogIndex, NodeId, TermId};

#[cfg(any(feature = "test", test))]
#[macro_use]
pub mod tests;
pub mod memory;
#[cfg(feature = "sled-store")]
pub mod sled_store;

/// An interface for storage of the Raft log of an [`Engine`](crate::engine::Engine).
///
/// # Initial state
///
/// A log is initialized empty, with [`last_index`](Self::last_index) returning
/// [`LogIndex::default()`](crate::message::LogIndex::default) (`0`). The index of the first appended entry is `1`,
/// and all indices are contiguous.
///
/// # Reads
///
/// [`entries`](Self::entries), [`term_at`](Self::term_at), [`last_index`](Self::last_index), and
/// [`last_term`](Self::last_term) are pure: they never modify the log. Reads outside `[1, last_index()]` are errors,
/// except that an empty range (`from > to`) given to [`entries`](Self::entries) returns an empty `Vec` rather than
/// erroring, since callers commonly compute such a range when there is nothing new to send.
pub trait Log {
    /// The type of error returned by fallible operations.
    type Error: std::error::Error + 'static;

    /// Appends `entries` to the log, which must start at `start_index` and be contiguous with one another.
    ///
    /// # Errors
    ///
    /// Returns an error if `start_index` does not equal `self.last_index() + 1`, if the entries are not
    /// contiguous, or if the underlying storage fails.
    fn append(&mut self, start_index: LogIndex, entries: &[LogEntry]) -> Result<(), Self::Error>;

    /// Discards all entries at and after `start_index`, so that `self.last_index()` becomes `start_index - 1`.
    ///
    /// # Errors
    ///
    /// Returns an error if `start_index` is `0` or greater than `self.last_index() + 1`, or if the underlying
    /// storage fails.
    fn truncate(&mut self, start_index: LogIndex) -> Result<(), Self::Error>;

    /// Returns the entries in the inclusive range `[from, to]`. Returns an empty `Vec` if `from > to`.
    ///
    /// # Errors
    ///
    /// Returns an error if `from == 0` or if `to` is greater than `self.last_index()`.
    fn entries(&self, from: LogIndex, to: LogIndex) -> Result<Vec<LogEntry>, Self::Error>;

    /// Returns the term of the entry at `index`.
    ///
    /// # Errors
    ///
    /// Returns an error if `index` is `0` or greater than `self.last_index()`.
    fn term_at(&self, index: LogIndex) -> Result<TermId, Self::Error>;

    /// Returns the index of the last entry in the log, or [`LogIndex::default()`](crate::message::LogIndex::default)
    /// if empty.
    fn last_index(&self) -> LogIndex;

    /// Returns the term of the last entry in the log, or [`TermId::default()`](crate::message::TermId::default) if
    /// empty.
    fn last_term(&self) -> TermId;

    /// Loads the durably-persisted `(current_term, voted_for)` pair, or `(TermId::default(), None)` if nothing has
    /// ever been saved.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn load_hard_state(&self) -> Result<(TermId, Option<NodeId>), Self::Error>;

    /// Durably persists `current_term` and `voted_for` before any RPC reply dependent on them is sent, per the Raft
    /// safety requirement that these fields survive a crash.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying storage fails.
    fn save_hard_state(&mut self, term: TermId, voted_for: Option<NodeId>) -> Result<(), Self::Error>;
}

/// The generic "index out of the log's valid range" / "non-contiguous write" error shared by [`Log`]
/// implementations that do not need a richer error type of their own.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// An [`append`](Log::append) call's `start_index` did not equal `last_index() + 1`.
    #[error("append must start at index {expected}, got {actual}")]
    NonContiguousAppend {
        /// The index the append was expected to start at.
        expected: LogIndex,
        /// The index the append actually specified.
        actual: LogIndex,
    },

    /// The indices of the entries passed to [`append`](Log::append) were not strictly increasing by one.
    #[error("entries passed to append must have strictly increasing, contiguous indices")]
    NonMonotonicEntries,

    /// A [`truncate`](Log::truncate) call's `start_index` was `0` or beyond the end of the log.
    #[error("truncate index {index} out of range (log has {last_index} entries)")]
    TruncateOutOfRange {
        /// The index passed to `truncate`.
        index: LogIndex,
        /// The log's last index at the time of the call.
        last_index: LogIndex,
    },

    /// A read ([`entries`](Log::entries) or [`term_at`](Log::term_at)) referenced an index outside `[1, last_index]`.
    #[error("index {index} out of range [1, {last_index}]")]
    IndexOutOfRange {
        /// The index that was requested.
        index: LogIndex,
        /// The log's last index at the time of the call.
        last_index: LogIndex,
    },
}
