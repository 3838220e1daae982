//! Error types returned by this crate's fallible operations.

use std::error::Error as StdError;

use crate::message::NodeId;

/// An error returned while validating an [`Engine`](crate::engine::Engine)'s [`Config`](crate::engine::Config).
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// `self_id` appeared in `buddy_ids`.
    #[error("self_id {0} must not appear in buddy_ids")]
    SelfInBuddies(NodeId),

    /// The same node ID appeared more than once in `buddy_ids`.
    #[error("duplicate buddy_id {0}")]
    DuplicateBuddy(NodeId),

    /// `min_election_timeout_ms` was zero, or greater than `max_election_timeout_ms`.
    #[error("min_election_timeout_ms ({min}) must be nonzero and <= max_election_timeout_ms ({max})")]
    InvalidElectionTimeoutRange {
        /// The configured minimum.
        min: u64,
        /// The configured maximum.
        max: u64,
    },

    /// `heartbeat_timeout_ms` was zero, or not strictly less than `min_election_timeout_ms`.
    #[error(
        "heartbeat_timeout_ms ({heartbeat}) must be nonzero and < min_election_timeout_ms ({min_election})"
    )]
    InvalidHeartbeatTimeout {
        /// The configured heartbeat timeout.
        heartbeat: u64,
        /// The configured minimum election timeout.
        min_election: u64,
    },

    /// `max_wait_entries` was zero.
    #[error("max_wait_entries must be nonzero")]
    ZeroMaxWaitEntries,

    /// `max_packet_entries` was zero.
    #[error("max_packet_entries must be nonzero")]
    ZeroMaxPacketEntries,

    /// `max_packet_bytes` was zero.
    #[error("max_packet_bytes must be nonzero")]
    ZeroMaxPacketBytes,
}

/// The taxonomy of errors returned while driving an [`Engine`](crate::engine::Engine), generic over the error type
/// of the [`Log`](crate::log::Log) implementation in use.
#[derive(Debug, thiserror::Error)]
pub enum RaftError<E>
where
    E: StdError + 'static,
{
    /// The engine's configuration failed validation.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An operation was attempted on an engine that has not yet been [`initialize`](crate::engine::Engine::initialize)d.
    #[error("engine has not been initialized")]
    NotInitialized,

    /// [`initialize`](crate::engine::Engine::initialize) was called on an engine that already holds persisted state.
    #[error("engine has already been initialized")]
    AlreadyInitialized,

    /// A client proposed an entry to a node which is not currently the leader.
    #[error("node is not the leader{}", leader_hint(*leader_id))]
    NotLeader {
        /// The best-known current leader, if any.
        leader_id: Option<NodeId>,
    },

    /// The [`Log`] implementation returned an error while performing a read or write.
    ///
    /// [`Log`]: crate::log::Log
    #[error("log store I/O failure: {0}")]
    LogIo(#[source] E),

    /// A received message could not be interpreted and was dropped.
    #[error("malformed message: {0}")]
    MalformedMessage(String),
}

fn leader_hint(leader_id: Option<NodeId>) -> String {
    match leader_id {
        Some(id) => format!(" (current leader: {id})"),
        None => String::new(),
    }
}
