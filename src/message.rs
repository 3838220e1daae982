//! Raft message types for sending between nodes.
//!
//! This module provides data types for messages to be sent between Raft nodes. The top-level message type is
//! [`Message`]. Protobuf-based serialization of all types in this module is provided through the `prost` crate if
//! the corresponding feature is enabled.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

use bytes::Bytes;

/// A message sent between Raft nodes, addressed to a concrete peer.
///
/// Unlike an internal event, every [`Message`] carries both endpoints explicitly so a host can route it without
/// consulting any other state: [`from_node_id`](Self::from_node_id) identifies the sender, and
/// [`dest_node_id`](Self::dest_node_id) the intended recipient. A node silently drops any message addressed to a
/// different `dest_node_id`, or whose `from_node_id` is not among its configured peers.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Message))]
#[cfg_attr(not(feature = "prost"), derive(Debug, Default))]
pub struct Message {
    /// The node which sent this message.
    #[cfg_attr(feature = "prost", prost(message, required, tag = "1"))]
    pub from_node_id: NodeId,

    /// The node this message is addressed to.
    #[cfg_attr(feature = "prost", prost(message, required, tag = "2"))]
    pub dest_node_id: NodeId,

    /// The Remote Procedure Call contained by this message.
    ///
    /// This field is only optional in order to support protobuf serialization.
    #[cfg_attr(feature = "prost", prost(oneof = "Rpc", tags = "3, 4, 5, 6"))]
    pub rpc: Option<Rpc>,
}

/// A Remote Procedure Call message to a Raft node.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Oneof))]
#[cfg_attr(not(feature = "prost"), derive(Debug))]
pub enum Rpc {
    /// A request to obtain leadership amongst Raft nodes.
    #[cfg_attr(feature = "prost", prost(message, tag = "3"))]
    VoteRequest(VoteRequest),

    /// A response to a [`VoteRequest`] granting or denying leadership.
    #[cfg_attr(feature = "prost", prost(message, tag = "4"))]
    VoteResponse(VoteResponse),

    /// A request to append entries to a Raft node's log.
    #[cfg_attr(feature = "prost", prost(message, tag = "5"))]
    AppendRequest(AppendRequest),

    /// A response to an [`AppendRequest`] allowing or denying an append to the Raft node's log.
    #[cfg_attr(feature = "prost", prost(message, tag = "6"))]
    AppendResponse(AppendResponse),
}

/// A request to obtain leadership amongst Raft nodes.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Message))]
#[cfg_attr(not(feature = "prost"), derive(Debug, Default))]
pub struct VoteRequest {
    /// The candidate's term.
    #[cfg_attr(feature = "prost", prost(message, required, tag = "1"))]
    pub candidate_term: TermId,

    /// The index of the last log entry stored by the candidate.
    #[cfg_attr(feature = "prost", prost(message, required, tag = "2"))]
    pub last_log_index: LogIndex,

    /// The term of the last log entry stored by the candidate.
    #[cfg_attr(feature = "prost", prost(message, required, tag = "3"))]
    pub last_log_term: TermId,
}

/// The response to a [`VoteRequest`] granting or denying leadership.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Message))]
#[cfg_attr(not(feature = "prost"), derive(Debug, Default))]
pub struct VoteResponse {
    /// The greatest term seen by the responder.
    #[cfg_attr(feature = "prost", prost(message, required, tag = "1"))]
    pub follower_term: TermId,

    /// Whether the [`VoteRequest`] was granted or not.
    #[cfg_attr(feature = "prost", prost(bool, required, tag = "2"))]
    pub granted: bool,
}

/// A request to append entries to a Raft node's log.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Message))]
#[cfg_attr(not(feature = "prost"), derive(Debug, Default))]
pub struct AppendRequest {
    /// The leader's term.
    #[cfg_attr(feature = "prost", prost(message, required, tag = "1"))]
    pub leader_term: TermId,

    /// The Raft log index immediately before the index of the first entry in [`entries`](Self::entries).
    #[cfg_attr(feature = "prost", prost(message, required, tag = "2"))]
    pub prev_log_index: LogIndex,

    /// The Raft leadership term of the log entry immediately before the first entry in [`entries`](Self::entries).
    #[cfg_attr(feature = "prost", prost(message, required, tag = "3"))]
    pub prev_log_term: TermId,

    /// A list of consecutive Raft log entries to append. Empty for a heartbeat.
    #[cfg_attr(feature = "prost", prost(message, repeated, tag = "4"))]
    pub entries: Vec<LogEntry>,

    /// The Raft log index of the last log entry known by the leader to be committed.
    #[cfg_attr(feature = "prost", prost(message, required, tag = "5"))]
    pub leader_commit: LogIndex,
}

/// The response to an [`AppendRequest`] allowing or denying an append to the Raft node's log.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Message))]
#[cfg_attr(not(feature = "prost"), derive(Debug, Default))]
pub struct AppendResponse {
    /// The greatest term seen by the responder.
    #[cfg_attr(feature = "prost", prost(message, required, tag = "1"))]
    pub follower_term: TermId,

    /// The index of the last log entry in the responder's log.
    #[cfg_attr(feature = "prost", prost(message, required, tag = "2"))]
    pub last_log_index: LogIndex,

    /// Whether the [`AppendRequest`] was accepted or not.
    #[cfg_attr(feature = "prost", prost(bool, required, tag = "3"))]
    pub success: bool,
}

/// An entry in a Raft log.
///
/// `index` is redundant with an entry's position in the log, but travels on the wire so a receiver can sanity
/// check it against the offset it computes locally from `prev_log_index`.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Message))]
#[cfg_attr(not(feature = "prost"), derive(Debug, Default))]
pub struct LogEntry {
    /// The 1-based index of this entry in the log.
    #[cfg_attr(feature = "prost", prost(message, required, tag = "1"))]
    pub index: LogIndex,

    /// The term of leadership of the node which appended this log entry.
    #[cfg_attr(feature = "prost", prost(message, required, tag = "2"))]
    pub term: TermId,

    /// Arbitrary data associated with the log entry.
    #[cfg_attr(feature = "prost", prost(bytes = "vec", required, tag = "3"))]
    pub payload: Bytes,
}

/// The unique, monotonically-increasing ID for a term of Raft group leadership.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Message))]
#[cfg_attr(not(feature = "prost"), derive(Debug, Default))]
pub struct TermId {
    /// The non-negative integer assigned to this term. `0` means "no term has ever started".
    #[cfg_attr(feature = "prost", prost(uint64, required, tag = "1"))]
    pub id: u64,
}

/// A 1-based index into a Raft log. `0` denotes "before the first entry" / an empty log.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Message))]
#[cfg_attr(not(feature = "prost"), derive(Debug, Default))]
pub struct LogIndex {
    /// The integer representing this log index.
    #[cfg_attr(feature = "prost", prost(uint64, required, tag = "1"))]
    pub id: u64,
}

/// The stable, positive integer identity of a node in a Raft cluster.
#[derive(Clone, PartialEq)]
#[cfg_attr(feature = "prost", derive(prost::Message))]
#[cfg_attr(not(feature = "prost"), derive(Debug, Default))]
pub struct NodeId {
    /// The integer identifying this node, unique within its cluster.
    #[cfg_attr(feature = "prost", prost(uint64, required, tag = "1"))]
    pub id: u64,
}

//
// Message impls
//

impl Message {
    /// Returns the sender's term, regardless of which RPC kind this message carries.
    pub fn sender_term(&self) -> TermId {
        match &self.rpc {
            Some(Rpc::VoteRequest(req)) => req.candidate_term,
            Some(Rpc::VoteResponse(resp)) => resp.follower_term,
            Some(Rpc::AppendRequest(req)) => req.leader_term,
            Some(Rpc::AppendResponse(resp)) => resp.follower_term,
            None => TermId::default(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            from_node_id,
            dest_node_id,
            rpc,
        } = self;
        let mut debug = fmt.debug_tuple("");
        debug.field(&format_args!("{} -> {}", from_node_id, dest_node_id));
        if let Some(rpc) = rpc {
            debug.field(&format_args!("{}", rpc));
        } else {
            debug.field(&"None");
        }
        debug.finish()
    }
}

//
// Rpc impls
//

impl Rpc {
    /// Whether this RPC is a request (expects a reply) as opposed to a response.
    pub fn is_request(&self) -> bool {
        matches!(self, Rpc::VoteRequest(_) | Rpc::AppendRequest(_))
    }
}

impl fmt::Display for Rpc {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            Rpc::VoteRequest(msg) => fmt::Display::fmt(msg, fmt),
            Rpc::VoteResponse(msg) => fmt::Display::fmt(msg, fmt),
            Rpc::AppendRequest(msg) => fmt::Display::fmt(msg, fmt),
            Rpc::AppendResponse(msg) => fmt::Display::fmt(msg, fmt),
        }
    }
}

//
// VoteRequest impls
//

impl fmt::Display for VoteRequest {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            candidate_term,
            last_log_index,
            last_log_term,
        } = self;
        fmt.debug_struct("VoteRequest")
            .field("candidate_term", &format_args!("{}", candidate_term))
            .field("last_log_index", &format_args!("{}", last_log_index))
            .field("last_log_term", &format_args!("{}", last_log_term))
            .finish()
    }
}

//
// VoteResponse impls
//

impl fmt::Display for VoteResponse {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            follower_term,
            granted,
        } = self;
        fmt.debug_struct("VoteResponse")
            .field("follower_term", &format_args!("{}", follower_term))
            .field("granted", granted)
            .finish()
    }
}

//
// AppendRequest impls
//

impl fmt::Display for AppendRequest {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            leader_term,
            prev_log_index,
            prev_log_term,
            entries,
            leader_commit,
        } = self;
        fmt.debug_struct("AppendRequest")
            .field("leader_term", &format_args!("{}", leader_term))
            .field("prev_log_index", &format_args!("{}", prev_log_index))
            .field("prev_log_term", &format_args!("{}", prev_log_term))
            .field("entries", &entries.len())
            .field("leader_commit", &format_args!("{}", leader_commit))
            .finish()
    }
}

//
// AppendResponse impls
//

impl fmt::Display for AppendResponse {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self {
            follower_term,
            last_log_index,
            success,
        } = self;
        fmt.debug_struct("AppendResponse")
            .field("follower_term", &format_args!("{}", follower_term))
            .field("last_log_index", &format_args!("{}", last_log_index))
            .field("success", success)
            .finish()
    }
}

//
// TermId impls
//

impl fmt::Display for TermId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { id } = self;
        fmt.debug_tuple("TermId").field(id).finish()
    }
}

impl Copy for TermId {}

impl Eq for TermId {}

impl PartialOrd for TermId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TermId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl From<u64> for TermId {
    fn from(id: u64) -> Self {
        Self { id }
    }
}

impl TermId {
    /// Returns the next term after this one.
    pub fn next(self) -> Self {
        Self {
            id: self.id.checked_add(1).unwrap_or_else(|| panic!("term overflow")),
        }
    }
}

//
// LogIndex impls
//

impl LogIndex {
    /// Subtraction with a non-negative integer, checking for overflow. Returns `self - dec`, or `None` if an
    /// overflow occurred (i.e. the result would be negative).
    pub fn checked_sub(self, dec: u64) -> Option<Self> {
        self.id.checked_sub(dec).map(|id| Self { id })
    }

    /// Whether this index denotes the empty-log sentinel (`0`).
    pub fn is_zero(self) -> bool {
        self.id == 0
    }
}

impl fmt::Display for LogIndex {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self { id } = self;
        fmt.debug_tuple("LogIdx").field(id).finish()
    }
}

impl Copy for LogIndex {}

impl Eq for LogIndex {}

impl PartialOrd for LogIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for LogIndex {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl From<u64> for LogIndex {
    fn from(id: u64) -> Self {
        Self { id }
    }
}

impl Add<u64> for LogIndex {
    type Output = Self;
    fn add(self, inc: u64) -> Self {
        Self {
            id: self.id.checked_add(inc).unwrap_or_else(|| panic!("overflow")),
        }
    }
}

impl Sub<u64> for LogIndex {
    type Output = Self;
    fn sub(self, dec: u64) -> Self {
        Self {
            id: self.id.saturating_sub(dec),
        }
    }
}

//
// NodeId impls
//

impl fmt::Display for NodeId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.id, fmt)
    }
}

impl Copy for NodeId {}

impl Eq for NodeId {}

impl PartialOrd for NodeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NodeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::hash::Hash for NodeId {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl From<u64> for NodeId {
    fn from(id: u64) -> Self {
        Self { id }
    }
}
