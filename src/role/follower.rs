//! The Follower role: replicates from a leader and votes in elections, waiting out an election timeout.

use crate::log::Log;
use crate::message::{AppendRequest, AppendResponse, LogEntry, LogIndex, NodeId, TermId, VoteRequest, VoteResponse};

/// State held while a node is a Follower.
pub struct FollowerState {
    /// The node this follower currently believes to be leader, if it has heard from one this term.
    pub leader_id: Option<NodeId>,

    /// The absolute time at which, if no valid `AppendEntries` or granted vote has reset it, this node starts an
    /// election.
    pub election_deadline: u64,
}

impl FollowerState {
    /// Builds a fresh Follower substate with no known leader and the given election deadline.
    pub fn new(election_deadline: u64) -> Self {
        Self {
            leader_id: None,
            election_deadline,
        }
    }
}

/// The outcome of checking a Follower's election timer.
pub(crate) enum FollowerTick {
    /// The election timeout elapsed; the caller should transition to Candidate.
    ElectionTimeout,
    /// Still waiting.
    Waiting,
}

/// Checks whether this Follower's election timeout has elapsed.
pub(crate) fn check_timer(state: &FollowerState, now: u64) -> FollowerTick {
    if now >= state.election_deadline {
        FollowerTick::ElectionTimeout
    } else {
        FollowerTick::Waiting
    }
}

/// Handles a `RequestVote` RPC as a Follower (or as any role that has just stepped down to Follower).
///
/// Grants the vote if this node has not already voted for a different candidate this term, and the candidate's log
/// is at least as up to date as this node's own (Raft §5.4.1: compare last-entry term first, then length).
pub(crate) fn handle_vote_request(
    current_term: TermId,
    voted_for: &mut Option<NodeId>,
    self_last_index: LogIndex,
    self_last_term: TermId,
    candidate: NodeId,
    req: &VoteRequest,
) -> VoteResponse {
    let log_is_up_to_date = req.last_log_term > self_last_term
        || (req.last_log_term == self_last_term && req.last_log_index >= self_last_index);
    let can_vote_for_candidate = voted_for.map_or(true, |already| already == candidate);
    let granted = log_is_up_to_date && can_vote_for_candidate;
    if granted {
        *voted_for = Some(candidate);
    }
    VoteResponse {
        follower_term: current_term,
        granted,
    }
}

/// Handles an `AppendEntries` RPC as a Follower.
///
/// Rejects if the log does not contain an entry at `prev_log_index` with term `prev_log_term`. Otherwise,
/// truncates any conflicting suffix and appends the new entries, skipping the prefix already present and matching.
pub(crate) fn handle_append_request<L: Log>(
    log: &mut L,
    current_term: TermId,
    req: &AppendRequest,
) -> Result<AppendResponse, L::Error> {
    if req.leader_term == TermId::default() {
        return Ok(AppendResponse {
            follower_term: current_term,
            last_log_index: log.last_index(),
            success: false,
        });
    }

    let prev_matches = if req.prev_log_index.is_zero() {
        true
    } else {
        match log.term_at(req.prev_log_index) {
            Ok(term) => term == req.prev_log_term,
            Err(_) => false,
        }
    };

    if !prev_matches {
        return Ok(AppendResponse {
            follower_term: current_term,
            last_log_index: log.last_index(),
            success: false,
        });
    }

    if !req.entries.is_empty() {
        let conflict_at = req.entries.iter().find_map(|entry| {
            if entry.index > log.last_index() {
                return None;
            }
            match log.term_at(entry.index) {
                Ok(existing_term) if existing_term != entry.term => Some(entry.index),
                _ => None,
            }
        });
        if let Some(conflict_index) = conflict_at {
            log.truncate(conflict_index)?;
        }

        let first_new_index = log.last_index() + 1;
        let to_append: Vec<LogEntry> = req
            .entries
            .iter()
            .filter(|entry| entry.index >= first_new_index)
            .cloned()
            .collect();
        if !to_append.is_empty() {
            log.append(first_new_index, &to_append)?;
        }
    }

    Ok(AppendResponse {
        follower_term: current_term,
        last_log_index: log.last_index(),
        success: true,
    })
}
