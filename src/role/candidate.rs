//! The Candidate role: solicits votes from every buddy in an attempt to become leader.

use std::collections::BTreeSet;

use crate::message::{NodeId, VoteResponse};

/// State held while a node is a Candidate.
pub struct CandidateState {
    /// The absolute time at which, with no election won, a new election should be started.
    pub election_deadline: u64,

    /// The set of nodes (including this one) which have granted a vote in the current term.
    pub granted_votes: BTreeSet<NodeId>,
}

impl CandidateState {
    /// Builds a Candidate substate that has already voted for itself and fires its election immediately; the real
    /// term bump and vote solicitation happens the next time [`check_timer`] is polled.
    pub fn new_about_to_start_election(self_id: NodeId, now: u64) -> Self {
        let mut granted_votes = BTreeSet::new();
        granted_votes.insert(self_id);
        Self {
            election_deadline: now,
            granted_votes,
        }
    }
}

/// The outcome of checking a Candidate's election timer.
pub(crate) enum CandidateTick {
    /// The election timeout elapsed (or this is a freshly-entered Candidate); the caller should start a new
    /// election: bump the term, vote for itself, and broadcast `RequestVote`.
    StartElection,
    /// Still waiting on outstanding vote requests.
    Waiting,
}

/// Checks whether this Candidate's election timeout has elapsed.
pub(crate) fn check_timer(state: &CandidateState, now: u64) -> CandidateTick {
    if now >= state.election_deadline {
        CandidateTick::StartElection
    } else {
        CandidateTick::Waiting
    }
}

/// Records a `RequestVoteResponse` and reports whether this candidate now holds a majority of votes.
pub(crate) fn handle_vote_response(state: &mut CandidateState, voter: NodeId, resp: &VoteResponse, majority: usize) -> bool {
    if resp.granted {
        state.granted_votes.insert(voter);
    }
    state.granted_votes.len() >= majority
}
