//! The Raft role state machine: [`Follower`](follower::FollowerState), [`Candidate`](candidate::CandidateState), and
//! [`Leader`](leader::LeaderState), plus the term guard common to all three.

pub mod candidate;
pub mod follower;
pub mod leader;

use crate::message::{Message, NodeId, TermId};

/// Which of the three Raft roles a node currently occupies, together with that role's substate.
pub(crate) enum Role {
    /// Replicates from a leader and votes in elections.
    Follower(follower::FollowerState),
    /// Is soliciting votes to become leader.
    Candidate(candidate::CandidateState),
    /// Replicates its log to every buddy and serves client proposals.
    Leader(leader::LeaderState),
}

impl Role {
    /// Whether this node currently believes itself to be the leader.
    pub fn is_leader(&self) -> bool {
        matches!(self, Role::Leader(_))
    }

    /// The node's best knowledge of the current leader: itself if it is the leader, the last-seen leader if it is a
    /// Follower, or `None` if it is a Candidate (there is no leader in a term a node is contesting).
    pub fn leader_id(&self, self_id: NodeId) -> Option<NodeId> {
        match self {
            Role::Follower(state) => state.leader_id,
            Role::Candidate(_) => None,
            Role::Leader(_) => Some(self_id),
        }
    }
}

/// The result of applying the term guard common to every role, to every inbound message, before any role-specific
/// handling occurs.
pub(crate) enum TermGuardOutcome {
    /// The message carries a term older than `current_term` and is a response; it is a stale, already-superseded
    /// reply and should be dropped without further processing.
    Stale,
    /// The message carries a term older than `current_term` and is a request; the sender is behind and should be
    /// told so with a negative reply carrying the (newer) `current_term`, without any role-specific handling.
    RejectLowTerm,
    /// The message's term is acceptable. `stepped_down` is `true` if the message's term exceeded `current_term`,
    /// which always forces (or maintains) a transition to Follower before role-specific handling proceeds.
    Proceed {
        /// Whether this message just forced a transition to (or continuation of) the Follower role.
        stepped_down: bool,
    },
}

/// Applies the term guard: adopts a newer term from `message` and clears any existing vote, or flags a stale /
/// too-low-term message for the caller to handle without any further role-specific dispatch.
pub(crate) fn apply_term_guard(
    current_term: &mut TermId,
    voted_for: &mut Option<NodeId>,
    message: &Message,
) -> TermGuardOutcome {
    use std::cmp::Ordering;

    let message_term = message.sender_term();
    match message_term.cmp(current_term) {
        Ordering::Less => {
            let is_request = message.rpc.as_ref().map(|rpc| rpc.is_request()).unwrap_or(false);
            if is_request {
                TermGuardOutcome::RejectLowTerm
            } else {
                TermGuardOutcome::Stale
            }
        }
        Ordering::Equal => TermGuardOutcome::Proceed { stepped_down: false },
        Ordering::Greater => {
            *current_term = message_term;
            *voted_for = None;
            TermGuardOutcome::Proceed { stepped_down: true }
        }
    }
}
