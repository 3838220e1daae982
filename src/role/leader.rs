//! The Leader role: replicates its log to every buddy, advances the commit index, and serves client proposals.

use crate::log::Log;
use crate::message::{AppendRequest, AppendResponse, LogIndex, NodeId, TermId};
use crate::progress::{PeerProgress, PeerProgressTable};

/// State held while a node is the Leader.
pub struct LeaderState {
    /// Per-buddy replication progress.
    pub progress: PeerProgressTable,
}

impl LeaderState {
    /// Builds a fresh Leader substate: every buddy starts being probed from `last_index + 1`, with an immediate
    /// first heartbeat.
    pub fn on_become_leader(buddy_ids: &[NodeId], last_index: LogIndex, now: u64) -> Self {
        Self {
            progress: PeerProgressTable::on_become_leader(buddy_ids, last_index, now),
        }
    }
}

/// Whether there is at least one log entry queued for `peer` that has not yet been sent.
pub(crate) fn has_pending_entries(progress: &PeerProgress, last_index: LogIndex) -> bool {
    progress.next_index <= last_index
}

/// Whether the in-flight pacing window still has room for another data slice: the number of entries sent but not
/// yet acknowledged, `reply_index - match_index`, must stay under `max_wait_entries` (spec §4.2/§4.3.3). This bounds
/// how far the leader races ahead of a peer's confirmed progress.
pub(crate) fn window_has_room(progress: &PeerProgress, max_wait_entries: usize) -> bool {
    let outstanding = progress.reply_index.id.saturating_sub(progress.match_index.id);
    outstanding < max_wait_entries as u64
}

/// Whether a heartbeat (or retry) to `peer` is due at `now`.
pub(crate) fn due_for_heartbeat(progress: &PeerProgress, now: u64) -> bool {
    now >= progress.next_heartbeat_at
}

/// Builds the `AppendEntries` request carrying the next slice of log entries queued for a peer whose progress is
/// `progress`, honoring the configured per-packet entry count and byte budget (at least one entry is always
/// included, so a single oversized entry cannot stall replication forever). Returns the index of the last entry
/// actually included, which the caller records as the peer's new `reply_index`.
///
/// Only call this when [`has_pending_entries`] holds; otherwise the returned request carries no entries.
pub(crate) fn build_data_append_request<L: Log>(
    log: &L,
    progress: &PeerProgress,
    current_term: TermId,
    commit_index: LogIndex,
    max_packet_entries: usize,
    max_packet_bytes: usize,
) -> Result<(AppendRequest, LogIndex), L::Error> {
    let last_index = log.last_index();
    let prev_log_index = progress.next_index.checked_sub(1).unwrap_or_default();
    let prev_log_term = if prev_log_index.is_zero() {
        TermId::default()
    } else {
        log.term_at(prev_log_index)?
    };

    let window_end = progress.next_index + (max_packet_entries.saturating_sub(1)) as u64;
    let to = last_index.min(window_end);
    let mut entries = if progress.next_index <= to {
        log.entries(progress.next_index, to)?
    } else {
        Vec::new()
    };

    if entries.len() > 1 {
        let mut size = 0usize;
        let mut keep = entries.len();
        for (position, entry) in entries.iter().enumerate() {
            size += entry.payload.len();
            if size > max_packet_bytes && position > 0 {
                keep = position;
                break;
            }
        }
        entries.truncate(keep.max(1));
    }

    let sent_through = entries.last().map(|entry| entry.index).unwrap_or(prev_log_index);
    Ok((
        AppendRequest {
            leader_term: current_term,
            prev_log_index,
            prev_log_term,
            entries,
            leader_commit: commit_index,
        },
        sent_through,
    ))
}

/// Builds an empty `AppendEntries` heartbeat: carries no entries, just lets a peer know the leader is alive and
/// conveys the current commit index.
pub(crate) fn build_heartbeat<L: Log>(log: &L, current_term: TermId, commit_index: LogIndex) -> AppendRequest {
    AppendRequest {
        leader_term: current_term,
        prev_log_index: log.last_index(),
        prev_log_term: log.last_term(),
        entries: Vec::new(),
        leader_commit: commit_index,
    }
}

/// Applies an `AppendEntries` reply to the sender's tracked progress, and if there is more of the log left to send
/// to them, schedules an immediate follow-up rather than waiting for the next heartbeat interval.
pub(crate) fn handle_append_response(
    progress: &mut PeerProgressTable,
    peer: NodeId,
    resp: &AppendResponse,
    self_last_index: LogIndex,
    now: u64,
) {
    let applied = if resp.success {
        progress.on_accept(peer, resp.last_log_index)
    } else {
        progress.on_reject(peer, resp.last_log_index)
    };

    if applied {
        if let Some(peer_progress) = progress.get_mut(peer) {
            if peer_progress.next_index <= self_last_index {
                peer_progress.next_heartbeat_at = now;
            }
        }
    }
}

/// Recomputes the commit index from the current quorum-replicated index, honoring the Raft safety rule that a
/// leader may only advance its commit index to an entry from its *own* current term (§5.4.2): a quorum-replicated
/// entry from an earlier term is never directly committed, only carried forward once a current-term entry commits
/// alongside it.
pub(crate) fn advance_commit_index<L: Log>(
    log: &L,
    progress: &PeerProgressTable,
    self_last_index: LogIndex,
    majority: usize,
    current_term: TermId,
    commit_index: LogIndex,
) -> Result<LogIndex, L::Error> {
    let candidate = progress.quorum_match(self_last_index, majority);
    if candidate <= commit_index {
        return Ok(commit_index);
    }
    if log.term_at(candidate)? == current_term {
        Ok(candidate)
    } else {
        Ok(commit_index)
    }
}
