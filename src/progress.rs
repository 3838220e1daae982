//! Per-peer replication progress tracked by a [`Leader`](crate::role::leader::LeaderState).

use std::collections::BTreeMap;

use crate::message::{LogIndex, NodeId};

/// The leader's view of how far a single buddy's log has been replicated.
#[derive(Clone, Copy, Debug)]
pub struct PeerProgress {
    /// The index of the next entry to send to this peer.
    pub next_index: LogIndex,

    /// The highest index known to be present in this peer's log, used to compute commit advancement.
    pub match_index: LogIndex,

    /// A pacing high-water mark for the in-flight window: set to the tail index of a data slice the moment it is
    /// sent, then overwritten by the peer's actual acknowledged (or rejected) index once a reply arrives. The gap
    /// between this and `match_index` is how far the leader has raced ahead of confirmed progress.
    pub reply_index: LogIndex,

    /// The earliest time at which another append (including an empty heartbeat) should be sent to this peer.
    pub next_heartbeat_at: u64,
}

/// The full set of [`PeerProgress`] entries tracked by a leader, one per buddy.
#[derive(Clone, Debug, Default)]
pub struct PeerProgressTable {
    peers: BTreeMap<NodeId, PeerProgress>,
}

impl PeerProgressTable {
    /// Builds a fresh table on becoming leader: every buddy starts probing from `last_index + 1`, with no known
    /// match index and an immediate first heartbeat.
    pub fn on_become_leader(buddy_ids: &[NodeId], last_index: LogIndex, now: u64) -> Self {
        let peers = buddy_ids
            .iter()
            .map(|&peer| {
                (
                    peer,
                    PeerProgress {
                        next_index: last_index + 1,
                        match_index: LogIndex::default(),
                        reply_index: LogIndex::default(),
                        next_heartbeat_at: now,
                    },
                )
            })
            .collect();
        Self { peers }
    }

    /// Returns the tracked progress for `peer`, if any.
    pub fn get(&self, peer: NodeId) -> Option<&PeerProgress> {
        self.peers.get(&peer)
    }

    /// Returns mutable tracked progress for `peer`, if any.
    pub fn get_mut(&mut self, peer: NodeId) -> Option<&mut PeerProgress> {
        self.peers.get_mut(&peer)
    }

    /// Iterates over every tracked peer and its progress.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &PeerProgress)> {
        self.peers.iter().map(|(&peer, progress)| (peer, progress))
    }

    /// Iterates mutably over every tracked peer and its progress.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (NodeId, &mut PeerProgress)> {
        self.peers.iter_mut().map(|(&peer, progress)| (peer, progress))
    }

    /// Records a successful `AppendEntries` reply from `peer`, advancing `match_index` and `next_index` and
    /// clearing the peer's in-flight reply window (the pending slice has now been acknowledged).
    pub fn on_accept(&mut self, peer: NodeId, acked_last_index: LogIndex) -> bool {
        match self.peers.get_mut(&peer) {
            Some(progress) => {
                progress.match_index = progress.match_index.max(acked_last_index);
                progress.next_index = progress.next_index.max(acked_last_index + 1);
                progress.reply_index = acked_last_index;
                true
            }
            None => false,
        }
    }

    /// Records a rejected `AppendEntries` reply from `peer`, backing off `next_index` by at least one entry (and
    /// further still if the peer reports a shorter log), and reopening the reply window so the backed-off slice is
    /// eligible to be sent again right away.
    pub fn on_reject(&mut self, peer: NodeId, peer_last_index: LogIndex) -> bool {
        match self.peers.get_mut(&peer) {
            Some(progress) => {
                let retry_from = (peer_last_index + 1).max(LogIndex::from(1));
                progress.next_index = (progress.next_index - 1).min(retry_from).max(LogIndex::from(1));
                progress.reply_index = progress.reply_index.min(progress.next_index - 1);
                true
            }
            None => false,
        }
    }

    /// Computes the highest index replicated on at least `majority` of the `N = buddies.len() + 1` nodes (the
    /// leader plus its buddies), given the leader's own `self_last_index`.
    pub fn quorum_match(&self, self_last_index: LogIndex, majority: usize) -> LogIndex {
        let mut match_indexes: Vec<LogIndex> = self.peers.values().map(|progress| progress.match_index).collect();
        match_indexes.push(self_last_index);
        match_indexes.sort_unstable();

        match match_indexes.len().checked_sub(majority) {
            Some(position) => match_indexes[position],
            None => LogIndex::default(),
        }
    }
}
