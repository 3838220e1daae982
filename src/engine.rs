//! The [`Engine`] facade: a pure, time-driven Raft state machine with no IO or threading of its own.
//!
//! A host drives an [`Engine`] by calling [`initialize`](Engine::initialize) once, then repeatedly calling
//! [`update`](Engine::update) no later than the deadline it returns, feeding it inbound network messages via
//! [`receive`](Engine::receive), submitting client data via [`propose`](Engine::propose), and applying newly
//! committed entries to its own state machine by draining [`take_applied`](Engine::take_applied).

use std::collections::{BTreeSet, VecDeque};

use bytes::Bytes;
use rand_core::RngCore;

use crate::error::{ConfigError, RaftError};
use crate::log::Log;
use crate::message::{LogEntry, LogIndex, Message, NodeId, Rpc, TermId};
use crate::role::candidate::{self, CandidateState};
use crate::role::follower::{self, FollowerState};
use crate::role::leader::{self, LeaderState};
use crate::role::{apply_term_guard, Role, TermGuardOutcome};

/// Static configuration for an [`Engine`], validated once at construction time.
#[derive(Clone, Debug)]
pub struct Config {
    /// This node's own stable identity.
    pub self_id: NodeId,

    /// The stable identities of every other node in the cluster.
    pub buddy_ids: Vec<NodeId>,

    /// The minimum randomized election timeout, in milliseconds.
    pub min_election_timeout_ms: u64,

    /// The maximum randomized election timeout, in milliseconds.
    pub max_election_timeout_ms: u64,

    /// How often, in milliseconds, a leader sends an `AppendEntries` (including empty heartbeats) to each buddy.
    /// Must be strictly less than `min_election_timeout_ms` so a healthy leader's heartbeats reliably arrive before
    /// a follower's election timer could fire.
    pub heartbeat_timeout_ms: u64,

    /// The maximum number of entries a leader may have sent to a single peer and not yet heard back about. Limits
    /// how far ahead of a peer's acknowledged progress the leader is willing to race, bounding divergence.
    pub max_wait_entries: usize,

    /// The maximum number of log entries a leader places in a single `AppendEntries` request.
    pub max_packet_entries: usize,

    /// The maximum total payload size, in bytes, a leader tries to keep a single `AppendEntries` request under
    /// (a single oversized entry is still sent alone rather than never being sent).
    pub max_packet_bytes: usize,
}

impl Config {
    /// Validates this configuration, returning the first violated invariant found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.buddy_ids.contains(&self.self_id) {
            return Err(ConfigError::SelfInBuddies(self.self_id));
        }

        let mut seen = BTreeSet::new();
        for &buddy in &self.buddy_ids {
            if !seen.insert(buddy) {
                return Err(ConfigError::DuplicateBuddy(buddy));
            }
        }

        if self.min_election_timeout_ms == 0 || self.min_election_timeout_ms > self.max_election_timeout_ms {
            return Err(ConfigError::InvalidElectionTimeoutRange {
                min: self.min_election_timeout_ms,
                max: self.max_election_timeout_ms,
            });
        }

        if self.heartbeat_timeout_ms == 0 || self.heartbeat_timeout_ms >= self.min_election_timeout_ms {
            return Err(ConfigError::InvalidHeartbeatTimeout {
                heartbeat: self.heartbeat_timeout_ms,
                min_election: self.min_election_timeout_ms,
            });
        }

        if self.max_wait_entries == 0 {
            return Err(ConfigError::ZeroMaxWaitEntries);
        }

        if self.max_packet_entries == 0 {
            return Err(ConfigError::ZeroMaxPacketEntries);
        }

        if self.max_packet_bytes == 0 {
            return Err(ConfigError::ZeroMaxPacketBytes);
        }

        Ok(())
    }
}

/// The outcome of a single [`Engine::update`] call.
#[derive(Debug, Default)]
pub struct UpdateResult {
    /// Messages the host should deliver to their addressed peers.
    pub out_messages: Vec<Message>,

    /// The absolute time at which [`update`](Engine::update) should be called again, even if nothing else happens
    /// before then (a shorter deadline than this may be driven by [`receive`](Engine::receive) activity, but the
    /// host must never wait longer than this).
    pub next_tick_at: u64,
}

/// A pure, time-driven Raft consensus engine.
///
/// `L` is the backing [`Log`] implementation; `R` is a seedable source of randomness used only to jitter election
/// timeouts.
pub struct Engine<L, R> {
    self_id: NodeId,
    buddy_ids: Vec<NodeId>,
    config: Config,
    log: L,
    random: R,
    current_term: TermId,
    voted_for: Option<NodeId>,
    role: Role,
    commit_index: LogIndex,
    last_applied: LogIndex,
    inbound: VecDeque<Message>,
    pending_apply: VecDeque<LogEntry>,
    initialized: bool,
}

impl<L: Log, R: RngCore> Engine<L, R> {
    /// Constructs a new engine from a validated `config`, an initial (possibly non-empty, previously-persisted)
    /// `log`, and a seeded random source.
    ///
    /// The engine is not usable until [`initialize`](Self::initialize) is called.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails [`Config::validate`].
    pub fn new(config: Config, log: L, random: R) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            self_id: config.self_id,
            buddy_ids: config.buddy_ids.clone(),
            config,
            log,
            random,
            current_term: TermId::default(),
            voted_for: None,
            role: Role::Follower(FollowerState::new(0)),
            commit_index: LogIndex::default(),
            last_applied: LogIndex::default(),
            inbound: VecDeque::new(),
            pending_apply: VecDeque::new(),
            initialized: false,
        })
    }

    /// Loads any previously-persisted hard state (`current_term`, `voted_for`) from the log and starts this node as
    /// a Follower with a freshly-randomized election deadline. Must be called exactly once before any other method.
    ///
    /// # Errors
    ///
    /// Returns [`RaftError::AlreadyInitialized`] if called more than once, or [`RaftError::LogIo`] if the log's
    /// hard state cannot be loaded.
    pub fn initialize(&mut self, now: u64) -> Result<(), RaftError<L::Error>> {
        if self.initialized {
            return Err(RaftError::AlreadyInitialized);
        }
        let (term, voted_for) = self.log.load_hard_state().map_err(RaftError::LogIo)?;
        self.current_term = term;
        self.voted_for = voted_for;
        let deadline = self.random_election_deadline(now);
        self.role = Role::Follower(FollowerState::new(deadline));
        self.initialized = true;
        Ok(())
    }

    /// This node's own stable identity.
    pub fn node_id(&self) -> NodeId {
        self.self_id
    }

    /// The identities of every other node in the cluster.
    pub fn buddy_ids(&self) -> &[NodeId] {
        &self.buddy_ids
    }

    /// This engine's configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The greatest term this node has observed.
    pub fn current_term(&self) -> TermId {
        self.current_term
    }

    /// Whether this node currently believes itself to be the leader.
    pub fn is_leader(&self) -> bool {
        self.role.is_leader()
    }

    /// This node's best knowledge of the current leader.
    pub fn leader_id(&self) -> Option<NodeId> {
        self.role.leader_id(self.self_id)
    }

    /// The highest log index known to be committed.
    pub fn commit_index(&self) -> LogIndex {
        self.commit_index
    }

    /// The highest log index already yielded via [`take_applied`](Self::take_applied).
    pub fn last_applied(&self) -> LogIndex {
        self.last_applied
    }

    /// A shared reference to the backing log.
    pub fn log(&self) -> &L {
        &self.log
    }

    /// An exclusive reference to the backing log.
    pub fn log_mut(&mut self) -> &mut L {
        &mut self.log
    }

    /// Drains newly committed entries ready to be applied to the host's own state machine, in order, each yielded
    /// exactly once.
    pub fn take_applied(&mut self) -> impl Iterator<Item = LogEntry> + '_ {
        self.pending_apply.drain(..)
    }

    /// Enqueues a message received from the network for processing on the next [`update`](Self::update) call.
    /// Messages addressed to a different node, or from an unrecognized sender, are dropped and logged.
    ///
    /// # Errors
    ///
    /// Returns [`RaftError::NotInitialized`] if called before [`initialize`](Self::initialize).
    pub fn receive(&mut self, message: Message) -> Result<(), RaftError<L::Error>> {
        if !self.initialized {
            return Err(RaftError::NotInitialized);
        }
        if message.dest_node_id != self.self_id {
            log::debug!("dropping message addressed to {}, this node is {}", message.dest_node_id, self.self_id);
            return Ok(());
        }
        if !self.buddy_ids.contains(&message.from_node_id) {
            log::warn!("dropping message from unrecognized peer {}", message.from_node_id);
            return Ok(());
        }
        if message.rpc.is_none() {
            log::warn!("dropping malformed message from {} with no rpc payload", message.from_node_id);
            return Ok(());
        }
        self.inbound.push_back(message);
        Ok(())
    }

    /// Proposes `payload` as a new log entry. Only succeeds if this node is currently the leader.
    ///
    /// The returned `(index, term)` is only a provisional placement: the entry is committed, and safe to treat as
    /// durable, once [`commit_index`](Self::commit_index) reaches `index` while the leader is still in `term` (a
    /// term change before that point means the entry may be overwritten).
    ///
    /// # Errors
    ///
    /// Returns [`RaftError::NotLeader`] if this node is not the leader, or [`RaftError::LogIo`] if appending to the
    /// log fails.
    pub fn propose(&mut self, payload: Bytes) -> Result<(LogIndex, TermId), RaftError<L::Error>> {
        if !self.initialized {
            return Err(RaftError::NotInitialized);
        }
        if !self.role.is_leader() {
            return Err(RaftError::NotLeader {
                leader_id: self.leader_id(),
            });
        }
        self.append_to_log(payload).map_err(RaftError::LogIo)
    }

    /// Advances time to `now`, processing at most one inbound message and any role-specific timer, and returns
    /// outbound messages plus the latest time by which this method must be called again.
    ///
    /// # Errors
    ///
    /// Returns [`RaftError::NotInitialized`] if called before [`initialize`](Self::initialize), or
    /// [`RaftError::LogIo`] if the log fails during a read or write this step requires.
    pub fn update(&mut self, now: u64) -> Result<UpdateResult, RaftError<L::Error>> {
        if !self.initialized {
            return Err(RaftError::NotInitialized);
        }

        let mut out = Vec::new();
        let mut more_work = false;
        let mut role = std::mem::replace(&mut self.role, Role::Follower(FollowerState::new(now)));

        let mut skip_message_processing = false;
        match &mut role {
            Role::Follower(state) => {
                if let follower::FollowerTick::ElectionTimeout = follower::check_timer(state, now) {
                    self.voted_for = None;
                    self.log
                        .save_hard_state(self.current_term, self.voted_for)
                        .map_err(RaftError::LogIo)?;
                    role = Role::Candidate(CandidateState::new_about_to_start_election(self.self_id, now));
                    more_work = true;
                    skip_message_processing = true;
                }
            }
            Role::Candidate(state) => {
                if let candidate::CandidateTick::StartElection = candidate::check_timer(state, now) {
                    self.current_term = self.current_term.next();
                    self.voted_for = Some(self.self_id);
                    self.log
                        .save_hard_state(self.current_term, self.voted_for)
                        .map_err(RaftError::LogIo)?;
                    let mut fresh = CandidateState::new_about_to_start_election(self.self_id, now);
                    fresh.election_deadline = self.random_election_deadline(now);
                    let last_index = self.log.last_index();
                    let last_term = self.log.last_term();
                    for &buddy in &self.buddy_ids {
                        out.push(Message {
                            from_node_id: self.self_id,
                            dest_node_id: buddy,
                            rpc: Some(Rpc::VoteRequest(crate::message::VoteRequest {
                                candidate_term: self.current_term,
                                last_log_index: last_index,
                                last_log_term: last_term,
                            })),
                        });
                    }
                    let majority = self.majority();
                    role = if fresh.granted_votes.len() >= majority {
                        self.become_leader(now)
                    } else {
                        Role::Candidate(fresh)
                    };
                    more_work = true;
                    skip_message_processing = true;
                }
            }
            Role::Leader(_) => {}
        }

        if !skip_message_processing {
            if let Some(message) = self.inbound.front().cloned() {
                match apply_term_guard(&mut self.current_term, &mut self.voted_for, &message) {
                    TermGuardOutcome::Stale => {
                        self.inbound.pop_front();
                        log::debug!("dropping stale reply from {} (term {})", message.from_node_id, message.sender_term());
                    }
                    TermGuardOutcome::RejectLowTerm => {
                        self.inbound.pop_front();
                        out.push(self.reject_low_term_reply(&message));
                    }
                    TermGuardOutcome::Proceed { stepped_down } => {
                        // Raft §5.2: a same-term AppendEntries while Candidate means another node already won this
                        // term's election; step down with the vote cleared, same as a higher-term step-down.
                        let candidate_yields_to_same_term_leader = !stepped_down
                            && matches!(&role, Role::Candidate(_))
                            && matches!(message.rpc, Some(Rpc::AppendRequest(_)));
                        if candidate_yields_to_same_term_leader {
                            self.voted_for = None;
                        }
                        self.log
                            .save_hard_state(self.current_term, self.voted_for)
                            .map_err(RaftError::LogIo)?;
                        if stepped_down {
                            let deadline = self.random_election_deadline(now);
                            role = Role::Follower(FollowerState::new(deadline));
                            more_work = true;
                        } else if candidate_yields_to_same_term_leader {
                            let deadline = self.random_election_deadline(now);
                            role = Role::Follower(FollowerState::new(deadline));
                            self.inbound.pop_front();
                            self.dispatch_message(&mut role, &mut out, now, message)?;
                        } else {
                            self.inbound.pop_front();
                            self.dispatch_message(&mut role, &mut out, now, message)?;
                        }
                    }
                }
            }
        }

        if let Role::Leader(state) = &mut role {
            let last_index = self.log.last_index();
            for (peer, progress) in state.progress.iter_mut() {
                let request = if leader::has_pending_entries(progress, last_index)
                    && leader::window_has_room(progress, self.config.max_wait_entries)
                {
                    let (request, sent_through) = leader::build_data_append_request(
                        &self.log,
                        progress,
                        self.current_term,
                        self.commit_index,
                        self.config.max_packet_entries,
                        self.config.max_packet_bytes,
                    )
                    .map_err(RaftError::LogIo)?;
                    progress.reply_index = sent_through;
                    progress.next_heartbeat_at = now + self.config.heartbeat_timeout_ms;
                    Some(request)
                } else if leader::due_for_heartbeat(progress, now) {
                    progress.next_heartbeat_at = now + self.config.heartbeat_timeout_ms;
                    Some(leader::build_heartbeat(&self.log, self.current_term, self.commit_index))
                } else {
                    None
                };

                if let Some(request) = request {
                    out.push(Message {
                        from_node_id: self.self_id,
                        dest_node_id: peer,
                        rpc: Some(Rpc::AppendRequest(request)),
                    });
                }
            }

            let new_commit_index = leader::advance_commit_index(
                &self.log,
                &state.progress,
                self.log.last_index(),
                self.majority(),
                self.current_term,
                self.commit_index,
            )
            .map_err(RaftError::LogIo)?;
            if new_commit_index > self.commit_index {
                self.commit_index = new_commit_index;
            }
        }

        self.run_apply_pump().map_err(RaftError::LogIo)?;
        self.role = role;

        let next_tick_at = if !self.inbound.is_empty() || more_work {
            now
        } else {
            self.next_deadline(now)
        };

        Ok(UpdateResult {
            out_messages: out,
            next_tick_at,
        })
    }

    fn dispatch_message(
        &mut self,
        role: &mut Role,
        out: &mut Vec<Message>,
        now: u64,
        message: Message,
    ) -> Result<(), RaftError<L::Error>> {
        let from = message.from_node_id;
        let rpc = message.rpc.expect("receive() rejects messages with no rpc");

        match (&mut *role, rpc) {
            (Role::Follower(state), Rpc::VoteRequest(req)) => {
                let granted_before = self.voted_for;
                let response = follower::handle_vote_request(
                    self.current_term,
                    &mut self.voted_for,
                    self.log.last_index(),
                    self.log.last_term(),
                    from,
                    &req,
                );
                if self.voted_for != granted_before {
                    self.log
                        .save_hard_state(self.current_term, self.voted_for)
                        .map_err(RaftError::LogIo)?;
                }
                if response.granted {
                    state.election_deadline = self.random_election_deadline(now);
                }
                out.push(self.reply(from, Rpc::VoteResponse(response)));
            }
            (Role::Follower(state), Rpc::AppendRequest(req)) => {
                let response = follower::handle_append_request(&mut self.log, self.current_term, &req)
                    .map_err(RaftError::LogIo)?;
                if response.success {
                    state.leader_id = Some(from);
                    let new_commit = self.log.last_index().min(req.leader_commit);
                    if new_commit > self.commit_index {
                        self.commit_index = new_commit;
                    }
                }
                state.election_deadline = self.random_election_deadline(now);
                out.push(self.reply(from, Rpc::AppendResponse(response)));
            }
            (Role::Follower(_), Rpc::VoteResponse(_)) | (Role::Follower(_), Rpc::AppendResponse(_)) => {
                log::debug!("follower ignoring unexpected response from {}", from);
            }
            (Role::Candidate(_), Rpc::VoteRequest(req)) => {
                let granted_before = self.voted_for;
                let response = follower::handle_vote_request(
                    self.current_term,
                    &mut self.voted_for,
                    self.log.last_index(),
                    self.log.last_term(),
                    from,
                    &req,
                );
                if self.voted_for != granted_before {
                    self.log
                        .save_hard_state(self.current_term, self.voted_for)
                        .map_err(RaftError::LogIo)?;
                }
                out.push(self.reply(from, Rpc::VoteResponse(response)));
            }
            (Role::Candidate(state), Rpc::VoteResponse(resp)) => {
                let majority = self.majority();
                let won = candidate::handle_vote_response(state, from, &resp, majority);
                if won {
                    *role = self.become_leader(now);
                }
            }
            (Role::Candidate(_), Rpc::AppendRequest(_)) | (Role::Candidate(_), Rpc::AppendResponse(_)) => {
                log::debug!("candidate ignoring unexpected message from {}", from);
            }
            (Role::Leader(_), Rpc::VoteRequest(req)) => {
                let response = follower::handle_vote_request(
                    self.current_term,
                    &mut self.voted_for,
                    self.log.last_index(),
                    self.log.last_term(),
                    from,
                    &req,
                );
                out.push(self.reply(from, Rpc::VoteResponse(response)));
            }
            (Role::Leader(state), Rpc::AppendResponse(resp)) => {
                leader::handle_append_response(&mut state.progress, from, &resp, self.log.last_index(), now);
            }
            (Role::Leader(_), Rpc::VoteResponse(_)) | (Role::Leader(_), Rpc::AppendRequest(_)) => {
                log::debug!("leader ignoring unexpected message from {}", from);
            }
        }
        Ok(())
    }

    fn become_leader(&mut self, now: u64) -> Role {
        let last_index = self.log.last_index();
        let state = LeaderState::on_become_leader(&self.buddy_ids, last_index, now);
        Role::Leader(state)
    }

    fn append_to_log(&mut self, payload: Bytes) -> Result<(LogIndex, TermId), L::Error> {
        let index = self.log.last_index() + 1;
        let term = self.current_term;
        let entry = LogEntry { index, term, payload };
        self.log.append(index, std::slice::from_ref(&entry))?;
        Ok((index, term))
    }

    fn run_apply_pump(&mut self) -> Result<(), L::Error> {
        if self.last_applied < self.commit_index {
            let newly_applied = self.log.entries(self.last_applied + 1, self.commit_index)?;
            self.last_applied = self.commit_index;
            self.pending_apply.extend(newly_applied);
        }
        Ok(())
    }

    fn reply(&self, dest: NodeId, rpc: Rpc) -> Message {
        Message {
            from_node_id: self.self_id,
            dest_node_id: dest,
            rpc: Some(rpc),
        }
    }

    fn reject_low_term_reply(&self, message: &Message) -> Message {
        let rpc = match &message.rpc {
            Some(Rpc::VoteRequest(_)) => Rpc::VoteResponse(crate::message::VoteResponse {
                follower_term: self.current_term,
                granted: false,
            }),
            Some(Rpc::AppendRequest(_)) => Rpc::AppendResponse(crate::message::AppendResponse {
                follower_term: self.current_term,
                last_log_index: self.log.last_index(),
                success: false,
            }),
            _ => unreachable!("RejectLowTerm is only produced for request rpcs"),
        };
        self.reply(message.from_node_id, rpc)
    }

    fn majority(&self) -> usize {
        (self.buddy_ids.len() + 1) / 2 + 1
    }

    fn random_election_deadline(&mut self, now: u64) -> u64 {
        let min = self.config.min_election_timeout_ms;
        let max = self.config.max_election_timeout_ms;
        let span = max - min + 1;
        let jitter = self.random.next_u64() % span;
        now + min + jitter
    }

    fn next_deadline(&self, now: u64) -> u64 {
        match &self.role {
            Role::Follower(state) => state.election_deadline,
            Role::Candidate(state) => state.election_deadline,
            Role::Leader(state) => state
                .progress
                .iter()
                .map(|(_, progress)| progress.next_heartbeat_at)
                .min()
                .unwrap_or(now + self.config.heartbeat_timeout_ms),
        }
    }
}
