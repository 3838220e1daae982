//! Raft consensus algorithm implementation.
//!
//! Raft is a consensus algorithm which replicates a strongly-consistent distributed log of entries with arbitrary data
//! amongst a group of peers. It is also fault-tolerant, allowing replication to continue while a majority of peers can
//! still communicate with each other. This crate provides an implementation of the Raft consensus algorithm with some
//! optional features not implemented, such as pre-voting, membership changes, and snapshots.
//!
//! The algorithm is implemented as a pure, time-driven state machine with no IO or threading of its own: an
//! [`Engine`](engine::Engine) is driven by a host which calls [`update`](engine::Engine::update) whenever time passes
//! or a message needs processing, and feeds it network traffic via [`receive`](engine::Engine::receive).
//!
//! * To submit new data to the distributed log: [`propose`](engine::Engine::propose) is called on the leader.
//! * When a message is received from a peer: [`receive`](engine::Engine::receive) enqueues it for the next
//!   [`update`](engine::Engine::update).
//! * Whenever time passes, or after every [`receive`](engine::Engine::receive) call: [`update`](engine::Engine::update)
//!   is called, returning outbound messages and the deadline by which it must be called again.
//!
//! Once a log entry is committed, guaranteed to be returned at the same index on every functioning peer in the
//! group, it is delivered to the host by draining [`take_applied`](engine::Engine::take_applied).
//!
//! The backing storage for the distributed log must be provided as an implementation of the [`Log`](log::Log) trait.
//! An in-memory implementation is provided by [`InMemoryLog`](log::memory::InMemoryLog), and a disk-backed one by
//! [`SledLog`](log::sled_store::SledLog) behind the `sled-store` feature.
//!
//! # Example
//!
//! ```no_run
//! use raft::engine::{Config, Engine};
//! use raft::log::memory::InMemoryLog;
//! use raft::message::NodeId;
//! use rand_chacha::ChaChaRng;
//! use rand_core::SeedableRng;
//! use std::collections::VecDeque;
//!
//! // Construct 5 Raft peers.
//! let ids: Vec<NodeId> = (1..=5).map(NodeId::from).collect();
//! let mut peers: Vec<Engine<InMemoryLog, ChaChaRng>> = ids
//!     .iter()
//!     .map(|&id| {
//!         let buddy_ids = ids.iter().copied().filter(|&other| other != id).collect();
//!         let config = Config {
//!             self_id: id,
//!             buddy_ids,
//!             min_election_timeout_ms: 150,
//!             max_election_timeout_ms: 300,
//!             heartbeat_timeout_ms: 50,
//!             max_wait_entries: 16,
//!             max_packet_entries: 64,
//!             max_packet_bytes: 64 * 1024,
//!         };
//!         let mut engine = Engine::new(config, InMemoryLog::new(), ChaChaRng::seed_from_u64(id.id)).unwrap();
//!         engine.initialize(0).unwrap();
//!         engine
//!     })
//!     .collect();
//!
//! // Simulate reliably delivering messages instantaneously between peers.
//! let mut inboxes: Vec<VecDeque<_>> = vec![VecDeque::new(); peers.len()];
//! let mut now = 0u64;
//!
//! loop {
//!     now += 1;
//!     for (index, peer) in peers.iter_mut().enumerate() {
//!         while let Some(message) = inboxes[index].pop_front() {
//!             peer.receive(message).unwrap();
//!         }
//!         let result = peer.update(now).unwrap();
//!         for message in result.out_messages {
//!             let dest = message.dest_node_id;
//!             if let Some(pos) = ids.iter().position(|&id| id == dest) {
//!                 inboxes[pos].push_back(message);
//!             }
//!         }
//!         if peer.is_leader() {
//!             peer.propose("hello world!".into()).unwrap();
//!         }
//!         for _entry in peer.take_applied() {
//!             // apply to the host's own state machine
//!         }
//!     }
//! }
//! ```

#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod log;
pub mod message;
pub mod progress;
mod role;
