#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};

use rand_chacha::ChaChaRng;
use rand_core::{RngCore, SeedableRng};

use raft::engine::{Config, Engine};
use raft::log::memory::InMemoryLog;
use raft::message::{LogEntry, Message, NodeId};

pub const CONFIG: Config = Config {
    self_id: NodeId { id: 0 },
    buddy_ids: Vec::new(),
    min_election_timeout_ms: 10,
    max_election_timeout_ms: 20,
    heartbeat_timeout_ms: 3,
    max_wait_entries: 16,
    max_packet_entries: 64,
    max_packet_bytes: 64 * 1024,
};
const RANDOM_SEED: u64 = 0;
const MAX_TICKS: u64 = 100_000;

pub type TestRaft = Engine<InMemoryLog, ChaChaRng>;

pub struct TestRaftGroup {
    pub nodes: Vec<TestRaft>,
    pub tick: u64,
    pub config: TestRaftGroupConfig,
    pub inboxes: Vec<VecDeque<Message>>,
}

#[derive(Clone, Default)]
pub struct TestRaftGroupConfig {
    pub drops: BTreeSet<(Option<NodeId>, Option<NodeId>)>,
    pub down: BTreeSet<NodeId>,
}

pub struct TestLogger;

pub struct TestLoggerContext {
    node_id: Option<NodeId>,
    tick: Option<u64>,
}

pub fn init_random() -> ChaChaRng {
    ChaChaRng::seed_from_u64(RANDOM_SEED)
}

pub fn node_id(id: u64) -> NodeId {
    NodeId::from(id)
}

pub fn raft(id: u64, peers: &[u64], random: &mut ChaChaRng) -> TestRaft {
    TestLogger::init();
    let config = Config {
        self_id: node_id(id),
        buddy_ids: peers.iter().copied().filter(|&peer| peer != id).map(node_id).collect(),
        ..CONFIG
    };
    let mut engine = Engine::new(config, InMemoryLog::new(), ChaChaRng::seed_from_u64(random.next_u32() as u64))
        .expect("valid test config");
    engine.initialize(0).expect("fresh engine initializes once");
    engine
}

//
// TestRaftGroup impls
//

impl TestRaftGroup {
    pub fn new(size: u64, random: &mut ChaChaRng, config: TestRaftGroupConfig) -> Self {
        let ids: Vec<u64> = (0..size).collect();
        let nodes: Vec<TestRaft> = ids.iter().map(|&id| raft(id, &ids, random)).collect();
        let inboxes = (0..nodes.len()).map(|_| VecDeque::new()).collect();
        Self {
            nodes,
            tick: 0,
            config,
            inboxes,
        }
    }

    fn index_of(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|node| node.node_id() == id)
    }

    fn step(&mut self) {
        self.tick += 1;
        TestLogger::set_tick(Some(self.tick));

        for index in 0..self.nodes.len() {
            let node_id = self.nodes[index].node_id();
            if self.config.is_node_down(node_id) {
                continue;
            }
            TestLogger::set_node_id(Some(node_id));
            while let Some(message) = self.inboxes[index].pop_front() {
                self.nodes[index].receive(message).expect("node is initialized");
            }
            let result = self.nodes[index].update(self.tick).expect("update does not fail with InMemoryLog");
            for message in result.out_messages {
                self.route(message);
            }
        }

        TestLogger::set_tick(None);
        TestLogger::set_node_id(None);
    }

    fn route(&mut self, message: Message) {
        let from = message.from_node_id;
        let to = message.dest_node_id;
        if self.config.should_drop(from, to) {
            log::info!("{} -> {} DROPPED {}", from, to, message);
            return;
        }
        if let Some(index) = self.index_of(to) {
            log::info!("{}", message);
            self.inboxes[index].push_back(message);
        }
    }

    pub fn run_until(&mut self, mut until_fn: impl FnMut(&mut Self) -> bool) -> &mut Self {
        let mut ticks_remaining = MAX_TICKS;
        while !until_fn(self) {
            ticks_remaining = ticks_remaining.checked_sub(1).expect("condition failed after maximum simulation length");
            self.step();
        }
        self
    }

    pub fn run_until_applied(&mut self, mut until_fn: impl FnMut(&LogEntry) -> bool) -> &mut Self {
        self.run_until(|group| {
            let result = group.take_applied().any(|entry| !entry.payload.is_empty() && until_fn(&entry));
            group.take_applied().for_each(drop);
            result
        })
    }

    pub fn run_for(&mut self, ticks: u64) -> &mut Self {
        self.run_for_inspect(ticks, |_| ())
    }

    pub fn run_for_inspect(&mut self, ticks: u64, mut fun: impl FnMut(&mut Self)) -> &mut Self {
        for _ in 0..ticks {
            self.step();
            fun(self);
        }
        self
    }

    pub fn take_applied(&mut self) -> impl Iterator<Item = LogEntry> + '_ {
        self.nodes.iter_mut().flat_map(|node| node.take_applied())
    }

    pub fn has_leader(&self) -> bool {
        self.nodes.iter().any(|node| node.is_leader())
    }

    pub fn leader(&self) -> Option<&TestRaft> {
        self.nodes.iter().find(|node| node.is_leader())
    }

    pub fn leader_mut(&mut self) -> Option<&mut TestRaft> {
        self.nodes.iter_mut().find(|node| node.is_leader())
    }

    pub fn inspect(&mut self, fun: impl FnOnce(&Self)) -> &mut Self {
        fun(self);
        self
    }

    pub fn modify(&mut self, fun: impl FnOnce(&mut Self)) -> &mut Self {
        fun(self);
        self
    }
}

//
// TestRaftGroupConfig impls
//

impl TestRaftGroupConfig {
    pub fn node_down(mut self, id: u64) -> Self {
        self.down.insert(node_id(id));
        self
    }

    pub fn isolate(mut self, id: u64) -> Self {
        self.drops.insert((Some(node_id(id)), None));
        self.drops.insert((None, Some(node_id(id))));
        self
    }

    pub fn drop_between(mut self, a: u64, b: u64) -> Self {
        self.drops.insert((Some(node_id(a)), Some(node_id(b))));
        self.drops.insert((Some(node_id(b)), Some(node_id(a))));
        self
    }

    pub fn drop_to(mut self, id: u64) -> Self {
        self.drops.insert((None, Some(node_id(id))));
        self
    }

    pub fn is_node_down(&self, id: NodeId) -> bool {
        self.down.contains(&id)
    }

    pub fn should_drop(&self, from: NodeId, to: NodeId) -> bool {
        self.drops.contains(&(Some(from), Some(to)))
            || self.drops.contains(&(Some(from), None))
            || self.drops.contains(&(None, Some(to)))
            || self.down.contains(&from)
            || self.down.contains(&to)
    }
}

//
// TestLogger impls
//

thread_local! {
    static LOGGER_CONTEXT: RefCell<TestLoggerContext> = RefCell::new(TestLoggerContext::new());
}

impl TestLogger {
    pub fn init() {
        let _ignore = log::set_logger(&Self);
        log::set_max_level(log::LevelFilter::Debug);
    }
    pub fn set_node_id(id: Option<NodeId>) {
        LOGGER_CONTEXT.with(|context| {
            context.borrow_mut().node_id = id;
        });
    }
    pub fn set_tick(tick: Option<u64>) {
        LOGGER_CONTEXT.with(|context| {
            context.borrow_mut().tick = tick;
        });
    }
}

impl log::Log for TestLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        LOGGER_CONTEXT.with(|context| {
            let context = context.borrow();
            match (context.tick, context.node_id) {
                (Some(tick), Some(id)) => eprintln!("tick {:03} {} {}", tick, id, record.args()),
                (None, Some(id)) => eprintln!("tick ??? {} {}", id, record.args()),
                _ => eprintln!("{}", record.args()),
            }
        })
    }

    fn flush(&self) {}
}

impl TestLoggerContext {
    const fn new() -> Self {
        Self {
            node_id: None,
            tick: None,
        }
    }
}
