use bytes::Bytes;

mod common;
use common::*;

#[test]
fn single_node_commits_a_proposal() {
    let mut group = TestRaftGroup::new(1, &mut init_random(), TestRaftGroupConfig::default());
    group.run_until(|group| group.has_leader());
    group.modify(|group| {
        assert!(group.leader_mut().unwrap().propose(Bytes::from_static(b"one")).is_ok());
    });
    group.run_until_applied(|entry| {
        assert_eq!(entry.payload.as_ref(), b"one");
        true
    });
}

#[test]
fn two_node_cluster_commits_a_proposal() {
    let mut group = TestRaftGroup::new(2, &mut init_random(), TestRaftGroupConfig::default());
    group.run_until(|group| group.has_leader());
    group.modify(|group| {
        assert!(group.leader_mut().unwrap().propose(Bytes::from_static(b"one")).is_ok());
    });
    group.run_until_applied(|entry| {
        assert_eq!(entry.payload.as_ref(), b"one");
        true
    });
}

#[test]
fn three_node_cluster_commits_a_proposal() {
    let mut group = TestRaftGroup::new(3, &mut init_random(), TestRaftGroupConfig::default());
    group.run_until(|group| group.has_leader());
    group.modify(|group| {
        assert!(group.leader_mut().unwrap().propose(Bytes::from_static(b"one")).is_ok());
    });
    group.run_until_applied(|entry| {
        assert_eq!(entry.payload.as_ref(), b"one");
        true
    });
}

#[test]
fn non_leader_cannot_propose() {
    let mut group = TestRaftGroup::new(3, &mut init_random(), TestRaftGroupConfig::default());
    group.run_until(|group| group.has_leader());

    let follower = group.nodes.iter_mut().find(|node| !node.is_leader()).unwrap();
    assert!(follower.propose(Bytes::from_static(b"one")).is_err());
}

#[test]
fn uncommitted_proposal_is_discarded_after_leader_change() {
    let mut group = TestRaftGroup::new(3, &mut init_random(), TestRaftGroupConfig::default());
    group.run_until(|group| group.has_leader());

    let old_leader = group.nodes.iter().position(|node| node.is_leader()).unwrap();
    group.nodes[old_leader].propose(Bytes::from_static(b"one")).unwrap();

    // Partition the old leader away before "one" can replicate to anyone else.
    group.config = TestRaftGroupConfig::default().isolate(old_leader as u64);
    group.run_until(|group| group.nodes.iter().enumerate().any(|(i, node)| i != old_leader && node.is_leader()));

    let new_leader = group
        .nodes
        .iter()
        .enumerate()
        .find(|(i, node)| *i != old_leader && node.is_leader())
        .map(|(i, _)| i)
        .unwrap();
    group.nodes[new_leader].propose(Bytes::from_static(b"two")).unwrap();

    // Reconnect everyone; the old leader's unreplicated entry must never surface as applied.
    group.config = TestRaftGroupConfig::default();
    group.run_until_applied(|entry| {
        assert_ne!(entry.payload.as_ref(), b"one");
        entry.payload.as_ref() == b"two"
    });
}
