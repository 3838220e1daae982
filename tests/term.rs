use raft::message::{AppendRequest, Message, Rpc, TermId, VoteResponse};

mod common;
use common::*;

fn run_until_candidate(engine: &mut TestRaft, now: &mut u64) -> TermId {
    while engine.current_term() == TermId::default() {
        *now += 1;
        engine.update(*now).unwrap();
    }
    engine.current_term()
}

#[test]
fn candidate_steps_down_on_higher_term_append() {
    let mut engine = raft(1, &[1, 2, 3], &mut init_random());
    let mut now = 0;
    let candidate_term = run_until_candidate(&mut engine, &mut now);
    assert!(!engine.is_leader());

    let higher_term = candidate_term.next();
    engine
        .receive(Message {
            from_node_id: node_id(2),
            dest_node_id: node_id(1),
            rpc: Some(Rpc::AppendRequest(AppendRequest {
                leader_term: higher_term,
                ..Default::default()
            })),
        })
        .unwrap();
    now += 1;
    let result = engine.update(now).unwrap();

    assert_eq!(engine.current_term(), higher_term);
    assert!(!engine.is_leader());
    assert!(result.out_messages.iter().any(|m| matches!(m.rpc, Some(Rpc::AppendResponse(_)))));
}

#[test]
fn candidate_steps_down_on_same_term_append() {
    let mut engine = raft(1, &[1, 2, 3], &mut init_random());
    let mut now = 0;
    let term = run_until_candidate(&mut engine, &mut now);

    engine
        .receive(Message {
            from_node_id: node_id(2),
            dest_node_id: node_id(1),
            rpc: Some(Rpc::AppendRequest(AppendRequest {
                leader_term: term,
                ..Default::default()
            })),
        })
        .unwrap();
    now += 1;
    let result = engine.update(now).unwrap();

    // Raft §5.2: a same-term AppendEntries means someone else already won this term's election.
    assert_eq!(engine.current_term(), term);
    assert!(result.out_messages.iter().any(|m| matches!(m.rpc, Some(Rpc::AppendResponse(_)))));
}

#[test]
fn stale_vote_response_is_dropped_without_reply() {
    let mut engine = raft(1, &[1, 2, 3], &mut init_random());
    let mut now = 0;
    let term = run_until_candidate(&mut engine, &mut now);

    engine
        .receive(Message {
            from_node_id: node_id(2),
            dest_node_id: node_id(1),
            rpc: Some(Rpc::VoteResponse(VoteResponse {
                follower_term: TermId::default(),
                granted: true,
            })),
        })
        .unwrap();
    now += 1;
    let result = engine.update(now).unwrap();

    assert_eq!(engine.current_term(), term);
    assert!(result.out_messages.is_empty());
    assert!(!engine.is_leader());
}

#[test]
fn low_term_vote_request_is_rejected_with_current_term() {
    let mut engine = raft(1, &[1, 2, 3], &mut init_random());
    let mut now = 0;
    let term = run_until_candidate(&mut engine, &mut now);

    engine
        .receive(Message {
            from_node_id: node_id(2),
            dest_node_id: node_id(1),
            rpc: Some(Rpc::VoteRequest(raft::message::VoteRequest {
                candidate_term: TermId::default(),
                ..Default::default()
            })),
        })
        .unwrap();
    now += 1;
    let result = engine.update(now).unwrap();

    assert_eq!(engine.current_term(), term);
    let reply = result.out_messages.iter().find_map(|m| match &m.rpc {
        Some(Rpc::VoteResponse(resp)) => Some(resp),
        _ => None,
    });
    let reply = reply.expect("candidate replies to a low-term vote request");
    assert!(!reply.granted);
    assert_eq!(reply.follower_term, term);
}
