use bytes::Bytes;

use crate::message::{LogEntry, LogIndex, NodeId, TermId};

use super::Log;

/// Defines test functions for a type implementing [`Log`].
#[macro_export]
macro_rules! raft_log_tests {
    ($ty:ty, $new:expr) => {
        $crate::raft_log_test! { $ty, $new, test_log_empty }
        $crate::raft_log_test! { $ty, $new, test_log_append }
        $crate::raft_log_test! { $ty, $new, test_log_append_non_contiguous_rejected }
        $crate::raft_log_test! { $ty, $new, test_log_truncate }
        $crate::raft_log_test! { $ty, $new, test_log_out_of_range_reads }
        $crate::raft_log_test! { $ty, $new, test_log_hard_state }
    };
}

/// Defines a given test function for a type implementing [`Log`].
#[macro_export]
macro_rules! raft_log_test {
    ($ty:ty, $new:expr, $test:ident) => {
        #[test]
        fn $test() {
            let mut log: $ty = $new;
            $crate::log::tests::$test(&mut log);
        }
    };
}

pub fn test_log_empty<L: Log>(log: &mut L) {
    assert_eq!(log.last_index(), LogIndex::default());
    assert_eq!(log.last_term(), TermId::default());
    assert!(log.entries(LogIndex::from(1), LogIndex::from(1)).is_err());
    assert!(log.entries(LogIndex::from(5), LogIndex::from(1)).unwrap().is_empty());
}

pub fn test_log_append<L: Log>(log: &mut L) {
    let entries = test_entries();
    for (position, entry) in entries.iter().cloned().enumerate() {
        let index = LogIndex::from(1 + position as u64);
        log.append(index, &[entry.clone()]).expect("append should succeed");
        assert_eq!(log.last_index(), index);
        assert_eq!(log.last_term(), entry.term);
        assert_eq!(log.term_at(index).unwrap(), entry.term);
        assert_eq!(log.entries(index, index).unwrap(), vec![entry]);
    }
    assert_eq!(log.entries(LogIndex::from(1), log.last_index()).unwrap(), entries.to_vec());
}

pub fn test_log_append_non_contiguous_rejected<L: Log>(log: &mut L) {
    let entries = test_entries();
    log.append(LogIndex::from(1), &entries[..2]).expect("append should succeed");
    assert!(log.append(LogIndex::from(4), &entries[3..4]).is_err());
    assert!(log.append(LogIndex::from(2), &entries[2..3]).is_err());
    assert_eq!(log.last_index(), LogIndex::from(2));
}

pub fn test_log_truncate<L: Log>(log: &mut L) {
    let entries = append_test_entries(log);
    let last_index = log.last_index();

    assert!(log.truncate(last_index + 2).is_err());
    assert!(log.truncate(LogIndex::default()).is_err());

    log.truncate(LogIndex::from(4)).expect("truncate should succeed");
    assert_eq!(log.last_index(), LogIndex::from(3));
    assert_eq!(log.last_term(), entries[2].term);
    assert_eq!(log.entries(LogIndex::from(1), log.last_index()).unwrap(), entries[..3].to_vec());

    log.truncate(LogIndex::from(1)).expect("truncate to empty should succeed");
    assert_eq!(log.last_index(), LogIndex::default());
    assert_eq!(log.last_term(), TermId::default());

    log.truncate(log.last_index() + 1).expect("truncating a no-op range should succeed");
}

pub fn test_log_out_of_range_reads<L: Log>(log: &mut L) {
    let entries = append_test_entries(log);
    let last_index = log.last_index();

    assert!(log.term_at(LogIndex::default()).is_err());
    assert!(log.term_at(last_index + 1).is_err());
    assert!(log.entries(LogIndex::default(), last_index).is_err());
    assert!(log.entries(LogIndex::from(1), last_index + 1).is_err());
    assert!(log.entries(last_index + 1, last_index).unwrap().is_empty());

    assert_eq!(log.entries(LogIndex::from(1), last_index).unwrap(), entries.to_vec());
}

pub fn test_log_hard_state<L: Log>(log: &mut L) {
    assert_eq!(log.load_hard_state().unwrap(), (TermId::default(), None));
    log.save_hard_state(TermId::from(7), Some(NodeId::from(3))).expect("save should succeed");
    assert_eq!(log.load_hard_state().unwrap(), (TermId::from(7), Some(NodeId::from(3))));
    log.save_hard_state(TermId::from(8), None).expect("save should succeed");
    assert_eq!(log.load_hard_state().unwrap(), (TermId::from(8), None));
}

//
// internal
//

fn test_entries() -> [LogEntry; 5] {
    [
        LogEntry {
            index: LogIndex::from(1),
            term: TermId::from(1),
            payload: Bytes::from_static(&[]),
        },
        LogEntry {
            index: LogIndex::from(2),
            term: TermId::from(1),
            payload: Bytes::from_static(&[2; 1]),
        },
        LogEntry {
            index: LogIndex::from(3),
            term: TermId::from(2),
            payload: Bytes::from_static(&[3; 2]),
        },
        LogEntry {
            index: LogIndex::from(4),
            term: TermId::from(9),
            payload: Bytes::from_static(&[4; 100]),
        },
        LogEntry {
            index: LogIndex::from(5),
            term: TermId::from(u64::max_value()),
            payload: Bytes::from_static(&[5; 100]),
        },
    ]
}

fn append_test_entries<L: Log>(log: &mut L) -> [LogEntry; 5] {
    let entries = test_entries();
    log.append(LogIndex::from(1), &entries).expect("append should succeed");
    entries
}
