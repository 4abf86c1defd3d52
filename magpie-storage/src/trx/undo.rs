use crate::table::tuple::Tuple;
use crate::trx::{Timestamp, INVALID_TS};
use bit_vec::BitVec;

/// Link to one undo log: the owning transaction and the index into its
/// append-only log arena. Links form the per-record version chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UndoLink {
    pub prev_txn: Timestamp,
    pub prev_log_idx: usize,
}

impl UndoLink {
    pub const INVALID: UndoLink = UndoLink {
        prev_txn: INVALID_TS,
        prev_log_idx: 0,
    };

    #[inline]
    pub fn new(prev_txn: Timestamp, prev_log_idx: usize) -> Self {
        UndoLink {
            prev_txn,
            prev_log_idx,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.prev_txn != INVALID_TS
    }
}

/// A reverse diff: the state of a tuple *before* the owning transaction
/// wrote it.
///
/// `modified_fields` marks which columns the diff carries; `tuple` is
/// the partial tuple holding exactly those columns, in base-schema
/// order. `ts` is the timestamp of the version this log restores, and
/// `prev_version` continues the chain toward older versions.
///
/// Possible shapes:
/// 1. Update: the modified columns' old values.
/// 2. Delete: all columns, the full pre-image, `is_deleted = false`.
/// 3. There is no log for a fresh insert; the chain simply ends.
#[derive(Debug, Clone)]
pub struct UndoLog {
    pub is_deleted: bool,
    pub modified_fields: BitVec,
    pub tuple: Tuple,
    pub ts: Timestamp,
    pub prev_version: UndoLink,
}

impl UndoLog {
    /// Column indexes carried by this diff, ascending.
    pub fn modified_columns(&self) -> Vec<usize> {
        self.modified_fields
            .iter()
            .enumerate()
            .filter_map(|(i, set)| set.then_some(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undo_link_sentinel() {
        assert!(!UndoLink::INVALID.is_valid());
        assert!(UndoLink::new(7, 0).is_valid());
    }

    #[test]
    fn test_modified_columns() {
        let mut fields = BitVec::from_elem(4, false);
        fields.set(1, true);
        fields.set(3, true);
        let log = UndoLog {
            is_deleted: false,
            modified_fields: fields,
            tuple: Tuple::from_bytes(vec![]),
            ts: 0,
            prev_version: UndoLink::INVALID,
        };
        assert_eq!(log.modified_columns(), vec![1, 3]);
    }
}
