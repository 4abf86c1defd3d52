//! Snapshot-isolation concurrency control.
//!
//! 1. `begin` assigns a read timestamp equal to the latest commit
//!    timestamp; the transaction id doubles as its temporary timestamp
//!    and lives in the high half of the timestamp domain.
//! 2. Every insert/update/delete stamps the base tuple with the
//!    temporary timestamp and, except for fresh inserts, prepends a
//!    reverse diff to the record's version chain.
//! 3. `commit` assigns the next commit timestamp and re-stamps every
//!    written base tuple with it before releasing the commit mutex.
//! 4. Readers compare the base timestamp against their read timestamp
//!    and walk the version chain until they reach a version at or below
//!    their snapshot.
pub mod sys;
pub mod undo;
pub mod watermark;

#[cfg(test)]
mod tests;

pub use undo::{UndoLink, UndoLog};
pub use watermark::Watermark;

use crate::expr::Expr;
use crate::table::tuple::Rid;
use magpie_catalog::TableOid;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicU8, Ordering};
use std::sync::Arc;

pub type Timestamp = i64;

pub const INVALID_TS: Timestamp = -1;
/// Transaction ids occupy the high half of the timestamp domain; a base
/// tuple stamped with one encodes "written by me, not yet committed".
pub const TXN_START_ID: Timestamp = 1 << 62;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    SnapshotIsolation,
    Serializable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TransactionState {
    Running = 0,
    Tainted = 1,
    Committed = 2,
    Aborted = 3,
}

impl From<u8> for TransactionState {
    #[inline]
    fn from(value: u8) -> Self {
        match value {
            0 => TransactionState::Running,
            1 => TransactionState::Tainted,
            2 => TransactionState::Committed,
            3 => TransactionState::Aborted,
            _ => unreachable!("invalid transaction state"),
        }
    }
}

/// One transaction. Shared by reference between the session and the
/// transaction manager's map; interior state is atomic or mutexed, so
/// `&Transaction` is enough everywhere.
pub struct Transaction {
    txn_id: Timestamp,
    isolation: IsolationLevel,
    read_ts: AtomicI64,
    commit_ts: AtomicI64,
    state: AtomicU8,
    inner: Mutex<TransactionInner>,
}

struct TransactionInner {
    /// Arena of undo logs; a version chain link addresses `(txn_id,
    /// index)` into it. Append-only while the transaction runs.
    undo_logs: Vec<UndoLog>,
    write_set: HashMap<TableOid, HashSet<Rid>>,
    scan_predicates: HashMap<TableOid, Vec<Arc<Expr>>>,
}

impl Transaction {
    #[inline]
    pub fn new(txn_id: Timestamp, isolation: IsolationLevel) -> Self {
        Transaction {
            txn_id,
            isolation,
            read_ts: AtomicI64::new(0),
            commit_ts: AtomicI64::new(INVALID_TS),
            state: AtomicU8::new(TransactionState::Running as u8),
            inner: Mutex::new(TransactionInner {
                undo_logs: vec![],
                write_set: HashMap::new(),
                scan_predicates: HashMap::new(),
            }),
        }
    }

    /// The transaction id, which is also its temporary timestamp.
    #[inline]
    pub fn id(&self) -> Timestamp {
        self.txn_id
    }

    /// Id with the high bit stripped, for log output.
    #[inline]
    pub fn human_readable_id(&self) -> Timestamp {
        self.txn_id - TXN_START_ID
    }

    #[inline]
    pub fn isolation(&self) -> IsolationLevel {
        self.isolation
    }

    #[inline]
    pub fn read_ts(&self) -> Timestamp {
        self.read_ts.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_read_ts(&self, read_ts: Timestamp) {
        self.read_ts.store(read_ts, Ordering::Release);
    }

    #[inline]
    pub fn commit_ts(&self) -> Timestamp {
        self.commit_ts.load(Ordering::Acquire)
    }

    #[inline]
    pub(crate) fn set_commit_ts(&self, commit_ts: Timestamp) {
        self.commit_ts.store(commit_ts, Ordering::Release);
    }

    #[inline]
    pub fn state(&self) -> TransactionState {
        TransactionState::from(self.state.load(Ordering::Acquire))
    }

    #[inline]
    pub(crate) fn set_state(&self, state: TransactionState) {
        self.state.store(state as u8, Ordering::Release);
    }

    /// Marks the transaction tainted after a write-write conflict. Only
    /// a running transaction can become tainted.
    pub fn set_tainted(&self) {
        let state = self.state();
        assert!(
            state == TransactionState::Running,
            "transaction not in running state: {state:?}"
        );
        self.set_state(TransactionState::Tainted);
    }

    /// Appends an undo log, returning its index in the arena.
    pub fn append_undo_log(&self, log: UndoLog) -> usize {
        let mut inner = self.inner.lock();
        inner.undo_logs.push(log);
        inner.undo_logs.len() - 1
    }

    /// Overwrites an existing undo log in place (log widening).
    pub fn modify_undo_log(&self, idx: usize, log: UndoLog) {
        let mut inner = self.inner.lock();
        inner.undo_logs[idx] = log;
    }

    pub fn undo_log(&self, idx: usize) -> UndoLog {
        self.inner.lock().undo_logs[idx].clone()
    }

    pub fn undo_log_opt(&self, idx: usize) -> Option<UndoLog> {
        self.inner.lock().undo_logs.get(idx).cloned()
    }

    pub fn undo_log_count(&self) -> usize {
        self.inner.lock().undo_logs.len()
    }

    pub fn append_write_set(&self, oid: TableOid, rid: Rid) {
        let mut inner = self.inner.lock();
        inner.write_set.entry(oid).or_default().insert(rid);
    }

    pub fn write_set(&self) -> HashMap<TableOid, HashSet<Rid>> {
        self.inner.lock().write_set.clone()
    }

    /// Records a predicate touched by a scan; a serializable certifier
    /// plugged into `verify_txn` reads these back.
    pub fn append_scan_predicate(&self, oid: TableOid, predicate: Arc<Expr>) {
        let mut inner = self.inner.lock();
        inner.scan_predicates.entry(oid).or_default().push(predicate);
    }

    pub fn scan_predicates(&self) -> HashMap<TableOid, Vec<Arc<Expr>>> {
        self.inner.lock().scan_predicates.clone()
    }
}
