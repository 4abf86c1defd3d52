use crate::buffer::page::PageId;
use crate::catalog::Catalog;
use crate::error::Result;
use crate::table::mvcc::apply_undo_log;
use crate::table::tuple::{Rid, TupleMeta};
use crate::trx::undo::{UndoLink, UndoLog};
use crate::trx::watermark::Watermark;
use crate::trx::{
    IsolationLevel, Timestamp, Transaction, TransactionState, TXN_START_ID,
};
use crossbeam_utils::CachePadded;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

/// Per-page portion of the version map: slot number to chain head,
/// behind a page-local latch so chains on different pages never
/// contend.
struct PageVersionInfo {
    prev_version: Mutex<HashMap<u16, UndoLink>>,
}

/// TransactionManager owns transaction lifecycle, the commit clock, the
/// per-record version chains and the watermark used for garbage
/// collection.
pub struct TransactionManager {
    next_txn_id: CachePadded<AtomicI64>,
    last_commit_ts: CachePadded<AtomicI64>,
    txn_map: RwLock<HashMap<Timestamp, Arc<Transaction>>>,
    running_txns: Mutex<Watermark>,
    /// Serializes commit, hence commit-timestamp order.
    commit_mutex: Mutex<()>,
    version_info: RwLock<HashMap<PageId, Arc<PageVersionInfo>>>,
    catalog: Arc<Catalog>,
}

impl TransactionManager {
    pub fn new(catalog: Arc<Catalog>) -> Arc<Self> {
        Arc::new(TransactionManager {
            next_txn_id: CachePadded::new(AtomicI64::new(TXN_START_ID)),
            last_commit_ts: CachePadded::new(AtomicI64::new(0)),
            txn_map: RwLock::new(HashMap::new()),
            running_txns: Mutex::new(Watermark::new(0)),
            commit_mutex: Mutex::new(()),
            version_info: RwLock::new(HashMap::new()),
            catalog,
        })
    }

    #[inline]
    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    /// Starts a transaction whose snapshot is the latest committed
    /// state.
    pub fn begin(&self, isolation: IsolationLevel) -> Arc<Transaction> {
        let mut txn_map = self.txn_map.write();
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let txn = Arc::new(Transaction::new(txn_id, isolation));
        let mut running = self.running_txns.lock();
        txn.set_read_ts(running.commit_ts());
        running.add_txn(txn.read_ts());
        drop(running);
        txn_map.insert(txn_id, Arc::clone(&txn));
        log::debug!(
            "begin txn {} read_ts={} {:?}",
            txn.human_readable_id(),
            txn.read_ts(),
            isolation
        );
        txn
    }

    pub fn txn(&self, txn_id: Timestamp) -> Option<Arc<Transaction>> {
        self.txn_map.read().get(&txn_id).cloned()
    }

    /// Serializable certification hook. This engine accepts
    /// unconditionally; a real certifier would replay the recorded scan
    /// predicates against versions committed after `read_ts`.
    pub fn verify_txn(&self, _txn: &Transaction) -> bool {
        true
    }

    /// Commits `txn`: assigns the next commit timestamp and re-stamps
    /// every base tuple in the write set with it before the commit
    /// mutex is released. Returns false when serializable verification
    /// rejects (the transaction is then aborted).
    pub fn commit(&self, txn: &Arc<Transaction>) -> Result<bool> {
        let commit_lock = self.commit_mutex.lock();

        let state = txn.state();
        assert!(
            state == TransactionState::Running,
            "commit of transaction not in running state: {state:?}"
        );

        if txn.isolation() == IsolationLevel::Serializable && !self.verify_txn(txn) {
            drop(commit_lock);
            self.abort(txn);
            return Ok(false);
        }

        let commit_ts = self.last_commit_ts.fetch_add(1, Ordering::SeqCst) + 1;

        for (oid, rids) in txn.write_set() {
            let table = self
                .catalog
                .table_info(oid)
                .expect("write set references a known table");
            for rid in rids {
                let mut meta = table.heap.get_tuple_meta(rid)?;
                meta.ts = commit_ts;
                table.heap.update_tuple_meta(meta, rid)?;
            }
        }

        txn.set_commit_ts(commit_ts);
        txn.set_state(TransactionState::Committed);
        let mut running = self.running_txns.lock();
        running.update_commit_ts(commit_ts);
        running.remove_txn(txn.read_ts());
        log::debug!("commit txn {} at ts {commit_ts}", txn.human_readable_id());
        Ok(true)
    }

    /// Aborts `txn`, physically restoring every base tuple it wrote
    /// from its own undo logs and popping its links off the version
    /// chains. Tuples it freshly inserted are left as globally visible
    /// delete markers.
    pub fn abort(&self, txn: &Arc<Transaction>) {
        let state = txn.state();
        assert!(
            state == TransactionState::Running || state == TransactionState::Tainted,
            "abort of transaction not in running / tainted state: {state:?}"
        );

        for (oid, rids) in txn.write_set() {
            let table = self
                .catalog
                .table_info(oid)
                .expect("write set references a known table");
            for rid in rids {
                let own_log = self
                    .get_undo_link(rid)
                    .filter(|link| link.is_valid() && link.prev_txn == txn.id())
                    .map(|link| (link, txn.undo_log(link.prev_log_idx)));
                match own_log {
                    Some((_, log)) => {
                        let (meta, tuple) = table
                            .heap
                            .get_tuple(rid)
                            .expect("written tuple exists");
                        debug_assert_eq!(meta.ts, txn.id());
                        let mut values = tuple.values(&table.schema);
                        apply_undo_log(&table.schema, &mut values, &log);
                        let restored =
                            crate::table::tuple::Tuple::from_values(&table.schema, &values);
                        let restored_meta = TupleMeta::new(log.ts, log.is_deleted);
                        table
                            .heap
                            .update_tuple_in_place(restored_meta, &restored, rid, None)
                            .expect("restore fits original capacity");
                        let prev = log.prev_version;
                        self.update_version_link(
                            rid,
                            prev.is_valid().then_some(prev),
                            None,
                        );
                    }
                    None => {
                        // Fresh insert: no older version exists. Mark
                        // the record as a globally visible tombstone.
                        let meta = TupleMeta::new(0, true);
                        table
                            .heap
                            .update_tuple_meta(meta, rid)
                            .expect("written tuple exists");
                    }
                }
            }
        }

        let _txn_map = self.txn_map.write();
        txn.set_state(TransactionState::Aborted);
        self.running_txns.lock().remove_txn(txn.read_ts());
        log::debug!("abort txn {}", txn.human_readable_id());
    }

    /// Installs (or erases, when `link` is `None`) the chain head of
    /// `rid`. The parent map lock is dropped before the page-local
    /// latch is taken; `check` validates the current head under that
    /// latch and a rejection installs nothing.
    pub fn update_version_link(
        &self,
        rid: Rid,
        link: Option<UndoLink>,
        check: Option<&dyn Fn(Option<UndoLink>) -> bool>,
    ) -> bool {
        let pg_info = {
            let mut version_info = self.version_info.write();
            Arc::clone(version_info.entry(rid.page_id).or_insert_with(|| {
                Arc::new(PageVersionInfo {
                    prev_version: Mutex::new(HashMap::new()),
                })
            }))
        };
        let mut prev_version = pg_info.prev_version.lock();
        if let Some(check) = check {
            if !check(prev_version.get(&rid.slot).copied()) {
                return false;
            }
        }
        match link {
            Some(link) => {
                prev_version.insert(rid.slot, link);
            }
            None => {
                prev_version.remove(&rid.slot);
            }
        }
        true
    }

    /// Alias with the undo-link naming of the read path.
    #[inline]
    pub fn update_undo_link(
        &self,
        rid: Rid,
        link: Option<UndoLink>,
        check: Option<&dyn Fn(Option<UndoLink>) -> bool>,
    ) -> bool {
        self.update_version_link(rid, link, check)
    }

    /// Returns the chain head of `rid`, if any.
    pub fn get_version_link(&self, rid: Rid) -> Option<UndoLink> {
        let pg_info = {
            let version_info = self.version_info.read();
            Arc::clone(version_info.get(&rid.page_id)?)
        };
        let prev_version = pg_info.prev_version.lock();
        prev_version.get(&rid.slot).copied()
    }

    #[inline]
    pub fn get_undo_link(&self, rid: Rid) -> Option<UndoLink> {
        self.get_version_link(rid)
    }

    /// Resolves a link to its undo log. Absent transactions yield
    /// `None`, which chain walkers classify as a dangling link.
    pub fn get_undo_log_opt(&self, link: UndoLink) -> Option<UndoLog> {
        let txn = {
            let txn_map = self.txn_map.read();
            Arc::clone(txn_map.get(&link.prev_txn)?)
        };
        txn.undo_log_opt(link.prev_log_idx)
    }

    /// Resolves a link that is known to be alive. A missing log here is
    /// a chain-maintenance or GC bug.
    pub fn get_undo_log(&self, link: UndoLink) -> UndoLog {
        self.get_undo_log_opt(link).expect("undo log not exist")
    }

    #[inline]
    pub fn watermark(&self) -> Timestamp {
        self.running_txns.lock().watermark()
    }

    #[inline]
    pub fn last_commit_ts(&self) -> Timestamp {
        self.last_commit_ts.load(Ordering::SeqCst)
    }

    /// Stop-the-world garbage collection.
    ///
    /// Walks every version chain, counts per transaction the undo logs
    /// still reachable by a reader at the watermark, then drops every
    /// finished transaction whose count is zero — removing a
    /// transaction frees its whole undo arena.
    pub fn garbage_collect(&self) -> usize {
        let watermark = self.watermark();

        // A log is still needed when a reader at the watermark may
        // traverse it: every log above the watermark, plus the chain
        // head when the base tuple itself is above the watermark.
        let mut needed: HashMap<Timestamp, usize> = HashMap::new();
        for table in self.catalog.tables() {
            let mut iter = match table.heap.eager_iter() {
                Ok(iter) => iter,
                Err(_) => continue,
            };
            while let Ok(Some((meta, _tuple, rid))) = iter.next() {
                let mut link = match self.get_undo_link(rid) {
                    Some(link) if link.is_valid() => link,
                    _ => continue,
                };
                let mut is_head = true;
                loop {
                    // A link into a transaction already dropped from
                    // the map is dangling; the rest of the chain was
                    // reclaimed earlier.
                    let Some(log) = self.get_undo_log_opt(link) else {
                        break;
                    };
                    let reclaimable =
                        log.ts < watermark && (!is_head || meta.ts <= watermark);
                    if !reclaimable {
                        *needed.entry(link.prev_txn).or_insert(0) += 1;
                    }
                    is_head = false;
                    if !log.prev_version.is_valid() {
                        break;
                    }
                    link = log.prev_version;
                }
            }
        }

        let mut txn_map = self.txn_map.write();
        let before = txn_map.len();
        txn_map.retain(|txn_id, txn| {
            let finished = matches!(
                txn.state(),
                TransactionState::Committed | TransactionState::Aborted
            );
            !finished || needed.get(txn_id).copied().unwrap_or(0) > 0
        });
        let removed = before - txn_map.len();
        log::debug!("gc at watermark {watermark}: removed {removed} txns");
        removed
    }
}
