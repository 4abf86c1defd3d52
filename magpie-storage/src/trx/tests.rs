use crate::error::Error;
use crate::exec::tests::{
    delete_plan, insert_ints, int_table, scan_ints, test_engine, update_plan,
};
use crate::expr::Expr;
use crate::trx::{IsolationLevel, TransactionState, TXN_START_ID};

#[test]
fn test_snapshot_isolation_basic_read() {
    let (_dir, engine) = test_engine();
    let table = int_table(&engine, "t");

    // A inserts (1) and commits at ts 1.
    let txn_a = engine.begin(IsolationLevel::SnapshotIsolation);
    insert_ints(&engine, &txn_a, &table, &[1]);
    assert!(engine.commit(&txn_a).unwrap());
    assert_eq!(txn_a.commit_ts(), 1);

    // B snapshots at ts 1.
    let txn_b = engine.begin(IsolationLevel::SnapshotIsolation);
    assert_eq!(txn_b.read_ts(), 1);

    // C updates v to 2 and commits at ts 2.
    let txn_c = engine.begin(IsolationLevel::SnapshotIsolation);
    engine
        .execute(update_plan(&table, None, vec![Expr::constant(2)]), &txn_c)
        .unwrap();
    // C's own write is visible to C before commit.
    assert_eq!(scan_ints(&engine, &txn_c, &table), vec![2]);
    assert!(engine.commit(&txn_c).unwrap());
    assert_eq!(txn_c.commit_ts(), 2);

    // B still reads its snapshot; a fresh D reads the new version.
    assert_eq!(scan_ints(&engine, &txn_b, &table), vec![1]);
    let txn_d = engine.begin(IsolationLevel::SnapshotIsolation);
    assert_eq!(txn_d.read_ts(), 2);
    assert_eq!(scan_ints(&engine, &txn_d, &table), vec![2]);
}

#[test]
fn test_write_write_conflict_taints() {
    let (_dir, engine) = test_engine();
    let table = int_table(&engine, "t");
    let setup = engine.begin(IsolationLevel::SnapshotIsolation);
    insert_ints(&engine, &setup, &table, &[1]);
    engine.commit(&setup).unwrap();

    let txn_a = engine.begin(IsolationLevel::SnapshotIsolation);
    let txn_b = engine.begin(IsolationLevel::SnapshotIsolation);

    engine
        .execute(update_plan(&table, None, vec![Expr::constant(10)]), &txn_a)
        .unwrap();

    // B writes the same rid: tainted plus a distinguished error.
    let res = engine.execute(update_plan(&table, None, vec![Expr::constant(20)]), &txn_b);
    assert!(matches!(res, Err(Error::WriteConflict)));
    assert_eq!(txn_b.state(), TransactionState::Tainted);
    engine.abort(&txn_b);
    assert_eq!(txn_b.state(), TransactionState::Aborted);

    assert!(engine.commit(&txn_a).unwrap());
    let reader = engine.begin(IsolationLevel::SnapshotIsolation);
    assert_eq!(scan_ints(&engine, &reader, &table), vec![10]);
}

#[test]
fn test_conflict_against_committed_newer_version() {
    let (_dir, engine) = test_engine();
    let table = int_table(&engine, "t");
    let setup = engine.begin(IsolationLevel::SnapshotIsolation);
    insert_ints(&engine, &setup, &table, &[1]);
    engine.commit(&setup).unwrap();

    // B snapshots before A commits its update.
    let txn_a = engine.begin(IsolationLevel::SnapshotIsolation);
    let txn_b = engine.begin(IsolationLevel::SnapshotIsolation);
    engine
        .execute(update_plan(&table, None, vec![Expr::constant(10)]), &txn_a)
        .unwrap();
    engine.commit(&txn_a).unwrap();

    // The base now carries a commit timestamp above B's snapshot.
    let res = engine.execute(delete_plan(&table, None), &txn_b);
    assert!(matches!(res, Err(Error::WriteConflict)));
    assert_eq!(txn_b.state(), TransactionState::Tainted);
    engine.abort(&txn_b);
}

#[test]
fn test_commit_restamps_write_set() {
    let (_dir, engine) = test_engine();
    let table = int_table(&engine, "t");
    let txn = engine.begin(IsolationLevel::SnapshotIsolation);
    insert_ints(&engine, &txn, &table, &[7, 8]);

    // Uncommitted bases carry the temporary timestamp.
    let write_set = txn.write_set();
    let rids: Vec<_> = write_set[&table.oid].iter().copied().collect();
    for &rid in &rids {
        assert!(table.heap.get_tuple_meta(rid).unwrap().ts >= TXN_START_ID);
    }

    assert!(engine.commit(&txn).unwrap());
    for &rid in &rids {
        assert_eq!(table.heap.get_tuple_meta(rid).unwrap().ts, txn.commit_ts());
    }
    // Visible to any reader at or above the commit timestamp.
    let reader = engine.begin(IsolationLevel::SnapshotIsolation);
    assert!(reader.read_ts() >= txn.commit_ts());
    assert_eq!(scan_ints(&engine, &reader, &table), vec![7, 8]);
}

#[test]
fn test_abort_rolls_back_update() {
    let (_dir, engine) = test_engine();
    let table = int_table(&engine, "t");
    let setup = engine.begin(IsolationLevel::SnapshotIsolation);
    insert_ints(&engine, &setup, &table, &[1]);
    engine.commit(&setup).unwrap();

    let txn = engine.begin(IsolationLevel::SnapshotIsolation);
    engine
        .execute(update_plan(&table, None, vec![Expr::constant(42)]), &txn)
        .unwrap();
    assert_eq!(scan_ints(&engine, &txn, &table), vec![42]);
    engine.abort(&txn);

    // The base tuple is physically restored; new readers see the old
    // version without walking any chain.
    let reader = engine.begin(IsolationLevel::SnapshotIsolation);
    assert_eq!(scan_ints(&engine, &reader, &table), vec![1]);
    let write_set = txn.write_set();
    let rid = *write_set[&table.oid].iter().next().unwrap();
    assert_eq!(table.heap.get_tuple_meta(rid).unwrap().ts, 1);
}

#[test]
fn test_abort_of_fresh_insert_leaves_tombstone() {
    let (_dir, engine) = test_engine();
    let table = int_table(&engine, "t");

    let txn = engine.begin(IsolationLevel::SnapshotIsolation);
    insert_ints(&engine, &txn, &table, &[5]);
    engine.abort(&txn);

    let reader = engine.begin(IsolationLevel::SnapshotIsolation);
    assert_eq!(scan_ints(&engine, &reader, &table), Vec::<i32>::new());
    let write_set = txn.write_set();
    let rid = *write_set[&table.oid].iter().next().unwrap();
    let meta = table.heap.get_tuple_meta(rid).unwrap();
    assert!(meta.is_deleted);
    assert_eq!(meta.ts, 0);
}

#[test]
fn test_abort_rolls_back_delete() {
    let (_dir, engine) = test_engine();
    let table = int_table(&engine, "t");
    let setup = engine.begin(IsolationLevel::SnapshotIsolation);
    insert_ints(&engine, &setup, &table, &[1, 2]);
    engine.commit(&setup).unwrap();

    let txn = engine.begin(IsolationLevel::SnapshotIsolation);
    engine.execute(delete_plan(&table, None), &txn).unwrap();
    assert_eq!(scan_ints(&engine, &txn, &table), Vec::<i32>::new());
    engine.abort(&txn);

    let reader = engine.begin(IsolationLevel::SnapshotIsolation);
    assert_eq!(scan_ints(&engine, &reader, &table), vec![1, 2]);
}

#[test]
fn test_repeated_writes_widen_single_undo_log() {
    let (_dir, engine) = test_engine();
    let table = int_table(&engine, "t");
    let setup = engine.begin(IsolationLevel::SnapshotIsolation);
    insert_ints(&engine, &setup, &table, &[1]);
    engine.commit(&setup).unwrap();

    let snapshot = engine.begin(IsolationLevel::SnapshotIsolation);

    let txn = engine.begin(IsolationLevel::SnapshotIsolation);
    engine
        .execute(update_plan(&table, None, vec![Expr::constant(2)]), &txn)
        .unwrap();
    engine
        .execute(update_plan(&table, None, vec![Expr::constant(3)]), &txn)
        .unwrap();
    // Two writes, one undo log: the second widened the first.
    assert_eq!(txn.undo_log_count(), 1);
    engine.commit(&txn).unwrap();

    // The old snapshot still reconstructs the original version through
    // the single widened log.
    assert_eq!(scan_ints(&engine, &snapshot, &table), vec![1]);
    let fresh = engine.begin(IsolationLevel::SnapshotIsolation);
    assert_eq!(scan_ints(&engine, &fresh, &table), vec![3]);
}

#[test]
fn test_watermark_bounds_active_readers() {
    let (_dir, engine) = test_engine();
    let table = int_table(&engine, "t");
    let setup = engine.begin(IsolationLevel::SnapshotIsolation);
    insert_ints(&engine, &setup, &table, &[1]);
    engine.commit(&setup).unwrap();

    let reader = engine.begin(IsolationLevel::SnapshotIsolation);
    for i in 0..3 {
        let writer = engine.begin(IsolationLevel::SnapshotIsolation);
        engine
            .execute(update_plan(&table, None, vec![Expr::constant(10 + i)]), &writer)
            .unwrap();
        engine.commit(&writer).unwrap();
        // While the reader is registered, the watermark never passes
        // its read timestamp.
        assert!(engine.txn_mgr.watermark() <= reader.read_ts());
    }
    engine.commit(&reader).unwrap();
    assert_eq!(engine.txn_mgr.watermark(), engine.txn_mgr.last_commit_ts());
}

#[test]
fn test_garbage_collection_reclaims_finished_txns() {
    let (_dir, engine) = test_engine();
    let table = int_table(&engine, "t");

    let t1 = engine.begin(IsolationLevel::SnapshotIsolation);
    insert_ints(&engine, &t1, &table, &[1]);
    engine.commit(&t1).unwrap();

    let t2 = engine.begin(IsolationLevel::SnapshotIsolation);
    engine
        .execute(update_plan(&table, None, vec![Expr::constant(2)]), &t2)
        .unwrap();
    engine.commit(&t2).unwrap();

    let t3 = engine.begin(IsolationLevel::SnapshotIsolation);
    engine
        .execute(update_plan(&table, None, vec![Expr::constant(3)]), &t3)
        .unwrap();
    engine.commit(&t3).unwrap();

    // A reader at the latest snapshot reads the base directly, so no
    // undo log is needed and every finished transaction is collectible.
    let reader = engine.begin(IsolationLevel::SnapshotIsolation);
    assert_eq!(reader.read_ts(), 3);
    let removed = engine.txn_mgr.garbage_collect();
    assert!(removed >= 3);
    assert!(engine.txn_mgr.txn(t1.id()).is_none());
    assert!(engine.txn_mgr.txn(t2.id()).is_none());
    assert!(engine.txn_mgr.txn(t3.id()).is_none());

    // The base version survives GC, for the old reader and new ones.
    assert_eq!(scan_ints(&engine, &reader, &table), vec![3]);
    let fresh = engine.begin(IsolationLevel::SnapshotIsolation);
    assert_eq!(scan_ints(&engine, &fresh, &table), vec![3]);
}

#[test]
fn test_gc_keeps_logs_needed_by_old_reader() {
    let (_dir, engine) = test_engine();
    let table = int_table(&engine, "t");

    let t1 = engine.begin(IsolationLevel::SnapshotIsolation);
    insert_ints(&engine, &t1, &table, &[1]);
    engine.commit(&t1).unwrap();

    // Reader pinned at ts 1.
    let reader = engine.begin(IsolationLevel::SnapshotIsolation);
    assert_eq!(reader.read_ts(), 1);

    let t2 = engine.begin(IsolationLevel::SnapshotIsolation);
    engine
        .execute(update_plan(&table, None, vec![Expr::constant(2)]), &t2)
        .unwrap();
    engine.commit(&t2).unwrap();

    engine.txn_mgr.garbage_collect();
    // t2's undo log is the only path back to version 1: it survives.
    assert!(engine.txn_mgr.txn(t2.id()).is_some());
    assert_eq!(scan_ints(&engine, &reader, &table), vec![1]);

    engine.commit(&reader).unwrap();
    engine.txn_mgr.garbage_collect();
    assert!(engine.txn_mgr.txn(t2.id()).is_none());
}

#[test]
fn test_serializable_commit_accepts() {
    let (_dir, engine) = test_engine();
    let table = int_table(&engine, "t");
    let txn = engine.begin(IsolationLevel::Serializable);
    insert_ints(&engine, &txn, &table, &[1]);
    // Scans under SERIALIZABLE record their predicates for a future
    // certifier; the stub verifier accepts.
    let pred = Expr::eq(Expr::column(0), Expr::constant(1));
    engine
        .execute(crate::exec::tests::scan_plan(&table, Some(pred)), &txn)
        .unwrap();
    assert!(!txn.scan_predicates().is_empty());
    assert!(engine.commit(&txn).unwrap());
}

#[test]
#[should_panic(expected = "not in running state")]
fn test_commit_twice_is_fatal() {
    let (_dir, engine) = test_engine();
    let txn = engine.begin(IsolationLevel::SnapshotIsolation);
    engine.commit(&txn).unwrap();
    let _ = engine.commit(&txn);
}
