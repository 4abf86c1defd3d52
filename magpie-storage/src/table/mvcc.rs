//! MVCC read and write protocol over the table heap.
//!
//! The base tuple always holds the newest version. Older versions are
//! reconstructed by applying reverse diffs from the version chain, head
//! first, until a version at or below the reader's snapshot is reached.

use crate::error::{Error, Result};
use crate::table::tuple::{Rid, Tuple, TupleMeta};
use crate::trx::sys::TransactionManager;
use crate::trx::undo::{UndoLink, UndoLog};
use crate::trx::Transaction;
use bit_vec::BitVec;
use magpie_catalog::Schema;
use magpie_datatype::Value;

/// Overwrites `values` with the columns carried by `log`.
pub fn apply_undo_log(schema: &Schema, values: &mut [Value], log: &UndoLog) {
    let cols = log.modified_columns();
    let partial_schema = schema.project(&cols);
    let partial_values = log.tuple.values(&partial_schema);
    for (value, &col) in partial_values.into_iter().zip(cols.iter()) {
        values[col] = value;
    }
}

/// Rebuilds the tuple state after undoing `undo_logs` in chain order.
/// Returns `None` when the resulting version is a delete marker.
///
/// The result depends only on the base and the applied prefix, so
/// replaying the same logs is idempotent.
pub fn reconstruct_tuple(
    schema: &Schema,
    base_tuple: &Tuple,
    base_meta: TupleMeta,
    undo_logs: &[UndoLog],
) -> Option<Tuple> {
    let mut is_deleted = base_meta.is_deleted;
    let mut values = base_tuple.values(schema);
    for log in undo_logs {
        is_deleted = log.is_deleted;
        if log.is_deleted {
            continue;
        }
        apply_undo_log(schema, &mut values, log);
    }
    (!is_deleted).then(|| Tuple::from_values(schema, &values))
}

/// Collects the undo logs a reader at `txn.read_ts()` must apply:
/// every log newer than the snapshot, plus the first one at or below
/// it. Returns `None` when the chain ends (invalid or dangling link)
/// before reaching the snapshot — the record is invisible then.
pub fn collect_undo_logs(
    txn_mgr: &TransactionManager,
    txn: &Transaction,
    rid: Rid,
) -> Option<Vec<UndoLog>> {
    let mut logs = vec![];
    let mut link = txn_mgr.get_undo_link(rid)?;
    loop {
        if !link.is_valid() {
            return None;
        }
        let log = txn_mgr.get_undo_log_opt(link)?;
        let ts = log.ts;
        let prev = log.prev_version;
        logs.push(log);
        if ts <= txn.read_ts() {
            return Some(logs);
        }
        link = prev;
    }
}

/// Returns the version of `(base_meta, base_tuple)` visible to `txn`,
/// or `None` when the record is invisible in its snapshot.
pub fn fetch_visible_tuple(
    schema: &Schema,
    txn_mgr: &TransactionManager,
    txn: &Transaction,
    base_meta: TupleMeta,
    base_tuple: &Tuple,
    rid: Rid,
) -> Option<Tuple> {
    // Own writes and committed-before-snapshot versions are read
    // directly off the base.
    if base_meta.ts <= txn.read_ts() || base_meta.ts == txn.id() {
        return (!base_meta.is_deleted).then(|| base_tuple.clone());
    }
    let logs = collect_undo_logs(txn_mgr, txn, rid)?;
    reconstruct_tuple(schema, base_tuple, base_meta, &logs)
}

/// First-writer-wins conflict check. A base version newer than the
/// snapshot that is not the transaction's own write taints the
/// transaction and fails.
pub fn check_write_conflict(base_meta: &TupleMeta, txn: &Transaction) -> Result<()> {
    if base_meta.ts > txn.read_ts() && base_meta.ts != txn.id() {
        txn.set_tainted();
        return Err(Error::WriteConflict);
    }
    Ok(())
}

fn partial_tuple(schema: &Schema, base_values: &[Value], cols: &[usize]) -> Tuple {
    let partial_schema = schema.project(cols);
    let values: Vec<Value> = cols.iter().map(|&c| base_values[c].clone()).collect();
    Tuple::from_values(&partial_schema, &values)
}

/// Builds the undo log for a first update of `rid` by the running
/// transaction: the pre-image of exactly the modified columns.
pub fn undo_log_for_update(
    schema: &Schema,
    base_tuple: &Tuple,
    base_meta: TupleMeta,
    modified: &[usize],
    prev_version: UndoLink,
) -> UndoLog {
    let mut fields = BitVec::from_elem(schema.column_count(), false);
    for &col in modified {
        fields.set(col, true);
    }
    let base_values = base_tuple.values(schema);
    UndoLog {
        is_deleted: base_meta.is_deleted,
        modified_fields: fields,
        tuple: partial_tuple(schema, &base_values, modified),
        ts: base_meta.ts,
        prev_version,
    }
}

/// Builds the undo log for a first delete: the full pre-image, so the
/// prior live version can be restored.
pub fn undo_log_for_delete(
    schema: &Schema,
    base_tuple: &Tuple,
    base_meta: TupleMeta,
    prev_version: UndoLink,
) -> UndoLog {
    let all: Vec<usize> = (0..schema.column_count()).collect();
    undo_log_for_update(schema, base_tuple, base_meta, &all, prev_version)
}

/// Widens an existing undo log for a subsequent write by the same
/// transaction: pre-image columns not yet covered are merged in from
/// the current base tuple, which still holds their original values.
/// No new log is created; timestamps and the chain link are untouched.
pub fn widen_undo_log(
    schema: &Schema,
    existing: &UndoLog,
    base_tuple: &Tuple,
    extra: &[usize],
) -> UndoLog {
    let old_cols = existing.modified_columns();
    let old_schema = schema.project(&old_cols);
    let old_values = existing.tuple.values(&old_schema);

    let mut fields = existing.modified_fields.clone();
    for &col in extra {
        fields.set(col, true);
    }

    let base_values = base_tuple.values(schema);
    let new_cols: Vec<usize> = fields
        .iter()
        .enumerate()
        .filter_map(|(i, set)| set.then_some(i))
        .collect();
    let values: Vec<Value> = new_cols
        .iter()
        .map(|&col| match old_cols.iter().position(|&c| c == col) {
            Some(i) => old_values[i].clone(),
            None => base_values[col].clone(),
        })
        .collect();
    let partial_schema = schema.project(&new_cols);
    UndoLog {
        is_deleted: existing.is_deleted,
        modified_fields: fields,
        tuple: Tuple::from_values(&partial_schema, &values),
        ts: existing.ts,
        prev_version: existing.prev_version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use magpie_catalog::Column;
    use magpie_datatype::TypeId;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("a", TypeId::Integer),
            Column::new("b", TypeId::Integer),
            Column::new("c", TypeId::Integer),
        ])
    }

    fn tuple(a: i32, b: i32, c: i32) -> Tuple {
        Tuple::from_values(&schema(), &[a.into(), b.into(), c.into()])
    }

    #[test]
    fn test_reconstruct_applies_diffs_in_order() {
        let schema = schema();
        let base = tuple(10, 20, 30);
        let base_meta = TupleMeta::new(5, false);

        // Newest-first chain: (a=1) at ts 3, then (a=0, b=2) at ts 1.
        let log_a = undo_log_for_update(
            &schema,
            &tuple(1, 20, 30),
            TupleMeta::new(3, false),
            &[0],
            UndoLink::INVALID,
        );
        let log_b = undo_log_for_update(
            &schema,
            &tuple(0, 2, 30),
            TupleMeta::new(1, false),
            &[0, 1],
            UndoLink::INVALID,
        );

        let logs = vec![log_a.clone(), log_b.clone()];
        let v1 = reconstruct_tuple(&schema, &base, base_meta, &logs).unwrap();
        assert_eq!(v1.values(&schema), vec![0.into(), 2.into(), 30.into()]);

        // Applying only the first diff yields the middle version.
        let v3 = reconstruct_tuple(&schema, &base, base_meta, &logs[..1]).unwrap();
        assert_eq!(v3.values(&schema), vec![1.into(), 20.into(), 30.into()]);

        // Idempotent: same inputs, same output.
        let again = reconstruct_tuple(&schema, &base, base_meta, &logs).unwrap();
        assert_eq!(again, v1);
    }

    #[test]
    fn test_reconstruct_delete_marker() {
        let schema = schema();
        let base = tuple(1, 2, 3);
        // The version this log restores was already deleted.
        let deleted = UndoLog {
            is_deleted: true,
            modified_fields: BitVec::from_elem(3, false),
            tuple: Tuple::from_values(&schema.project(&[]), &[]),
            ts: 2,
            prev_version: UndoLink::INVALID,
        };
        assert!(reconstruct_tuple(&schema, &base, TupleMeta::new(9, false), &[deleted]).is_none());
    }

    #[test]
    fn test_widen_keeps_older_preimage() {
        let schema = schema();
        // First write captured column 0 of the original (a=10).
        let original = tuple(10, 20, 30);
        let first = undo_log_for_update(
            &schema,
            &original,
            TupleMeta::new(4, false),
            &[0],
            UndoLink::INVALID,
        );
        // The transaction then wrote a=11 in place; now it modifies b.
        let current_base = tuple(11, 20, 30);
        let widened = widen_undo_log(&schema, &first, &current_base, &[1]);
        assert_eq!(widened.modified_columns(), vec![0, 1]);
        let partial_schema = schema.project(&[0, 1]);
        assert_eq!(
            widened.tuple.values(&partial_schema),
            vec![10.into(), 20.into()]
        );
        assert_eq!(widened.ts, 4);
    }
}
