pub mod aggregation;
pub mod delete;
pub mod filter;
pub mod hash_join;
pub mod index_scan;
pub mod insert;
pub mod limit;
pub mod nested_loop_join;
pub mod result;
pub mod seq_scan;
pub mod sort;
pub mod topn;
pub mod update;
pub mod values;
pub mod window;


pub use result::ExecutorResult;

use crate::catalog::{Catalog, TableInfo};
use crate::error::Result;
use crate::plan::PlanNode;
use crate::table::mvcc;
use crate::table::tuple::{Rid, Tuple, TupleMeta};
use crate::trx::sys::TransactionManager;
use crate::trx::undo::UndoLink;
use crate::trx::Transaction;
use magpie_catalog::Schema;
use std::sync::Arc;

/// Everything an executor needs from its environment.
#[derive(Clone)]
pub struct ExecContext {
    pub catalog: Arc<Catalog>,
    pub txn_mgr: Arc<TransactionManager>,
    pub txn: Arc<Transaction>,
}

/// Pull-based iterator protocol. `init` prepares the executor (and
/// materializes everything for blocking operators); `next` yields one
/// result row at a time.
///
/// Re-running `init` restarts the output; blocking operators rewind
/// their buffered results without recomputation.
pub trait Executor {
    fn init(&mut self) -> Result<()>;
    fn next(&mut self) -> Result<Option<(Tuple, Rid)>>;
    fn schema(&self) -> &Schema;
}

/// Builds the executor tree for a plan, bottom-up.
pub fn create_executor(ctx: &ExecContext, plan: &PlanNode) -> Box<dyn Executor> {
    match plan {
        PlanNode::SeqScan {
            table_oid,
            filter,
            schema,
        } => Box::new(seq_scan::SeqScanExecutor::new(
            ctx.clone(),
            *table_oid,
            filter.clone(),
            schema.clone(),
        )),
        PlanNode::IndexScan {
            table_oid,
            index_oid,
            pred_key,
            schema,
        } => Box::new(index_scan::IndexScanExecutor::new(
            ctx.clone(),
            *table_oid,
            *index_oid,
            pred_key.clone(),
            schema.clone(),
        )),
        PlanNode::Filter {
            predicate,
            child,
            schema,
        } => Box::new(filter::FilterExecutor::new(
            predicate.clone(),
            create_executor(ctx, child),
            schema.clone(),
        )),
        PlanNode::Values { rows, schema } => {
            Box::new(values::ValuesExecutor::new(rows.clone(), schema.clone()))
        }
        PlanNode::Insert {
            table_oid,
            child,
            schema,
        } => Box::new(insert::InsertExecutor::new(
            ctx.clone(),
            *table_oid,
            create_executor(ctx, child),
            schema.clone(),
        )),
        PlanNode::Update {
            table_oid,
            target_exprs,
            child,
            schema,
        } => Box::new(update::UpdateExecutor::new(
            ctx.clone(),
            *table_oid,
            target_exprs.clone(),
            create_executor(ctx, child),
            schema.clone(),
        )),
        PlanNode::Delete {
            table_oid,
            child,
            schema,
        } => Box::new(delete::DeleteExecutor::new(
            ctx.clone(),
            *table_oid,
            create_executor(ctx, child),
            schema.clone(),
        )),
        PlanNode::NestedLoopJoin {
            join_type,
            predicate,
            left,
            right,
            schema,
        } => Box::new(nested_loop_join::NestedLoopJoinExecutor::new(
            *join_type,
            predicate.clone(),
            create_executor(ctx, left),
            create_executor(ctx, right),
            schema.clone(),
        )),
        PlanNode::HashJoin {
            join_type,
            left_keys,
            right_keys,
            left,
            right,
            schema,
        } => Box::new(hash_join::HashJoinExecutor::new(
            *join_type,
            left_keys.clone(),
            right_keys.clone(),
            create_executor(ctx, left),
            create_executor(ctx, right),
            schema.clone(),
        )),
        PlanNode::Aggregation {
            group_bys,
            aggregates,
            child,
            schema,
        } => Box::new(aggregation::AggregationExecutor::new(
            group_bys.clone(),
            aggregates.clone(),
            create_executor(ctx, child),
            schema.clone(),
        )),
        PlanNode::Sort {
            order_bys,
            child,
            schema,
        } => Box::new(sort::SortExecutor::new(
            order_bys.clone(),
            create_executor(ctx, child),
            schema.clone(),
        )),
        PlanNode::TopN {
            n,
            order_bys,
            child,
            schema,
        } => Box::new(topn::TopNExecutor::new(
            *n,
            order_bys.clone(),
            create_executor(ctx, child),
            schema.clone(),
        )),
        PlanNode::Limit {
            limit,
            child,
            schema,
        } => Box::new(limit::LimitExecutor::new(
            *limit,
            create_executor(ctx, child),
            schema.clone(),
        )),
        PlanNode::Window {
            columns,
            child,
            schema,
        } => Box::new(window::WindowExecutor::new(
            columns.clone(),
            create_executor(ctx, child),
            schema.clone(),
        )),
    }
}

/// Drives an executor tree to completion and collects its output.
pub fn execute(ctx: &ExecContext, plan: &PlanNode) -> Result<Vec<Tuple>> {
    let mut executor = create_executor(ctx, plan);
    executor.init()?;
    let mut out = vec![];
    while let Some((tuple, _rid)) = executor.next()? {
        out.push(tuple);
    }
    Ok(out)
}

/// Shared MVCC write path of the update and delete executors.
///
/// `new_tuple = None` stamps a delete marker; `modified` lists the
/// columns whose pre-image the undo log must carry. First writes append
/// a fresh undo log at the chain head; subsequent writes by the same
/// transaction widen the existing log instead.
pub(crate) fn mvcc_write(
    ctx: &ExecContext,
    table: &TableInfo,
    rid: Rid,
    new_tuple: Option<&Tuple>,
    modified: &[usize],
) -> Result<()> {
    let txn = &ctx.txn;
    let txn_mgr = &ctx.txn_mgr;
    let (base_meta, base_tuple) = table.heap.get_tuple(rid)?;
    mvcc::check_write_conflict(&base_meta, txn)?;

    if base_meta.ts == txn.id() {
        // Subsequent write on a record this transaction already owns.
        // Fresh self-inserts have no log to widen.
        if let Some(link) = txn_mgr
            .get_undo_link(rid)
            .filter(|link| link.is_valid() && link.prev_txn == txn.id())
        {
            let existing = txn.undo_log(link.prev_log_idx);
            let widened = mvcc::widen_undo_log(&table.schema, &existing, &base_tuple, modified);
            txn.modify_undo_log(link.prev_log_idx, widened);
        }
    } else {
        let prev = txn_mgr.get_undo_link(rid).unwrap_or(UndoLink::INVALID);
        let log = match new_tuple {
            Some(_) => {
                mvcc::undo_log_for_update(&table.schema, &base_tuple, base_meta, modified, prev)
            }
            None => mvcc::undo_log_for_delete(&table.schema, &base_tuple, base_meta, prev),
        };
        let idx = txn.append_undo_log(log);
        txn_mgr.update_undo_link(rid, Some(UndoLink::new(txn.id(), idx)), None);
    }
    txn.append_write_set(table.oid, rid);

    match new_tuple {
        Some(tuple) => {
            table
                .heap
                .update_tuple_in_place(TupleMeta::new(txn.id(), false), tuple, rid, None)?;
        }
        None => {
            // Keep the payload so undo can restore it.
            table
                .heap
                .update_tuple_meta(TupleMeta::new(txn.id(), true), rid)?;
        }
    }
    Ok(())
}
