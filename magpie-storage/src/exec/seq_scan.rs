use crate::catalog::TableInfo;
use crate::error::Result;
use crate::exec::{ExecContext, Executor};
use crate::expr::Expr;
use crate::table::iter::TableIter;
use crate::table::mvcc;
use crate::table::tuple::{Rid, Tuple};
use crate::trx::IsolationLevel;
use magpie_catalog::{Schema, TableOid};
use std::sync::Arc;

/// Full scan of a table heap under the current transaction's snapshot.
///
/// The pushed-down filter runs against the base tuple before any
/// version reconstruction; only survivors pay the chain walk.
pub struct SeqScanExecutor {
    ctx: ExecContext,
    table_oid: TableOid,
    filter: Option<Arc<Expr>>,
    schema: Schema,
    table: Option<Arc<TableInfo>>,
    iter: Option<TableIter>,
}

impl SeqScanExecutor {
    pub fn new(
        ctx: ExecContext,
        table_oid: TableOid,
        filter: Option<Arc<Expr>>,
        schema: Schema,
    ) -> Self {
        SeqScanExecutor {
            ctx,
            table_oid,
            filter,
            schema,
            table: None,
            iter: None,
        }
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> Result<()> {
        let table = self
            .ctx
            .catalog
            .table_info(self.table_oid)
            .expect("scan of a known table");
        self.iter = Some(table.heap.iter()?);
        if self.ctx.txn.isolation() == IsolationLevel::Serializable {
            if let Some(filter) = &self.filter {
                self.ctx
                    .txn
                    .append_scan_predicate(self.table_oid, Arc::clone(filter));
            }
        }
        self.table = Some(table);
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        let table = self.table.as_ref().expect("init first");
        let iter = self.iter.as_mut().expect("init first");
        while let Some((base_meta, base_tuple, rid)) = iter.next()? {
            if let Some(filter) = &self.filter {
                if !filter.evaluate_bool(&base_tuple, &self.schema) {
                    continue;
                }
            }
            let visible = mvcc::fetch_visible_tuple(
                &table.schema,
                &self.ctx.txn_mgr,
                &self.ctx.txn,
                base_meta,
                &base_tuple,
                rid,
            );
            if let Some(tuple) = visible {
                return Ok(Some((tuple, rid)));
            }
        }
        Ok(None)
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
