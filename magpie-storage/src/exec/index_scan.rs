use crate::catalog::{IndexInfo, TableInfo};
use crate::error::Result;
use crate::exec::{ExecContext, Executor};
use crate::table::mvcc;
use crate::table::tuple::{Rid, Tuple};
use magpie_catalog::{IndexOid, Schema, TableOid};
use magpie_datatype::Value;
use std::sync::Arc;

/// Equality probe against a hash index.
///
/// The index yields candidate rids; each candidate is fetched from the
/// heap, reconstructed under the snapshot, and re-checked against the
/// key, since index entries carry no version information.
pub struct IndexScanExecutor {
    ctx: ExecContext,
    table_oid: TableOid,
    index_oid: IndexOid,
    pred_key: Value,
    schema: Schema,
    table: Option<Arc<TableInfo>>,
    index: Option<Arc<IndexInfo>>,
    candidates: Vec<Rid>,
    cursor: usize,
}

impl IndexScanExecutor {
    pub fn new(
        ctx: ExecContext,
        table_oid: TableOid,
        index_oid: IndexOid,
        pred_key: Value,
        schema: Schema,
    ) -> Self {
        IndexScanExecutor {
            ctx,
            table_oid,
            index_oid,
            pred_key,
            schema,
            table: None,
            index: None,
            candidates: vec![],
            cursor: 0,
        }
    }
}

impl Executor for IndexScanExecutor {
    fn init(&mut self) -> Result<()> {
        let table = self
            .ctx
            .catalog
            .table_info(self.table_oid)
            .expect("scan of a known table");
        let index = self
            .ctx
            .catalog
            .index_info(self.index_oid)
            .expect("scan of a known index");
        let key = Tuple::from_values(&index.key_schema, std::slice::from_ref(&self.pred_key));
        self.candidates.clear();
        index.index.scan_key(&key, &mut self.candidates);
        self.cursor = 0;
        self.table = Some(table);
        self.index = Some(index);
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        let table = self.table.as_ref().expect("init first");
        let index = self.index.as_ref().expect("init first");
        while self.cursor < self.candidates.len() {
            let rid = self.candidates[self.cursor];
            self.cursor += 1;
            let (base_meta, base_tuple) = table.heap.get_tuple(rid)?;
            let visible = mvcc::fetch_visible_tuple(
                &table.schema,
                &self.ctx.txn_mgr,
                &self.ctx.txn,
                base_meta,
                &base_tuple,
                rid,
            );
            let Some(tuple) = visible else {
                continue;
            };
            // Stale index entry: the visible version no longer carries
            // the probed key.
            let key_col = index.key_attrs[0];
            if !tuple
                .value(&table.schema, key_col)
                .compare_eq(&self.pred_key)
                .is_true()
            {
                continue;
            }
            return Ok(Some((tuple, rid)));
        }
        Ok(None)
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
