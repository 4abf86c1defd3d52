use crate::buffer::page::INVALID_PAGE_ID;
use crate::error::Result;
use crate::exec::{mvcc_write, ExecContext, Executor};
use crate::table::mvcc;
use crate::table::tuple::{Rid, Tuple};
use magpie_catalog::{Schema, TableOid};
use magpie_datatype::Value;

/// Marks every row produced by the child as deleted.
///
/// The payload is left in place so the undo log can restore it. Emits
/// one row: the number of deleted tuples.
pub struct DeleteExecutor {
    ctx: ExecContext,
    table_oid: TableOid,
    child: Box<dyn Executor>,
    schema: Schema,
    done: bool,
}

impl DeleteExecutor {
    pub fn new(
        ctx: ExecContext,
        table_oid: TableOid,
        child: Box<dyn Executor>,
        schema: Schema,
    ) -> Self {
        DeleteExecutor {
            ctx,
            table_oid,
            child,
            schema,
            done: false,
        }
    }
}

impl Executor for DeleteExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.done = false;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let table = self
            .ctx
            .catalog
            .table_info(self.table_oid)
            .expect("delete from a known table");
        let indexes = self.ctx.catalog.table_indexes(&table.name);

        let mut rows = vec![];
        while let Some((tuple, rid)) = self.child.next()? {
            rows.push((tuple, rid));
        }

        // Fail the whole statement before touching anything.
        for (_, rid) in &rows {
            let base_meta = table.heap.get_tuple_meta(*rid)?;
            mvcc::check_write_conflict(&base_meta, &self.ctx.txn)?;
        }

        let mut deleted = 0i64;
        for (_, rid) in rows {
            let (_, base_tuple) = table.heap.get_tuple(rid)?;
            mvcc_write(&self.ctx, &table, rid, None, &[])?;
            for index in &indexes {
                let key = base_tuple.key_tuple(&table.schema, &index.key_schema, &index.key_attrs);
                index.index.delete_entry(&key, rid);
            }
            deleted += 1;
        }
        log::debug!(
            "txn {} deleted {deleted} rows from {}",
            self.ctx.txn.human_readable_id(),
            table.name
        );

        let out = Tuple::from_values(&self.schema, &[Value::from(deleted)]);
        Ok(Some((out, Rid::new(INVALID_PAGE_ID, 0))))
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
