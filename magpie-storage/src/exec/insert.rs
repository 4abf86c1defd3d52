use crate::buffer::page::INVALID_PAGE_ID;
use crate::error::Result;
use crate::exec::{ExecContext, Executor};
use crate::table::tuple::{Rid, Tuple, TupleMeta};
use magpie_catalog::{Schema, TableOid};
use magpie_datatype::Value;

/// Inserts the child's rows into a table, stamped with the
/// transaction's temporary timestamp. Fresh inserts carry no undo log;
/// the rids still join the write set so commit re-stamps them.
///
/// Emits one row: the number of inserted tuples.
pub struct InsertExecutor {
    ctx: ExecContext,
    table_oid: TableOid,
    child: Box<dyn Executor>,
    schema: Schema,
    done: bool,
}

impl InsertExecutor {
    pub fn new(
        ctx: ExecContext,
        table_oid: TableOid,
        child: Box<dyn Executor>,
        schema: Schema,
    ) -> Self {
        InsertExecutor {
            ctx,
            table_oid,
            child,
            schema,
            done: false,
        }
    }
}

impl Executor for InsertExecutor {
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
            .expect("insert into a known table");
        let indexes = self.ctx.catalog.table_indexes(&table.name);

        // Buffer the child eagerly so a self-referential source cannot
        // observe its own inserts.
        let mut rows = vec![];
        while let Some((tuple, _)) = self.child.next()? {
            rows.push(tuple);
        }

        let mut inserted = 0i64;
        for tuple in rows {
            let meta = TupleMeta::new(self.ctx.txn.id(), false);
            let rid = table.heap.insert_tuple(meta, &tuple)?;
            self.ctx.txn.append_write_set(table.oid, rid);
            for index in &indexes {
                let key = tuple.key_tuple(&table.schema, &index.key_schema, &index.key_attrs);
                index.index.insert_entry(&key, rid);
            }
            inserted += 1;
        }
        log::debug!(
            "txn {} inserted {inserted} rows into {}",
            self.ctx.txn.human_readable_id(),
            table.name
        );

        let out = Tuple::from_values(&self.schema, &[Value::from(inserted)]);
        Ok(Some((out, Rid::new(INVALID_PAGE_ID, 0))))
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
