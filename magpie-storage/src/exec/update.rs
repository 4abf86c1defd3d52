use crate::buffer::page::INVALID_PAGE_ID;
use crate::error::Result;
use crate::exec::{mvcc_write, ExecContext, Executor};
use crate::expr::Expr;
use crate::table::mvcc;
use crate::table::tuple::{Rid, Tuple};
use magpie_catalog::{Schema, TableOid};
use magpie_datatype::Value;
use std::sync::Arc;

/// Updates every row produced by the child in place.
///
/// The child is buffered eagerly, the write-write conflict check runs
/// over the whole rid list first, and only then are undo logs appended
/// (or widened) and new values installed with the transaction's
/// temporary timestamp. Emits one row: the number of updated tuples.
pub struct UpdateExecutor {
    ctx: ExecContext,
    table_oid: TableOid,
    target_exprs: Vec<Arc<Expr>>,
    child: Box<dyn Executor>,
    schema: Schema,
    done: bool,
}

impl UpdateExecutor {
    pub fn new(
        ctx: ExecContext,
        table_oid: TableOid,
        target_exprs: Vec<Arc<Expr>>,
        child: Box<dyn Executor>,
        schema: Schema,
    ) -> Self {
        UpdateExecutor {
            ctx,
            table_oid,
            target_exprs,
            child,
            schema,
            done: false,
        }
    }
}

impl Executor for UpdateExecutor {
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
            .expect("update of a known table");
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

        let child_schema = self.child.schema().clone();
        let mut updated = 0i64;
        for (child_tuple, rid) in rows {
            let new_values: Vec<Value> = self
                .target_exprs
                .iter()
                .map(|expr| expr.evaluate(&child_tuple, &child_schema))
                .collect();
            let new_tuple = Tuple::from_values(&table.schema, &new_values);

            let (_, base_tuple) = table.heap.get_tuple(rid)?;
            let base_values = base_tuple.values(&table.schema);
            let modified: Vec<usize> = (0..table.schema.column_count())
                .filter(|&i| base_values[i] != new_values[i])
                .collect();

            mvcc_write(&self.ctx, &table, rid, Some(&new_tuple), &modified)?;

            for index in &indexes {
                let old_key =
                    base_tuple.key_tuple(&table.schema, &index.key_schema, &index.key_attrs);
                let new_key =
                    new_tuple.key_tuple(&table.schema, &index.key_schema, &index.key_attrs);
                if old_key != new_key {
                    index.index.delete_entry(&old_key, rid);
                    index.index.insert_entry(&new_key, rid);
                }
            }
            updated += 1;
        }
        log::debug!(
            "txn {} updated {updated} rows in {}",
            self.ctx.txn.human_readable_id(),
            table.name
        );

        let out = Tuple::from_values(&self.schema, &[Value::from(updated)]);
        Ok(Some((out, Rid::new(INVALID_PAGE_ID, 0))))
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
