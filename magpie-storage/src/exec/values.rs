use crate::buffer::page::INVALID_PAGE_ID;
use crate::error::Result;
use crate::exec::Executor;
use crate::table::tuple::{Rid, Tuple};
use magpie_catalog::Schema;
use magpie_datatype::Value;

/// Emits a list of literal rows.
pub struct ValuesExecutor {
    rows: Vec<Vec<Value>>,
    schema: Schema,
    cursor: usize,
}

impl ValuesExecutor {
    pub fn new(rows: Vec<Vec<Value>>, schema: Schema) -> Self {
        ValuesExecutor {
            rows,
            schema,
            cursor: 0,
        }
    }
}

impl Executor for ValuesExecutor {
    fn init(&mut self) -> Result<()> {
        self.cursor = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        let Some(row) = self.rows.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        let tuple = Tuple::from_values(&self.schema, row);
        Ok(Some((tuple, Rid::new(INVALID_PAGE_ID, 0))))
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
