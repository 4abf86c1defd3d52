use crate::error::Result;
use crate::exec::Executor;
use crate::table::tuple::{Rid, Tuple};
use magpie_catalog::Schema;

/// Passes through at most `limit` child rows.
pub struct LimitExecutor {
    limit: usize,
    child: Box<dyn Executor>,
    schema: Schema,
    emitted: usize,
}

impl LimitExecutor {
    pub fn new(limit: usize, child: Box<dyn Executor>, schema: Schema) -> Self {
        LimitExecutor {
            limit,
            child,
            schema,
            emitted: 0,
        }
    }
}

impl Executor for LimitExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()?;
        self.emitted = 0;
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        if self.emitted >= self.limit {
            return Ok(None);
        }
        match self.child.next()? {
            Some(row) => {
                self.emitted += 1;
                Ok(Some(row))
            }
            None => Ok(None),
        }
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
