use crate::error::Result;
use crate::exec::Executor;
use crate::expr::Expr;
use crate::table::tuple::{Rid, Tuple};
use magpie_catalog::Schema;
use std::sync::Arc;

/// Drops child rows that do not satisfy the predicate.
pub struct FilterExecutor {
    predicate: Arc<Expr>,
    child: Box<dyn Executor>,
    schema: Schema,
}

impl FilterExecutor {
    pub fn new(predicate: Arc<Expr>, child: Box<dyn Executor>, schema: Schema) -> Self {
        FilterExecutor {
            predicate,
            child,
            schema,
        }
    }
}

impl Executor for FilterExecutor {
    fn init(&mut self) -> Result<()> {
        self.child.init()
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        while let Some((tuple, rid)) = self.child.next()? {
            if self.predicate.evaluate_bool(&tuple, self.child.schema()) {
                return Ok(Some((tuple, rid)));
            }
        }
        Ok(None)
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
