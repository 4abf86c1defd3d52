use crate::buffer::page::INVALID_PAGE_ID;
use crate::error::Result;
use crate::exec::result::ExecutorResult;
use crate::exec::Executor;
use crate::expr::Expr;
use crate::plan::JoinType;
use crate::table::tuple::{Rid, Tuple};
use magpie_catalog::Schema;
use magpie_datatype::Value;
use std::sync::Arc;

/// Nested-loop join, inner or left.
///
/// Blocking: `init` rebuilds all matches by re-running the right child
/// once per left tuple; `next` drains the buffer.
pub struct NestedLoopJoinExecutor {
    join_type: JoinType,
    predicate: Arc<Expr>,
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    schema: Schema,
    result: ExecutorResult,
}

impl NestedLoopJoinExecutor {
    pub fn new(
        join_type: JoinType,
        predicate: Arc<Expr>,
        left: Box<dyn Executor>,
        right: Box<dyn Executor>,
        schema: Schema,
    ) -> Self {
        NestedLoopJoinExecutor {
            join_type,
            predicate,
            left,
            right,
            schema,
            result: ExecutorResult::new(),
        }
    }
}

/// Concatenates two rows into the join output schema.
pub(crate) fn join_tuple(
    left_tuple: &Tuple,
    left_schema: &Schema,
    right_tuple: &Tuple,
    right_schema: &Schema,
    out_schema: &Schema,
) -> Tuple {
    let mut values = left_tuple.values(left_schema);
    values.extend(right_tuple.values(right_schema));
    Tuple::from_values(out_schema, &values)
}

/// Left row padded with NULLs on the right, for LEFT join misses.
pub(crate) fn null_padded_tuple(
    left_tuple: &Tuple,
    left_schema: &Schema,
    right_schema: &Schema,
    out_schema: &Schema,
) -> Tuple {
    let mut values = left_tuple.values(left_schema);
    values.extend(std::iter::repeat_n(Value::Null, right_schema.column_count()));
    Tuple::from_values(out_schema, &values)
}

impl Executor for NestedLoopJoinExecutor {
    fn init(&mut self) -> Result<()> {
        if self.result.is_materialized() {
            self.result.reset();
            return Ok(());
        }
        self.left.init()?;

        let left_schema = self.left.schema().clone();
        let right_schema = self.right.schema().clone();
        let rid = Rid::new(INVALID_PAGE_ID, 0);

        while let Some((left_tuple, _)) = self.left.next()? {
            let mut matched = false;
            self.right.init()?;
            while let Some((right_tuple, _)) = self.right.next()? {
                let keep = self
                    .predicate
                    .evaluate_join(&left_tuple, &left_schema, &right_tuple, &right_schema);
                if matches!(keep, Value::Boolean(true)) {
                    matched = true;
                    let out = join_tuple(
                        &left_tuple,
                        &left_schema,
                        &right_tuple,
                        &right_schema,
                        &self.schema,
                    );
                    self.result.push(out, rid);
                }
            }
            if !matched && self.join_type == JoinType::Left {
                let out =
                    null_padded_tuple(&left_tuple, &left_schema, &right_schema, &self.schema);
                self.result.push(out, rid);
            }
        }
        self.result.set_materialized();
        Ok(())
    }

    fn next(&mut self) -> Result<Option<(Tuple, Rid)>> {
        Ok(self.result.next())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}
