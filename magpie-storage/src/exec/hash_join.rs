use crate::buffer::page::INVALID_PAGE_ID;
use crate::error::Result;
use crate::exec::nested_loop_join::{join_tuple, null_padded_tuple};
use crate::exec::result::ExecutorResult;
use crate::exec::Executor;
use crate::expr::Expr;
use crate::plan::JoinType;
use crate::table::tuple::{Rid, Tuple};
use magpie_catalog::Schema;
use magpie_datatype::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Hash join, inner or left.
///
/// Both children are bucketed by their join-key expressions in `init`.
/// Buckets only narrow the candidates; key equality is re-verified
/// column by column, so hash collisions and NULL keys (which never
/// equal anything) stay correct.
pub struct HashJoinExecutor {
    join_type: JoinType,
    left_keys: Vec<Arc<Expr>>,
    right_keys: Vec<Arc<Expr>>,
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    schema: Schema,
    result: ExecutorResult,
}

impl HashJoinExecutor {
    pub fn new(
        join_type: JoinType,
        left_keys: Vec<Arc<Expr>>,
        right_keys: Vec<Arc<Expr>>,
        left: Box<dyn Executor>,
        right: Box<dyn Executor>,
        schema: Schema,
    ) -> Self {
        HashJoinExecutor {
            join_type,
            left_keys,
            right_keys,
            left,
            right,
            schema,
            result: ExecutorResult::new(),
        }
    }
}

fn key_values(tuple: &Tuple, schema: &Schema, keys: &[Arc<Expr>]) -> Vec<Value> {
    keys.iter().map(|k| k.evaluate(tuple, schema)).collect()
}

fn keys_match(left: &[Value], right: &[Value]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right.iter())
            .all(|(l, r)| l.compare_eq(r).is_true())
}

impl Executor for HashJoinExecutor {
    fn init(&mut self) -> Result<()> {
        if self.result.is_materialized() {
            self.result.reset();
            return Ok(());
        }
        self.left.init()?;
        self.right.init()?;

        let left_schema = self.left.schema().clone();
        let right_schema = self.right.schema().clone();
        let rid = Rid::new(INVALID_PAGE_ID, 0);

        // Build side: bucket the right child by key.
        let mut right_table: HashMap<Vec<Value>, Vec<Tuple>> = HashMap::new();
        while let Some((tuple, _)) = self.right.next()? {
            let key = key_values(&tuple, &right_schema, &self.right_keys);
            right_table.entry(key).or_default().push(tuple);
        }

        // Probe side: left child in order, so output preserves the
        // left ordering.
        while let Some((left_tuple, _)) = self.left.next()? {
            let key = key_values(&left_tuple, &left_schema, &self.left_keys);
            let mut matched = false;
            if let Some(bucket) = right_table.get(&key) {
                for right_tuple in bucket {
                    let right_key = key_values(right_tuple, &right_schema, &self.right_keys);
                    if !keys_match(&key, &right_key) {
                        continue;
                    }
                    matched = true;
                    let out = join_tuple(
                        &left_tuple,
                        &left_schema,
                        right_tuple,
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
