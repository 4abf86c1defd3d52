use crate::error::Result;
use crate::exec::result::ExecutorResult;
use crate::exec::Executor;
use crate::expr::Expr;
use crate::plan::OrderByType;
use crate::table::tuple::{Rid, Tuple};
use magpie_catalog::Schema;
use magpie_datatype::Value;
use std::cmp::Ordering;
use std::sync::Arc;

/// Total order over single values: NULL sorts before everything,
/// otherwise the type system's comparison decides.
pub(crate) fn value_ord(a: &Value, b: &Value) -> Ordering {
    match (a.is_null(), b.is_null()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => {
            if a.compare_lt(b).is_true() {
                Ordering::Less
            } else if a.compare_gt(b).is_true() {
                Ordering::Greater
            } else {
                Ordering::Equal
            }
        }
    }
}

/// Lexicographic comparison of precomputed sort keys under the ORDER BY
/// directions.
pub(crate) fn cmp_order_keys(
    a: &[Value],
    b: &[Value],
    order_bys: &[(OrderByType, Arc<Expr>)],
) -> Ordering {
    for (i, (direction, _)) in order_bys.iter().enumerate() {
        let ord = value_ord(&a[i], &b[i]);
        let ord = match direction {
            OrderByType::Asc => ord,
            OrderByType::Desc => ord.reverse(),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Evaluates the ORDER BY expressions of one row.
pub(crate) fn sort_keys(
    tuple: &Tuple,
    schema: &Schema,
    order_bys: &[(OrderByType, Arc<Expr>)],
) -> Vec<Value> {
    order_bys
        .iter()
        .map(|(_, expr)| expr.evaluate(tuple, schema))
        .collect()
}

/// Full sort: buffers the child, sorts once, then streams.
pub struct SortExecutor {
    order_bys: Vec<(OrderByType, Arc<Expr>)>,
    child: Box<dyn Executor>,
    schema: Schema,
    result: ExecutorResult,
}

impl SortExecutor {
    pub fn new(
        order_bys: Vec<(OrderByType, Arc<Expr>)>,
        child: Box<dyn Executor>,
        schema: Schema,
    ) -> Self {
        SortExecutor {
            order_bys,
            child,
            schema,
            result: ExecutorResult::new(),
        }
    }
}

impl Executor for SortExecutor {
    fn init(&mut self) -> Result<()> {
        if self.result.is_materialized() {
            self.result.reset();
            return Ok(());
        }
        self.child.init()?;
        let child_schema = self.child.schema().clone();

        let mut rows: Vec<(Vec<Value>, Tuple, Rid)> = vec![];
        while let Some((tuple, rid)) = self.child.next()? {
            let keys = sort_keys(&tuple, &child_schema, &self.order_bys);
            rows.push((keys, tuple, rid));
        }
        rows.sort_by(|a, b| cmp_order_keys(&a.0, &b.0, &self.order_bys));

        for (_, tuple, rid) in rows {
            self.result.push(tuple, rid);
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
