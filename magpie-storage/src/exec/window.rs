use crate::error::Result;
use crate::exec::aggregation::{combine_aggregate, initial_aggregate_value};
use crate::exec::result::ExecutorResult;
use crate::exec::sort::{cmp_order_keys, sort_keys};
use crate::exec::Executor;
use crate::plan::{AggType, WindowExpr, WindowFuncType, WindowFunction};
use crate::table::tuple::{Rid, Tuple};
use magpie_catalog::Schema;
use magpie_datatype::Value;
use std::collections::HashMap;

/// Window functions over partitioned input.
///
/// With an ORDER BY the frame is UNBOUNDED PRECEDING .. CURRENT ROW
/// (a running aggregate in sorted order); without one the frame is the
/// whole partition. RANK assigns equal ranks to ties and skips by the
/// tie-group size.
pub struct WindowExecutor {
    columns: Vec<WindowExpr>,
    child: Box<dyn Executor>,
    schema: Schema,
    result: ExecutorResult,
}

impl WindowExecutor {
    pub fn new(columns: Vec<WindowExpr>, child: Box<dyn Executor>, schema: Schema) -> Self {
        WindowExecutor {
            columns,
            child,
            schema,
            result: ExecutorResult::new(),
        }
    }
}

fn agg_type(func: WindowFuncType) -> AggType {
    match func {
        WindowFuncType::CountStar => AggType::CountStar,
        WindowFuncType::Count => AggType::Count,
        WindowFuncType::Sum => AggType::Sum,
        WindowFuncType::Min => AggType::Min,
        WindowFuncType::Max => AggType::Max,
        WindowFuncType::Rank => unreachable!("rank is not an aggregate"),
    }
}

fn partition_key(tuple: &Tuple, schema: &Schema, func: &WindowFunction) -> Vec<Value> {
    func.partition_by
        .iter()
        .map(|e| e.evaluate(tuple, schema))
        .collect()
}

struct RankState {
    seen: i32,
    last_key: Vec<Value>,
    last_rank: i32,
}

fn compute_function(
    func: &WindowFunction,
    rows: &[(Tuple, Rid)],
    schema: &Schema,
) -> Vec<Value> {
    let mut out = Vec::with_capacity(rows.len());
    if func.func == WindowFuncType::Rank {
        // Rank is defined by the ORDER BY key: ties share, the next
        // distinct key resumes at the row number.
        let mut states: HashMap<Vec<Value>, RankState> = HashMap::new();
        for (tuple, _) in rows {
            let part = partition_key(tuple, schema, func);
            let key = sort_keys(tuple, schema, &func.order_by);
            let state = states.entry(part).or_insert_with(|| RankState {
                seen: 0,
                last_key: vec![],
                last_rank: 0,
            });
            state.seen += 1;
            if state.last_rank == 0 || state.last_key != key {
                state.last_rank = state.seen;
                state.last_key = key;
            }
            out.push(Value::Integer(state.last_rank));
        }
        return out;
    }

    let agg = agg_type(func.func);
    if func.order_by.is_empty() {
        // Whole-partition frame: aggregate first, broadcast after.
        let mut totals: HashMap<Vec<Value>, Value> = HashMap::new();
        for (tuple, _) in rows {
            let part = partition_key(tuple, schema, func);
            let input = func.arg.evaluate(tuple, schema);
            let acc = totals
                .entry(part)
                .or_insert_with(|| initial_aggregate_value(agg));
            *acc = combine_aggregate(agg, acc, &input);
        }
        for (tuple, _) in rows {
            let part = partition_key(tuple, schema, func);
            out.push(totals[&part].clone());
        }
    } else {
        // Running frame over the sorted order.
        let mut running: HashMap<Vec<Value>, Value> = HashMap::new();
        for (tuple, _) in rows {
            let part = partition_key(tuple, schema, func);
            let input = func.arg.evaluate(tuple, schema);
            let acc = running
                .entry(part)
                .or_insert_with(|| initial_aggregate_value(agg));
            *acc = combine_aggregate(agg, acc, &input);
            out.push(acc.clone());
        }
    }
    out
}

impl Executor for WindowExecutor {
    fn init(&mut self) -> Result<()> {
        if self.result.is_materialized() {
            self.result.reset();
            return Ok(());
        }
        self.child.init()?;
        let child_schema = self.child.schema().clone();

        let mut rows: Vec<(Tuple, Rid)> = vec![];
        while let Some(row) = self.child.next()? {
            rows.push(row);
        }

        // All window functions of one plan share a sort order; reorder
        // the input by the first ORDER BY present.
        let global_order = self.columns.iter().find_map(|col| match col {
            WindowExpr::Function(f) if !f.order_by.is_empty() => Some(f.order_by.clone()),
            _ => None,
        });
        if let Some(order_bys) = &global_order {
            rows.sort_by(|a, b| {
                let ka = sort_keys(&a.0, &child_schema, order_bys);
                let kb = sort_keys(&b.0, &child_schema, order_bys);
                cmp_order_keys(&ka, &kb, order_bys)
            });
        }

        let col_outputs: Vec<Vec<Value>> = self
            .columns
            .iter()
            .map(|col| match col {
                WindowExpr::Passthrough(expr) => rows
                    .iter()
                    .map(|(tuple, _)| expr.evaluate(tuple, &child_schema))
                    .collect(),
                WindowExpr::Function(func) => compute_function(func, &rows, &child_schema),
            })
            .collect();

        for (i, (_, rid)) in rows.iter().enumerate() {
            let values: Vec<Value> = col_outputs.iter().map(|col| col[i].clone()).collect();
            self.result
                .push(Tuple::from_values(&self.schema, &values), *rid);
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
