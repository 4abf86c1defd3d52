use crate::buffer::page::INVALID_PAGE_ID;
use crate::error::Result;
use crate::exec::result::ExecutorResult;
use crate::exec::Executor;
use crate::expr::Expr;
use crate::plan::AggType;
use crate::table::tuple::{Rid, Tuple};
use magpie_catalog::Schema;
use magpie_datatype::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Hash aggregation keyed by the group-by values.
///
/// Output rows are `group_bys ++ aggregates`. A global aggregation
/// (no GROUP BY) over empty input emits one row of initial values.
pub struct AggregationExecutor {
    group_bys: Vec<Arc<Expr>>,
    aggregates: Vec<(AggType, Arc<Expr>)>,
    child: Box<dyn Executor>,
    schema: Schema,
    result: ExecutorResult,
}

impl AggregationExecutor {
    pub fn new(
        group_bys: Vec<Arc<Expr>>,
        aggregates: Vec<(AggType, Arc<Expr>)>,
        child: Box<dyn Executor>,
        schema: Schema,
    ) -> Self {
        AggregationExecutor {
            group_bys,
            aggregates,
            child,
            schema,
            result: ExecutorResult::new(),
        }
    }
}

/// Initial accumulator: `COUNT(*)` starts at zero, the rest at NULL.
pub(crate) fn initial_aggregate_value(agg: AggType) -> Value {
    match agg {
        AggType::CountStar => Value::Integer(0),
        AggType::Count | AggType::Sum | AggType::Min | AggType::Max => Value::Null,
    }
}

/// Folds one input value into an accumulator.
pub(crate) fn combine_aggregate(agg: AggType, acc: &Value, input: &Value) -> Value {
    match agg {
        AggType::CountStar => acc.add(&Value::Integer(1)),
        AggType::Count => {
            if input.is_null() {
                acc.clone()
            } else if acc.is_null() {
                Value::Integer(1)
            } else {
                acc.add(&Value::Integer(1))
            }
        }
        AggType::Sum => {
            if input.is_null() {
                acc.clone()
            } else if acc.is_null() {
                input.clone()
            } else {
                acc.add(input)
            }
        }
        AggType::Min => acc.min(input),
        AggType::Max => acc.max(input),
    }
}

impl Executor for AggregationExecutor {
    fn init(&mut self) -> Result<()> {
        if self.result.is_materialized() {
            self.result.reset();
            return Ok(());
        }
        self.child.init()?;
        let child_schema = self.child.schema().clone();

        let mut groups: HashMap<Vec<Value>, Vec<Value>> = HashMap::new();
        while let Some((tuple, _)) = self.child.next()? {
            let key: Vec<Value> = self
                .group_bys
                .iter()
                .map(|e| e.evaluate(&tuple, &child_schema))
                .collect();
            let accumulators = groups.entry(key).or_insert_with(|| {
                self.aggregates
                    .iter()
                    .map(|(agg, _)| initial_aggregate_value(*agg))
                    .collect()
            });
            for (i, (agg, arg)) in self.aggregates.iter().enumerate() {
                let input = arg.evaluate(&tuple, &child_schema);
                accumulators[i] = combine_aggregate(*agg, &accumulators[i], &input);
            }
        }

        if groups.is_empty() && self.group_bys.is_empty() {
            groups.insert(
                vec![],
                self.aggregates
                    .iter()
                    .map(|(agg, _)| initial_aggregate_value(*agg))
                    .collect(),
            );
        }

        let rid = Rid::new(INVALID_PAGE_ID, 0);
        for (key, accumulators) in groups {
            let mut values = key;
            values.extend(accumulators);
            self.result.push(Tuple::from_values(&self.schema, &values), rid);
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
