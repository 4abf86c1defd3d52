use crate::error::Result;
use crate::exec::result::ExecutorResult;
use crate::exec::sort::{cmp_order_keys, sort_keys};
use crate::exec::Executor;
use crate::expr::Expr;
use crate::plan::OrderByType;
use crate::table::tuple::{Rid, Tuple};
use magpie_catalog::Schema;
use magpie_datatype::Value;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::Arc;

/// Top-N: a bounded max-heap of size `n` under the sort comparator.
/// The heap keeps the `n` smallest rows seen so far, greatest on top,
/// so each overflow evicts the current worst in O(log n).
pub struct TopNExecutor {
    n: usize,
    order_bys: Arc<[(OrderByType, Arc<Expr>)]>,
    child: Box<dyn Executor>,
    schema: Schema,
    result: ExecutorResult,
}

struct HeapEntry {
    keys: Vec<Value>,
    tuple: Tuple,
    rid: Rid,
    order_bys: Arc<[(OrderByType, Arc<Expr>)]>,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        cmp_order_keys(&self.keys, &other.keys, &self.order_bys)
    }
}

impl TopNExecutor {
    pub fn new(
        n: usize,
        order_bys: Vec<(OrderByType, Arc<Expr>)>,
        child: Box<dyn Executor>,
        schema: Schema,
    ) -> Self {
        TopNExecutor {
            n,
            order_bys: Arc::from(order_bys.into_boxed_slice()),
            child,
            schema,
            result: ExecutorResult::new(),
        }
    }
}

impl Executor for TopNExecutor {
    fn init(&mut self) -> Result<()> {
        if self.result.is_materialized() {
            self.result.reset();
            return Ok(());
        }
        self.child.init()?;
        let child_schema = self.child.schema().clone();

        let mut heap: BinaryHeap<HeapEntry> = BinaryHeap::with_capacity(self.n + 1);
        while let Some((tuple, rid)) = self.child.next()? {
            let keys = sort_keys(&tuple, &child_schema, &self.order_bys);
            heap.push(HeapEntry {
                keys,
                tuple,
                rid,
                order_bys: Arc::clone(&self.order_bys),
            });
            if heap.len() > self.n {
                heap.pop();
            }
        }

        for entry in heap.into_sorted_vec() {
            self.result.push(entry.tuple, entry.rid);
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
