use crate::expr::Expr;
use magpie_catalog::{IndexOid, Schema, TableOid};
use magpie_datatype::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderByType {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggType {
    CountStar,
    Count,
    Sum,
    Min,
    Max,
}

/// Window function kinds: the aggregates plus RANK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowFuncType {
    CountStar,
    Count,
    Sum,
    Min,
    Max,
    Rank,
}

/// One output column of a window plan: either a passthrough expression
/// over the input row or a window function computation.
#[derive(Debug, Clone)]
pub enum WindowExpr {
    Passthrough(Arc<Expr>),
    Function(WindowFunction),
}

#[derive(Debug, Clone)]
pub struct WindowFunction {
    pub func: WindowFuncType,
    pub arg: Arc<Expr>,
    pub partition_by: Vec<Arc<Expr>>,
    pub order_by: Vec<(OrderByType, Arc<Expr>)>,
}

/// Plan tree produced by the (external) planner and rewritten by the
/// optimizer. The set of node kinds is closed.
#[derive(Debug, Clone)]
pub enum PlanNode {
    SeqScan {
        table_oid: TableOid,
        /// Pushed-down predicate, evaluated on the base tuple as a fast
        /// path before version reconstruction.
        filter: Option<Arc<Expr>>,
        schema: Schema,
    },
    IndexScan {
        table_oid: TableOid,
        index_oid: IndexOid,
        /// The equality key probed in the index.
        pred_key: Value,
        schema: Schema,
    },
    Filter {
        predicate: Arc<Expr>,
        child: Arc<PlanNode>,
        schema: Schema,
    },
    Values {
        rows: Vec<Vec<Value>>,
        schema: Schema,
    },
    Insert {
        table_oid: TableOid,
        child: Arc<PlanNode>,
        schema: Schema,
    },
    Update {
        table_oid: TableOid,
        /// One expression per column of the table, evaluated over the
        /// child tuple to produce the new row.
        target_exprs: Vec<Arc<Expr>>,
        child: Arc<PlanNode>,
        schema: Schema,
    },
    Delete {
        table_oid: TableOid,
        child: Arc<PlanNode>,
        schema: Schema,
    },
    NestedLoopJoin {
        join_type: JoinType,
        predicate: Arc<Expr>,
        left: Arc<PlanNode>,
        right: Arc<PlanNode>,
        schema: Schema,
    },
    HashJoin {
        join_type: JoinType,
        left_keys: Vec<Arc<Expr>>,
        right_keys: Vec<Arc<Expr>>,
        left: Arc<PlanNode>,
        right: Arc<PlanNode>,
        schema: Schema,
    },
    Aggregation {
        group_bys: Vec<Arc<Expr>>,
        aggregates: Vec<(AggType, Arc<Expr>)>,
        child: Arc<PlanNode>,
        schema: Schema,
    },
    Sort {
        order_bys: Vec<(OrderByType, Arc<Expr>)>,
        child: Arc<PlanNode>,
        schema: Schema,
    },
    TopN {
        n: usize,
        order_bys: Vec<(OrderByType, Arc<Expr>)>,
        child: Arc<PlanNode>,
        schema: Schema,
    },
    Limit {
        limit: usize,
        child: Arc<PlanNode>,
        schema: Schema,
    },
    Window {
        columns: Vec<WindowExpr>,
        child: Arc<PlanNode>,
        schema: Schema,
    },
}

impl PlanNode {
    pub fn schema(&self) -> &Schema {
        match self {
            PlanNode::SeqScan { schema, .. }
            | PlanNode::IndexScan { schema, .. }
            | PlanNode::Filter { schema, .. }
            | PlanNode::Values { schema, .. }
            | PlanNode::Insert { schema, .. }
            | PlanNode::Update { schema, .. }
            | PlanNode::Delete { schema, .. }
            | PlanNode::NestedLoopJoin { schema, .. }
            | PlanNode::HashJoin { schema, .. }
            | PlanNode::Aggregation { schema, .. }
            | PlanNode::Sort { schema, .. }
            | PlanNode::TopN { schema, .. }
            | PlanNode::Limit { schema, .. }
            | PlanNode::Window { schema, .. } => schema,
        }
    }
}
