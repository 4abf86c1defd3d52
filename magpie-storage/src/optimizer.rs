//! Bottom-up plan rewrites: children first, then the local rules.
//!
//! Rules: `Limit(Sort)` becomes Top-N; a sequential scan whose filter
//! is a single-column equality against a constant becomes an index
//! probe when a matching index exists; a nested-loop join whose
//! predicate is a conjunction of cross-side column equalities becomes
//! a hash join.

use crate::catalog::Catalog;
use crate::expr::{CmpOp, Expr};
use crate::plan::PlanNode;
use std::sync::Arc;

pub fn optimize(catalog: &Catalog, plan: PlanNode) -> PlanNode {
    let plan = optimize_children(catalog, plan);
    let plan = sort_limit_as_topn(plan);
    let plan = seq_scan_as_index_scan(catalog, plan);
    nlj_as_hash_join(plan)
}

fn optimize_child(catalog: &Catalog, child: Arc<PlanNode>) -> Arc<PlanNode> {
    Arc::new(optimize(catalog, child.as_ref().clone()))
}

fn optimize_children(catalog: &Catalog, plan: PlanNode) -> PlanNode {
    match plan {
        PlanNode::SeqScan { .. } | PlanNode::IndexScan { .. } | PlanNode::Values { .. } => plan,
        PlanNode::Filter {
            predicate,
            child,
            schema,
        } => PlanNode::Filter {
            predicate,
            child: optimize_child(catalog, child),
            schema,
        },
        PlanNode::Insert {
            table_oid,
            child,
            schema,
        } => PlanNode::Insert {
            table_oid,
            child: optimize_child(catalog, child),
            schema,
        },
        PlanNode::Update {
            table_oid,
            target_exprs,
            child,
            schema,
        } => PlanNode::Update {
            table_oid,
            target_exprs,
            child: optimize_child(catalog, child),
            schema,
        },
        PlanNode::Delete {
            table_oid,
            child,
            schema,
        } => PlanNode::Delete {
            table_oid,
            child: optimize_child(catalog, child),
            schema,
        },
        PlanNode::NestedLoopJoin {
            join_type,
            predicate,
            left,
            right,
            schema,
        } => PlanNode::NestedLoopJoin {
            join_type,
            predicate,
            left: optimize_child(catalog, left),
            right: optimize_child(catalog, right),
            schema,
        },
        PlanNode::HashJoin {
            join_type,
            left_keys,
            right_keys,
            left,
            right,
            schema,
        } => PlanNode::HashJoin {
            join_type,
            left_keys,
            right_keys,
            left: optimize_child(catalog, left),
            right: optimize_child(catalog, right),
            schema,
        },
        PlanNode::Aggregation {
            group_bys,
            aggregates,
            child,
            schema,
        } => PlanNode::Aggregation {
            group_bys,
            aggregates,
            child: optimize_child(catalog, child),
            schema,
        },
        PlanNode::Sort {
            order_bys,
            child,
            schema,
        } => PlanNode::Sort {
            order_bys,
            child: optimize_child(catalog, child),
            schema,
        },
        PlanNode::TopN {
            n,
            order_bys,
            child,
            schema,
        } => PlanNode::TopN {
            n,
            order_bys,
            child: optimize_child(catalog, child),
            schema,
        },
        PlanNode::Limit {
            limit,
            child,
            schema,
        } => PlanNode::Limit {
            limit,
            child: optimize_child(catalog, child),
            schema,
        },
        PlanNode::Window {
            columns,
            child,
            schema,
        } => PlanNode::Window {
            columns,
            child: optimize_child(catalog, child),
            schema,
        },
    }
}

fn sort_limit_as_topn(plan: PlanNode) -> PlanNode {
    if let PlanNode::Limit {
        limit,
        child,
        schema,
    } = plan
    {
        if let PlanNode::Sort {
            order_bys,
            child: sort_child,
            ..
        } = child.as_ref()
        {
            return PlanNode::TopN {
                n: limit,
                order_bys: order_bys.clone(),
                child: Arc::clone(sort_child),
                schema,
            };
        }
        return PlanNode::Limit {
            limit,
            child,
            schema,
        };
    }
    plan
}

/// Matches `col = const` (either side) at the top of the filter.
fn equality_on_column(expr: &Expr) -> Option<(usize, magpie_datatype::Value)> {
    let Expr::Comparison {
        op: CmpOp::Eq,
        left,
        right,
    } = expr
    else {
        return None;
    };
    match (left.as_ref(), right.as_ref()) {
        (Expr::ColumnRef { col_idx, .. }, Expr::Constant(value))
        | (Expr::Constant(value), Expr::ColumnRef { col_idx, .. }) => {
            Some((*col_idx, value.clone()))
        }
        _ => None,
    }
}

fn seq_scan_as_index_scan(catalog: &Catalog, plan: PlanNode) -> PlanNode {
    if let PlanNode::SeqScan {
        table_oid,
        filter: Some(filter),
        schema,
    } = &plan
    {
        if let Some((col_idx, value)) = equality_on_column(filter) {
            let table = catalog.table_info(*table_oid);
            if let Some(table) = table {
                if let Some(index) = catalog.match_index(&table.name, col_idx) {
                    return PlanNode::IndexScan {
                        table_oid: *table_oid,
                        index_oid: index.oid,
                        pred_key: value,
                        schema: schema.clone(),
                    };
                }
            }
        }
    }
    plan
}

/// Collects cross-side column equalities from a conjunction. Any other
/// shape rejects the whole rewrite.
fn extract_equi_conjuncts(
    expr: &Expr,
    left_keys: &mut Vec<Arc<Expr>>,
    right_keys: &mut Vec<Arc<Expr>>,
) -> bool {
    match expr {
        Expr::Logic {
            op: crate::expr::LogicOp::And,
            left,
            right,
        } => {
            extract_equi_conjuncts(left, left_keys, right_keys)
                && extract_equi_conjuncts(right, left_keys, right_keys)
        }
        Expr::Comparison {
            op: CmpOp::Eq,
            left,
            right,
        } => match (left.as_ref(), right.as_ref()) {
            (
                Expr::ColumnRef {
                    tuple_idx: 0,
                    col_idx: l,
                },
                Expr::ColumnRef {
                    tuple_idx: 1,
                    col_idx: r,
                },
            ) => {
                left_keys.push(Expr::column(*l));
                right_keys.push(Expr::column(*r));
                true
            }
            (
                Expr::ColumnRef {
                    tuple_idx: 1,
                    col_idx: r,
                },
                Expr::ColumnRef {
                    tuple_idx: 0,
                    col_idx: l,
                },
            ) => {
                left_keys.push(Expr::column(*l));
                right_keys.push(Expr::column(*r));
                true
            }
            _ => false,
        },
        _ => false,
    }
}

fn nlj_as_hash_join(plan: PlanNode) -> PlanNode {
    if let PlanNode::NestedLoopJoin {
        join_type,
        predicate,
        left,
        right,
        schema,
    } = &plan
    {
        let mut left_keys = vec![];
        let mut right_keys = vec![];
        if extract_equi_conjuncts(predicate, &mut left_keys, &mut right_keys)
            && !left_keys.is_empty()
        {
            return PlanNode::HashJoin {
                join_type: *join_type,
                left_keys,
                right_keys,
                left: Arc::clone(left),
                right: Arc::clone(right),
                schema: schema.clone(),
            };
        }
    }
    plan
}
