use crate::table::tuple::Tuple;
use magpie_catalog::Schema;
use magpie_datatype::{CmpBool, Value};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicOp {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Subtract,
}

/// Expression tree over tuples. The set of cases is closed, so a
/// tagged enum is used instead of a trait object.
///
/// `tuple_idx` on a column reference selects the input in a join
/// context: 0 for the left (or only) tuple, 1 for the right.
#[derive(Debug, Clone)]
pub enum Expr {
    ColumnRef { tuple_idx: usize, col_idx: usize },
    Constant(Value),
    Comparison { op: CmpOp, left: Arc<Expr>, right: Arc<Expr> },
    Logic { op: LogicOp, left: Arc<Expr>, right: Arc<Expr> },
    Arithmetic { op: ArithOp, left: Arc<Expr>, right: Arc<Expr> },
}

impl Expr {
    #[inline]
    pub fn column(col_idx: usize) -> Arc<Expr> {
        Arc::new(Expr::ColumnRef { tuple_idx: 0, col_idx })
    }

    #[inline]
    pub fn column_of(tuple_idx: usize, col_idx: usize) -> Arc<Expr> {
        Arc::new(Expr::ColumnRef { tuple_idx, col_idx })
    }

    #[inline]
    pub fn constant(value: impl Into<Value>) -> Arc<Expr> {
        Arc::new(Expr::Constant(value.into()))
    }

    #[inline]
    pub fn cmp(op: CmpOp, left: Arc<Expr>, right: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::Comparison { op, left, right })
    }

    #[inline]
    pub fn eq(left: Arc<Expr>, right: Arc<Expr>) -> Arc<Expr> {
        Expr::cmp(CmpOp::Eq, left, right)
    }

    #[inline]
    pub fn and(left: Arc<Expr>, right: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::Logic { op: LogicOp::And, left, right })
    }

    #[inline]
    pub fn add(left: Arc<Expr>, right: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::Arithmetic { op: ArithOp::Add, left, right })
    }

    /// Evaluates against a single tuple.
    pub fn evaluate(&self, tuple: &Tuple, schema: &Schema) -> Value {
        match self {
            Expr::ColumnRef { col_idx, .. } => tuple.value(schema, *col_idx),
            Expr::Constant(value) => value.clone(),
            Expr::Comparison { op, left, right } => {
                let l = left.evaluate(tuple, schema);
                let r = right.evaluate(tuple, schema);
                cmp_value(*op, &l, &r)
            }
            Expr::Logic { op, left, right } => {
                let l = left.evaluate(tuple, schema);
                let r = right.evaluate(tuple, schema);
                logic_value(*op, &l, &r)
            }
            Expr::Arithmetic { op, left, right } => {
                let l = left.evaluate(tuple, schema);
                let r = right.evaluate(tuple, schema);
                arith_value(*op, &l, &r)
            }
        }
    }

    /// Evaluates against a pair of join inputs; column references pick
    /// their side via `tuple_idx`.
    pub fn evaluate_join(
        &self,
        left_tuple: &Tuple,
        left_schema: &Schema,
        right_tuple: &Tuple,
        right_schema: &Schema,
    ) -> Value {
        match self {
            Expr::ColumnRef { tuple_idx, col_idx } => {
                if *tuple_idx == 0 {
                    left_tuple.value(left_schema, *col_idx)
                } else {
                    right_tuple.value(right_schema, *col_idx)
                }
            }
            Expr::Constant(value) => value.clone(),
            Expr::Comparison { op, left, right } => {
                let l = left.evaluate_join(left_tuple, left_schema, right_tuple, right_schema);
                let r = right.evaluate_join(left_tuple, left_schema, right_tuple, right_schema);
                cmp_value(*op, &l, &r)
            }
            Expr::Logic { op, left, right } => {
                let l = left.evaluate_join(left_tuple, left_schema, right_tuple, right_schema);
                let r = right.evaluate_join(left_tuple, left_schema, right_tuple, right_schema);
                logic_value(*op, &l, &r)
            }
            Expr::Arithmetic { op, left, right } => {
                let l = left.evaluate_join(left_tuple, left_schema, right_tuple, right_schema);
                let r = right.evaluate_join(left_tuple, left_schema, right_tuple, right_schema);
                arith_value(*op, &l, &r)
            }
        }
    }

    /// Predicate reading of [`evaluate`](Self::evaluate): NULL is not
    /// satisfied.
    #[inline]
    pub fn evaluate_bool(&self, tuple: &Tuple, schema: &Schema) -> bool {
        matches!(self.evaluate(tuple, schema), Value::Boolean(true))
    }
}

fn cmp_value(op: CmpOp, l: &Value, r: &Value) -> Value {
    let res = match op {
        CmpOp::Eq => l.compare_eq(r),
        CmpOp::Ne => l.compare_ne(r),
        CmpOp::Lt => l.compare_lt(r),
        CmpOp::Le => l.compare_le(r),
        CmpOp::Gt => l.compare_gt(r),
        CmpOp::Ge => l.compare_ge(r),
    };
    match res {
        CmpBool::True => Value::Boolean(true),
        CmpBool::False => Value::Boolean(false),
        CmpBool::Null => Value::Null,
    }
}

fn logic_value(op: LogicOp, l: &Value, r: &Value) -> Value {
    // Three-valued logic: NULL short-circuits only where the other
    // operand decides the result.
    let (l, r) = (truth(l), truth(r));
    let res = match op {
        LogicOp::And => match (l, r) {
            (Some(false), _) | (_, Some(false)) => Some(false),
            (Some(true), Some(true)) => Some(true),
            _ => None,
        },
        LogicOp::Or => match (l, r) {
            (Some(true), _) | (_, Some(true)) => Some(true),
            (Some(false), Some(false)) => Some(false),
            _ => None,
        },
    };
    match res {
        Some(b) => Value::Boolean(b),
        None => Value::Null,
    }
}

fn truth(v: &Value) -> Option<bool> {
    match v {
        Value::Boolean(b) => Some(*b),
        Value::Null => None,
        other => unreachable!("non-boolean operand in logic expression: {other:?}"),
    }
}

fn arith_value(op: ArithOp, l: &Value, r: &Value) -> Value {
    match op {
        ArithOp::Add => l.add(r),
        ArithOp::Subtract => match (l, r) {
            (Value::Null, _) | (_, Value::Null) => Value::Null,
            (Value::Integer(a), Value::Integer(b)) => Value::Integer(a.wrapping_sub(*b)),
            (Value::BigInt(a), Value::BigInt(b)) => Value::BigInt(a.wrapping_sub(*b)),
            (a, b) => unreachable!("cannot subtract {a:?} and {b:?}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use magpie_catalog::Column;
    use magpie_datatype::TypeId;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("a", TypeId::Integer),
            Column::new("b", TypeId::Integer),
        ])
    }

    #[test]
    fn test_evaluate_comparison() {
        let schema = schema();
        let tuple = Tuple::from_values(&schema, &[Value::from(3), Value::from(5)]);
        let pred = Expr::cmp(CmpOp::Lt, Expr::column(0), Expr::column(1));
        assert!(pred.evaluate_bool(&tuple, &schema));
        let pred = Expr::eq(Expr::column(0), Expr::constant(4));
        assert!(!pred.evaluate_bool(&tuple, &schema));
    }

    #[test]
    fn test_null_never_satisfies_predicate() {
        let schema = schema();
        let tuple = Tuple::from_values(&schema, &[Value::Null, Value::from(5)]);
        let pred = Expr::eq(Expr::column(0), Expr::constant(5));
        assert_eq!(pred.evaluate(&tuple, &schema), Value::Null);
        assert!(!pred.evaluate_bool(&tuple, &schema));
    }

    #[test]
    fn test_evaluate_join_sides() {
        let schema = schema();
        let left = Tuple::from_values(&schema, &[Value::from(1), Value::from(2)]);
        let right = Tuple::from_values(&schema, &[Value::from(1), Value::from(9)]);
        let pred = Expr::eq(Expr::column_of(0, 0), Expr::column_of(1, 0));
        assert_eq!(
            pred.evaluate_join(&left, &schema, &right, &schema),
            Value::Boolean(true)
        );
        let pred = Expr::eq(Expr::column_of(0, 1), Expr::column_of(1, 1));
        assert_eq!(
            pred.evaluate_join(&left, &schema, &right, &schema),
            Value::Boolean(false)
        );
    }

    #[test]
    fn test_arithmetic() {
        let schema = schema();
        let tuple = Tuple::from_values(&schema, &[Value::from(3), Value::from(5)]);
        let expr = Expr::add(Expr::column(0), Expr::constant(10));
        assert_eq!(expr.evaluate(&tuple, &schema), Value::from(13));
    }
}
