// Expression Evaluation
//
// A small tagged expression tree: column references, literals,
// comparisons and boolean connectives. Joins evaluate against a pair
// of tuples; aggregation output evaluates against the group-by and
// aggregate value vectors instead of a tuple.

use std::cmp::Ordering;

use crate::catalog::schema::Schema;
use crate::catalog::value::Value;
use crate::query::executor::{ExecResult, ExecutionError};
use crate::storage::table::Tuple;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone)]
pub enum Expression {
    /// A column of an input tuple; `tuple_index` picks the left (0) or
    /// right (1) side of a join, and is 0 for single-input operators.
    ColumnValue {
        tuple_index: usize,
        column_index: usize,
    },
    Literal(Value),
    Comparison {
        op: ComparisonOp,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
    /// Position in the group-by vector (aggregation output only).
    GroupByRef(usize),
    /// Position in the aggregate vector (aggregation output only).
    AggregateRef(usize),
}

impl Expression {
    pub fn column(column_index: usize) -> Self {
        Expression::ColumnValue {
            tuple_index: 0,
            column_index,
        }
    }

    pub fn join_column(tuple_index: usize, column_index: usize) -> Self {
        Expression::ColumnValue {
            tuple_index,
            column_index,
        }
    }

    pub fn literal(value: Value) -> Self {
        Expression::Literal(value)
    }

    pub fn compare(op: ComparisonOp, left: Expression, right: Expression) -> Self {
        Expression::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Evaluate against a single tuple. The schema parameter keeps the
    /// operator contract uniform; tuple payloads are self-describing.
    pub fn evaluate(&self, tuple: &Tuple, _schema: &Schema) -> ExecResult<Value> {
        self.evaluate_inner(&mut |tuple_index, column_index| {
            if tuple_index != 0 {
                return Err(ExecutionError::Evaluation(
                    "join column outside a join".to_string(),
                ));
            }
            tuple.value_at(column_index).map_err(Into::into)
        })
    }

    /// Evaluate against the two sides of a join.
    pub fn evaluate_join(
        &self,
        left: &Tuple,
        _left_schema: &Schema,
        right: &Tuple,
        _right_schema: &Schema,
    ) -> ExecResult<Value> {
        self.evaluate_inner(&mut |tuple_index, column_index| match tuple_index {
            0 => left.value_at(column_index).map_err(Into::into),
            1 => right.value_at(column_index).map_err(Into::into),
            _ => Err(ExecutionError::Evaluation(format!(
                "invalid join side {}",
                tuple_index
            ))),
        })
    }

    /// Evaluate an aggregation output or HAVING expression.
    pub fn evaluate_aggregate(
        &self,
        group_bys: &[Value],
        aggregates: &[Value],
    ) -> ExecResult<Value> {
        match self {
            Expression::GroupByRef(index) => group_bys
                .get(*index)
                .cloned()
                .ok_or_else(|| ExecutionError::Evaluation(format!("group-by {} missing", index))),
            Expression::AggregateRef(index) => aggregates
                .get(*index)
                .cloned()
                .ok_or_else(|| ExecutionError::Evaluation(format!("aggregate {} missing", index))),
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Comparison { op, left, right } => {
                let left = left.evaluate_aggregate(group_bys, aggregates)?;
                let right = right.evaluate_aggregate(group_bys, aggregates)?;
                Ok(Value::Boolean(compare_values(*op, &left, &right)))
            }
            Expression::And(left, right) => {
                let left = left.evaluate_aggregate(group_bys, aggregates)?;
                let right = right.evaluate_aggregate(group_bys, aggregates)?;
                Ok(Value::Boolean(as_bool(&left)? && as_bool(&right)?))
            }
            Expression::Or(left, right) => {
                let left = left.evaluate_aggregate(group_bys, aggregates)?;
                let right = right.evaluate_aggregate(group_bys, aggregates)?;
                Ok(Value::Boolean(as_bool(&left)? || as_bool(&right)?))
            }
            Expression::ColumnValue { .. } => Err(ExecutionError::Evaluation(
                "column reference in aggregate output".to_string(),
            )),
        }
    }

    fn evaluate_inner(
        &self,
        fetch_column: &mut dyn FnMut(usize, usize) -> ExecResult<Value>,
    ) -> ExecResult<Value> {
        match self {
            Expression::ColumnValue {
                tuple_index,
                column_index,
            } => fetch_column(*tuple_index, *column_index),
            Expression::Literal(value) => Ok(value.clone()),
            Expression::Comparison { op, left, right } => {
                let left = left.evaluate_inner(fetch_column)?;
                let right = right.evaluate_inner(fetch_column)?;
                Ok(Value::Boolean(compare_values(*op, &left, &right)))
            }
            Expression::And(left, right) => {
                let left = left.evaluate_inner(fetch_column)?;
                let right = right.evaluate_inner(fetch_column)?;
                Ok(Value::Boolean(as_bool(&left)? && as_bool(&right)?))
            }
            Expression::Or(left, right) => {
                let left = left.evaluate_inner(fetch_column)?;
                let right = right.evaluate_inner(fetch_column)?;
                Ok(Value::Boolean(as_bool(&left)? || as_bool(&right)?))
            }
            Expression::GroupByRef(_) | Expression::AggregateRef(_) => Err(
                ExecutionError::Evaluation("aggregate reference outside aggregation".to_string()),
            ),
        }
    }
}

/// SQL-flavored comparison: anything involving NULL, or values of
/// incomparable types, is simply not a match.
fn compare_values(op: ComparisonOp, left: &Value, right: &Value) -> bool {
    match left.partial_cmp(right) {
        Some(ordering) => match op {
            ComparisonOp::Eq => ordering == Ordering::Equal,
            ComparisonOp::NotEq => ordering != Ordering::Equal,
            ComparisonOp::Lt => ordering == Ordering::Less,
            ComparisonOp::LtEq => ordering != Ordering::Greater,
            ComparisonOp::Gt => ordering == Ordering::Greater,
            ComparisonOp::GtEq => ordering != Ordering::Less,
        },
        None => false,
    }
}

pub(crate) fn as_bool(value: &Value) -> ExecResult<bool> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::Null => Ok(false),
        other => Err(ExecutionError::Evaluation(format!(
            "expected a boolean, got {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::column::Column;
    use crate::catalog::schema::DataType;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("id", DataType::Integer),
            Column::new("name", DataType::Text),
        ])
    }

    fn row(id: i64, name: &str) -> Tuple {
        Tuple::from_values(&[Value::Integer(id), Value::Text(name.into())], &schema()).unwrap()
    }

    #[test]
    fn test_comparison_on_columns() {
        let schema = schema();
        let expr = Expression::compare(
            ComparisonOp::Gt,
            Expression::column(0),
            Expression::literal(Value::Integer(10)),
        );

        assert_eq!(
            expr.evaluate(&row(20, "a"), &schema).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            expr.evaluate(&row(5, "a"), &schema).unwrap(),
            Value::Boolean(false)
        );
    }

    #[test]
    fn test_null_comparisons_never_match() {
        let schema = schema();
        let expr = Expression::compare(
            ComparisonOp::Eq,
            Expression::literal(Value::Null),
            Expression::literal(Value::Null),
        );
        assert_eq!(
            expr.evaluate(&row(1, "a"), &schema).unwrap(),
            Value::Boolean(false)
        );
    }

    #[test]
    fn test_join_columns_pick_sides() {
        let schema = schema();
        let expr = Expression::compare(
            ComparisonOp::Eq,
            Expression::join_column(0, 0),
            Expression::join_column(1, 0),
        );

        let matched = expr
            .evaluate_join(&row(7, "l"), &schema, &row(7, "r"), &schema)
            .unwrap();
        assert_eq!(matched, Value::Boolean(true));

        let unmatched = expr
            .evaluate_join(&row(7, "l"), &schema, &row(8, "r"), &schema)
            .unwrap();
        assert_eq!(unmatched, Value::Boolean(false));
    }

    #[test]
    fn test_aggregate_refs() {
        let having = Expression::compare(
            ComparisonOp::GtEq,
            Expression::AggregateRef(0),
            Expression::literal(Value::Integer(2)),
        );
        let group_bys = vec![Value::Integer(1)];
        let aggregates = vec![Value::Integer(3)];

        assert_eq!(
            having.evaluate_aggregate(&group_bys, &aggregates).unwrap(),
            Value::Boolean(true)
        );
    }
}
