// Hash Aggregation Operator
//
// Init drains the child into a hash table keyed by the group-by
// values, folding each row into per-group partial states. Next walks
// the finished groups in insertion order, applying HAVING and the
// output projection.

use std::collections::VecDeque;
use std::sync::Arc;
use linked_hash_map::LinkedHashMap;

use crate::catalog::schema::Schema;
use crate::catalog::value::Value;
use crate::common::types::Rid;
use crate::query::executor::engine::create_executor;
use crate::query::executor::{
    synthesized_rid, ExecResult, ExecutionError, Executor, ExecutorContext,
};
use crate::query::expression::{as_bool, Expression};
use crate::query::plan::{AggregateExpression, AggregateType, AggregationPlanNode, Projection};
use crate::storage::table::Tuple;

/// Partial state of one aggregate within one group, updated in place
/// as rows stream in.
#[derive(Debug, Clone)]
struct AggregateState {
    agg_type: AggregateType,
    count: i64,
    accumulator: Option<Value>,
}

impl AggregateState {
    fn new(agg_type: AggregateType) -> Self {
        Self {
            agg_type,
            count: 0,
            accumulator: None,
        }
    }

    fn update(&mut self, input: Option<&Value>) -> ExecResult<()> {
        match self.agg_type {
            AggregateType::CountStar => {
                self.count += 1;
            }
            AggregateType::Count => {
                if !matches!(input, Some(Value::Null) | None) {
                    self.count += 1;
                }
            }
            AggregateType::Sum => {
                let value = match input {
                    Some(Value::Null) | None => return Ok(()),
                    Some(value) => value,
                };
                self.accumulator = Some(match &self.accumulator {
                    None => value.clone(),
                    Some(Value::Integer(a)) => match value {
                        Value::Integer(b) => Value::Integer(a + b),
                        Value::Float(b) => Value::Float(*a as f64 + b),
                        other => {
                            return Err(ExecutionError::Evaluation(format!(
                                "cannot sum {}",
                                other
                            )))
                        }
                    },
                    Some(Value::Float(a)) => match value {
                        Value::Integer(b) => Value::Float(a + *b as f64),
                        Value::Float(b) => Value::Float(a + b),
                        other => {
                            return Err(ExecutionError::Evaluation(format!(
                                "cannot sum {}",
                                other
                            )))
                        }
                    },
                    Some(other) => {
                        return Err(ExecutionError::Evaluation(format!(
                            "cannot sum into {}",
                            other
                        )))
                    }
                });
            }
            AggregateType::Min => {
                if let Some(value) = input {
                    if *value == Value::Null {
                        return Ok(());
                    }
                    let replace = match &self.accumulator {
                        None => true,
                        Some(current) => value < current,
                    };
                    if replace {
                        self.accumulator = Some(value.clone());
                    }
                }
            }
            AggregateType::Max => {
                if let Some(value) = input {
                    if *value == Value::Null {
                        return Ok(());
                    }
                    let replace = match &self.accumulator {
                        None => true,
                        Some(current) => value > current,
                    };
                    if replace {
                        self.accumulator = Some(value.clone());
                    }
                }
            }
        }
        Ok(())
    }

    fn finalize(&self) -> Value {
        match self.agg_type {
            AggregateType::CountStar | AggregateType::Count => Value::Integer(self.count),
            AggregateType::Sum | AggregateType::Min | AggregateType::Max => {
                self.accumulator.clone().unwrap_or(Value::Null)
            }
        }
    }
}

pub struct HashAggregationExecutor {
    child: Box<dyn Executor>,
    group_bys: Vec<Expression>,
    aggregates: Vec<AggregateExpression>,
    having: Option<Expression>,
    output: Projection,
    results: VecDeque<(Vec<Value>, Vec<Value>)>,
}

impl HashAggregationExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: &AggregationPlanNode) -> ExecResult<Self> {
        let child = create_executor(&ctx, &plan.child)?;
        Ok(Self {
            child,
            group_bys: plan.group_bys.clone(),
            aggregates: plan.aggregates.clone(),
            having: plan.having.clone(),
            output: plan.output.clone(),
            results: VecDeque::new(),
        })
    }

    fn fold_tuple(
        &self,
        table: &mut LinkedHashMap<Vec<Value>, Vec<AggregateState>>,
        tuple: &Tuple,
        schema: &Schema,
    ) -> ExecResult<()> {
        let mut group_key = Vec::with_capacity(self.group_bys.len());
        for expr in &self.group_bys {
            group_key.push(expr.evaluate(tuple, schema)?);
        }

        if !table.contains_key(&group_key) {
            let states = self
                .aggregates
                .iter()
                .map(|agg| AggregateState::new(agg.agg_type))
                .collect();
            table.insert(group_key.clone(), states);
        }
        let states = table
            .get_mut(&group_key)
            .ok_or_else(|| ExecutionError::Evaluation("aggregate group vanished".to_string()))?;

        for (state, agg) in states.iter_mut().zip(self.aggregates.iter()) {
            let input = match &agg.argument {
                Some(expr) => Some(expr.evaluate(tuple, schema)?),
                None => None,
            };
            state.update(input.as_ref())?;
        }
        Ok(())
    }
}

impl Executor for HashAggregationExecutor {
    fn init(&mut self) -> ExecResult<()> {
        self.child.init()?;
        self.results.clear();

        let mut table: LinkedHashMap<Vec<Value>, Vec<AggregateState>> = LinkedHashMap::new();
        let child_schema = self.child.output_schema().clone();

        while let Some((tuple, _rid)) = self.child.next()? {
            self.fold_tuple(&mut table, &tuple, &child_schema)?;
        }

        for (group_key, states) in table {
            let aggregates = states.iter().map(AggregateState::finalize).collect();
            self.results.push_back((group_key, aggregates));
        }
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<(Tuple, Rid)>> {
        while let Some((group_bys, aggregates)) = self.results.pop_front() {
            if let Some(having) = &self.having {
                if !as_bool(&having.evaluate_aggregate(&group_bys, &aggregates)?)? {
                    continue;
                }
            }

            let mut values = Vec::with_capacity(self.output.exprs.len());
            for expr in &self.output.exprs {
                values.push(expr.evaluate_aggregate(&group_bys, &aggregates)?);
            }
            let tuple = Tuple::from_values(&values, &self.output.schema)?;
            return Ok(Some((tuple, synthesized_rid())));
        }
        Ok(None)
    }

    fn output_schema(&self) -> &Schema {
        &self.output.schema
    }
}
