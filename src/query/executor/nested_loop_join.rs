// Nested Loop Join Operator
//
// The classic pull formulation: for every outer row, re-initialize and
// drain the inner side, emitting combined rows that satisfy the join
// predicate.

use std::sync::Arc;

use crate::catalog::schema::Schema;
use crate::common::types::Rid;
use crate::query::executor::engine::create_executor;
use crate::query::executor::{
    project_join_tuple, synthesized_rid, ExecResult, Executor, ExecutorContext,
};
use crate::query::expression::{as_bool, Expression};
use crate::query::plan::{NestedLoopJoinPlanNode, Projection};
use crate::storage::table::Tuple;

pub struct NestedLoopJoinExecutor {
    left: Box<dyn Executor>,
    right: Box<dyn Executor>,
    predicate: Option<Expression>,
    output: Projection,
    current_left: Option<Tuple>,
}

impl NestedLoopJoinExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: &NestedLoopJoinPlanNode) -> ExecResult<Self> {
        let left = create_executor(&ctx, &plan.left)?;
        let right = create_executor(&ctx, &plan.right)?;

        Ok(Self {
            left,
            right,
            predicate: plan.predicate.clone(),
            output: plan.output.clone(),
            current_left: None,
        })
    }
}

impl Executor for NestedLoopJoinExecutor {
    fn init(&mut self) -> ExecResult<()> {
        self.left.init()?;
        self.right.init()?;
        self.current_left = self.left.next()?.map(|(tuple, _)| tuple);
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<(Tuple, Rid)>> {
        loop {
            let left_tuple = match &self.current_left {
                Some(tuple) => tuple.clone(),
                None => return Ok(None),
            };

            while let Some((right_tuple, _)) = self.right.next()? {
                let matches = match &self.predicate {
                    Some(predicate) => as_bool(&predicate.evaluate_join(
                        &left_tuple,
                        self.left.output_schema(),
                        &right_tuple,
                        self.right.output_schema(),
                    )?)?,
                    None => true,
                };

                if matches {
                    let out = project_join_tuple(
                        &left_tuple,
                        self.left.output_schema(),
                        &right_tuple,
                        self.right.output_schema(),
                        &self.output,
                    )?;
                    return Ok(Some((out, synthesized_rid())));
                }
            }

            // Inner exhausted: advance the outer and rewind the inner.
            self.current_left = self.left.next()?.map(|(tuple, _)| tuple);
            self.right.init()?;
        }
    }

    fn output_schema(&self) -> &Schema {
        &self.output.schema
    }
}
