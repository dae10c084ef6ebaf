// Nested Index Join Operator
//
// For each outer row, evaluates the join key and probes the inner
// table's index, draining the matching rid list before advancing.

use std::sync::Arc;

use crate::catalog::catalog::{IndexInfo, TableInfo};
use crate::catalog::schema::Schema;
use crate::catalog::value::CompositeKey;
use crate::common::types::Rid;
use crate::query::executor::engine::create_executor;
use crate::query::executor::{project_join_tuple, ExecResult, Executor, ExecutorContext};
use crate::query::expression::Expression;
use crate::query::plan::{NestedIndexJoinPlanNode, Projection};
use crate::storage::table::Tuple;

pub struct NestedIndexJoinExecutor {
    ctx: Arc<ExecutorContext>,
    outer: Box<dyn Executor>,
    inner_table: Arc<TableInfo>,
    index_info: Arc<IndexInfo>,
    outer_key: Expression,
    output: Projection,
    current_outer: Option<Tuple>,
    pending_rids: Vec<Rid>,
}

impl NestedIndexJoinExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: &NestedIndexJoinPlanNode) -> ExecResult<Self> {
        let inner_table = ctx.catalog().get_table_by_oid(plan.inner_table_oid)?;
        let index_info = ctx
            .catalog()
            .get_index(&plan.index_name, &inner_table.name)?;
        let outer = create_executor(&ctx, &plan.outer)?;

        Ok(Self {
            ctx,
            outer,
            inner_table,
            index_info,
            outer_key: plan.outer_key.clone(),
            output: plan.output.clone(),
            current_outer: None,
            pending_rids: Vec::new(),
        })
    }
}

impl Executor for NestedIndexJoinExecutor {
    fn init(&mut self) -> ExecResult<()> {
        self.outer.init()?;
        self.current_outer = None;
        self.pending_rids.clear();
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<(Tuple, Rid)>> {
        loop {
            if let Some(rid) = self.pending_rids.pop() {
                let outer_tuple = match &self.current_outer {
                    Some(tuple) => tuple,
                    None => continue,
                };
                let inner_tuple = self.inner_table.table.get_tuple(rid)?;

                let out = project_join_tuple(
                    outer_tuple,
                    self.outer.output_schema(),
                    &inner_tuple,
                    &self.inner_table.schema,
                    &self.output,
                )?;
                return Ok(Some((out, rid)));
            }

            match self.outer.next()? {
                Some((tuple, _)) => {
                    let key_value = self.outer_key.evaluate(&tuple, self.outer.output_schema())?;
                    let probe = CompositeKey::new(vec![key_value]);
                    self.pending_rids = self
                        .index_info
                        .index
                        .scan_key(&probe, self.ctx.transaction())?;
                    self.current_outer = Some(tuple);
                }
                None => return Ok(None),
            }
        }
    }

    fn output_schema(&self) -> &Schema {
        &self.output.schema
    }
}
