// Execution Engine
//
// Builds the executor tree for a plan and drives it to completion.
// Executors resolve their catalog handles once, at construction time,
// through the shared executor context.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::query::executor::aggregation::HashAggregationExecutor;
use crate::query::executor::delete::DeleteExecutor;
use crate::query::executor::index_scan::IndexScanExecutor;
use crate::query::executor::insert::InsertExecutor;
use crate::query::executor::nested_index_join::NestedIndexJoinExecutor;
use crate::query::executor::nested_loop_join::NestedLoopJoinExecutor;
use crate::query::executor::seq_scan::SeqScanExecutor;
use crate::query::executor::update::UpdateExecutor;
use crate::query::executor::{ExecResult, Executor, ExecutorContext};
use crate::query::plan::PlanNode;
use crate::storage::buffer::BufferPoolManager;
use crate::storage::table::Tuple;
use crate::transaction::{LockManager, Transaction};

/// Instantiate the executor for a plan node, recursively building its
/// children.
pub fn create_executor(
    ctx: &Arc<ExecutorContext>,
    plan: &PlanNode,
) -> ExecResult<Box<dyn Executor>> {
    let executor: Box<dyn Executor> = match plan {
        PlanNode::SeqScan(plan) => Box::new(SeqScanExecutor::new(Arc::clone(ctx), plan)?),
        PlanNode::IndexScan(plan) => Box::new(IndexScanExecutor::new(Arc::clone(ctx), plan)?),
        PlanNode::Insert(plan) => Box::new(InsertExecutor::new(Arc::clone(ctx), plan)?),
        PlanNode::Delete(plan) => Box::new(DeleteExecutor::new(Arc::clone(ctx), plan)?),
        PlanNode::Update(plan) => Box::new(UpdateExecutor::new(Arc::clone(ctx), plan)?),
        PlanNode::NestedLoopJoin(plan) => {
            Box::new(NestedLoopJoinExecutor::new(Arc::clone(ctx), plan)?)
        }
        PlanNode::NestedIndexJoin(plan) => {
            Box::new(NestedIndexJoinExecutor::new(Arc::clone(ctx), plan)?)
        }
        PlanNode::Aggregation(plan) => {
            Box::new(HashAggregationExecutor::new(Arc::clone(ctx), plan)?)
        }
    };
    Ok(executor)
}

pub struct ExecutionEngine {
    catalog: Arc<Catalog>,
    buffer_pool: Arc<BufferPoolManager>,
    lock_manager: Arc<LockManager>,
}

impl ExecutionEngine {
    pub fn new(
        catalog: Arc<Catalog>,
        buffer_pool: Arc<BufferPoolManager>,
        lock_manager: Arc<LockManager>,
    ) -> Self {
        Self {
            catalog,
            buffer_pool,
            lock_manager,
        }
    }

    pub fn context(&self, txn: &Arc<Transaction>) -> Arc<ExecutorContext> {
        Arc::new(ExecutorContext::new(
            Arc::clone(&self.catalog),
            Arc::clone(&self.buffer_pool),
            Arc::clone(&self.lock_manager),
            Arc::clone(txn),
        ))
    }

    /// Run a plan to completion inside the given transaction and
    /// collect its output.
    pub fn execute(&self, plan: &PlanNode, txn: &Arc<Transaction>) -> ExecResult<Vec<Tuple>> {
        let ctx = self.context(txn);
        let mut executor = create_executor(&ctx, plan)?;
        executor.init()?;

        let mut rows = Vec::new();
        while let Some((tuple, _rid)) = executor.next()? {
            rows.push(tuple);
        }
        Ok(rows)
    }
}
