// Sequential Scan Operator
//
// Wraps a table heap iterator. Rows are read under a shared lock at
// every isolation level except read-uncommitted; read-committed drops
// the lock again right after the predicate is evaluated, on match and
// non-match paths alike.

use std::sync::Arc;

use crate::catalog::catalog::TableInfo;
use crate::catalog::schema::Schema;
use crate::common::types::Rid;
use crate::query::executor::{
    project_tuple, ExecResult, ExecutionError, Executor, ExecutorContext,
};
use crate::query::expression::{as_bool, Expression};
use crate::query::plan::{Projection, SeqScanPlanNode};
use crate::storage::table::{TableIterator, Tuple};
use crate::transaction::IsolationLevel;

pub struct SeqScanExecutor {
    ctx: Arc<ExecutorContext>,
    table_info: Arc<TableInfo>,
    predicate: Option<Expression>,
    output: Projection,
    iter: Option<TableIterator>,
}

impl SeqScanExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: &SeqScanPlanNode) -> ExecResult<Self> {
        let table_info = ctx.catalog().get_table_by_oid(plan.table_oid)?;
        Ok(Self {
            ctx,
            table_info,
            predicate: plan.predicate.clone(),
            output: plan.output.clone(),
            iter: None,
        })
    }
}

impl Executor for SeqScanExecutor {
    fn init(&mut self) -> ExecResult<()> {
        self.iter = Some(TableIterator::new(Arc::clone(&self.table_info.table)));
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<(Tuple, Rid)>> {
        let iter = self
            .iter
            .as_mut()
            .ok_or_else(|| ExecutionError::Plan("seq scan used before init".to_string()))?;

        while let Some((tuple, rid)) = iter.next()? {
            let txn = self.ctx.transaction();

            // Read-uncommitted takes no read locks; rows this
            // transaction already holds need no second lock.
            let mut locked_here = false;
            if txn.isolation_level() != IsolationLevel::ReadUncommitted
                && !txn.is_shared_locked(&rid)
                && !txn.is_exclusive_locked(&rid)
            {
                self.ctx.lock_manager().lock_shared(txn, rid)?;
                locked_here = true;
            }

            let matches = match &self.predicate {
                Some(predicate) => {
                    as_bool(&predicate.evaluate(&tuple, &self.table_info.schema)?)?
                }
                None => true,
            };

            // Short read locks: released once per scanned tuple,
            // whether or not it matched.
            if locked_here && txn.isolation_level() == IsolationLevel::ReadCommitted {
                self.ctx.lock_manager().unlock(txn, rid)?;
            }

            if matches {
                let mut out = project_tuple(&tuple, &self.table_info.schema, &self.output)?;
                out.set_rid(rid);
                return Ok(Some((out, rid)));
            }
        }

        Ok(None)
    }

    fn output_schema(&self) -> &Schema {
        &self.output.schema
    }
}
