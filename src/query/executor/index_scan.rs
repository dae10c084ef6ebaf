// Index Scan Operator
//
// Walks the B+tree in key order and resolves each rid against the
// table heap before applying the predicate and projection.

use std::sync::Arc;

use crate::catalog::catalog::{IndexInfo, TableInfo};
use crate::catalog::schema::Schema;
use crate::catalog::value::CompositeKey;
use crate::common::types::Rid;
use crate::index::btree::TreeIterator;
use crate::query::executor::{project_tuple, ExecResult, ExecutionError, Executor, ExecutorContext};
use crate::query::expression::{as_bool, Expression};
use crate::query::plan::{IndexScanPlanNode, Projection};
use crate::storage::table::Tuple;

pub struct IndexScanExecutor {
    index_info: Arc<IndexInfo>,
    table_info: Arc<TableInfo>,
    predicate: Option<Expression>,
    output: Projection,
    iter: Option<TreeIterator<CompositeKey>>,
}

impl IndexScanExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: &IndexScanPlanNode) -> ExecResult<Self> {
        let index_info = ctx.catalog().get_index_by_oid(plan.index_oid)?;
        let table_info = ctx.catalog().get_table(&index_info.table_name)?;
        Ok(Self {
            index_info,
            table_info,
            predicate: plan.predicate.clone(),
            output: plan.output.clone(),
            iter: None,
        })
    }
}

impl Executor for IndexScanExecutor {
    fn init(&mut self) -> ExecResult<()> {
        self.iter = Some(self.index_info.index.iter()?);
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<(Tuple, Rid)>> {
        let iter = self
            .iter
            .as_mut()
            .ok_or_else(|| ExecutionError::Plan("index scan used before init".to_string()))?;

        while let Some((_key, rid)) = iter.next()? {
            let tuple = self.table_info.table.get_tuple(rid)?;

            let matches = match &self.predicate {
                Some(predicate) => {
                    as_bool(&predicate.evaluate(&tuple, &self.table_info.schema)?)?
                }
                None => true,
            };

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
