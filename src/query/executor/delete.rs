// Delete Operator
//
// Pulls victims from its child, takes (or upgrades to) an exclusive
// lock per rid, marks the heap tuple deleted and removes its entries
// from every index. Index undo records keep abort exact.

use std::sync::Arc;

use crate::catalog::catalog::{IndexInfo, TableInfo};
use crate::catalog::schema::Schema;
use crate::common::types::Rid;
use crate::query::executor::engine::create_executor;
use crate::query::executor::{ExecResult, Executor, ExecutorContext};
use crate::query::plan::DeletePlanNode;
use crate::storage::table::Tuple;
use crate::transaction::transaction::{IndexWriteOp, IndexWriteRecord};

pub struct DeleteExecutor {
    ctx: Arc<ExecutorContext>,
    table_info: Arc<TableInfo>,
    index_infos: Vec<Arc<IndexInfo>>,
    child: Box<dyn Executor>,
}

impl DeleteExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: &DeletePlanNode) -> ExecResult<Self> {
        let table_info = ctx.catalog().get_table_by_oid(plan.table_oid)?;
        let index_infos = ctx.catalog().get_table_indexes(&table_info.name);
        let child = create_executor(&ctx, &plan.child)?;

        Ok(Self {
            ctx,
            table_info,
            index_infos,
            child,
        })
    }
}

impl Executor for DeleteExecutor {
    fn init(&mut self) -> ExecResult<()> {
        self.child.init()
    }

    fn next(&mut self) -> ExecResult<Option<(Tuple, Rid)>> {
        let (tuple, rid) = match self.child.next()? {
            Some(pair) => pair,
            None => return Ok(None),
        };

        let txn = self.ctx.transaction();
        if txn.is_shared_locked(&rid) {
            self.ctx.lock_manager().lock_upgrade(txn, rid)?;
        } else if !txn.is_exclusive_locked(&rid) {
            self.ctx.lock_manager().lock_exclusive(txn, rid)?;
        }

        self.table_info.table.mark_delete(rid, txn)?;

        for index_info in &self.index_infos {
            let key = tuple.key_from_tuple(&index_info.key_attrs)?;
            index_info.index.remove(&key, txn)?;
            txn.append_index_write_record(IndexWriteRecord {
                rid,
                key,
                op: IndexWriteOp::Delete,
                index: Arc::clone(&index_info.index),
            });
        }

        Ok(Some((tuple, rid)))
    }

    fn output_schema(&self) -> &Schema {
        self.child.output_schema()
    }
}
