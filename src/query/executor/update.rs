// Update Operator
//
// Same locking discipline as Delete. The new tuple is computed from
// the plan's per-column update expressions; the heap row is rewritten
// in place and every index swaps the old key for the new one.

use std::sync::Arc;

use crate::catalog::catalog::{IndexInfo, TableInfo};
use crate::catalog::schema::Schema;
use crate::catalog::value::Value;
use crate::common::types::Rid;
use crate::query::executor::engine::create_executor;
use crate::query::executor::{ExecResult, ExecutionError, Executor, ExecutorContext};
use crate::query::plan::{UpdateExpr, UpdateOp, UpdatePlanNode};
use crate::storage::table::Tuple;
use crate::transaction::transaction::{IndexWriteOp, IndexWriteRecord};

pub struct UpdateExecutor {
    ctx: Arc<ExecutorContext>,
    table_info: Arc<TableInfo>,
    index_infos: Vec<Arc<IndexInfo>>,
    updates: Vec<UpdateExpr>,
    child: Box<dyn Executor>,
}

impl UpdateExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: &UpdatePlanNode) -> ExecResult<Self> {
        let table_info = ctx.catalog().get_table_by_oid(plan.table_oid)?;
        let index_infos = ctx.catalog().get_table_indexes(&table_info.name);
        let child = create_executor(&ctx, &plan.child)?;

        Ok(Self {
            ctx,
            table_info,
            index_infos,
            updates: plan.updates.clone(),
            child,
        })
    }

    fn generate_updated_tuple(&self, tuple: &Tuple) -> ExecResult<Tuple> {
        let mut values = tuple.values()?;

        for update in &self.updates {
            match update {
                UpdateExpr::Set {
                    column_index,
                    value,
                } => {
                    let slot = values.get_mut(*column_index).ok_or_else(|| {
                        ExecutionError::Plan(format!("update column {} out of range", column_index))
                    })?;
                    *slot = value.clone();
                }
                UpdateExpr::Apply { column_index, op } => {
                    let slot = values.get_mut(*column_index).ok_or_else(|| {
                        ExecutionError::Plan(format!("update column {} out of range", column_index))
                    })?;
                    let updated = match (op, &*slot) {
                        (UpdateOp::Add(delta), Value::Integer(old)) => Value::Integer(old + delta),
                        (UpdateOp::Add(_), other) => {
                            return Err(ExecutionError::Evaluation(format!(
                                "cannot add to non-integer value {}",
                                other
                            )));
                        }
                    };
                    *slot = updated;
                }
            }
        }

        Tuple::from_values(&values, &self.table_info.schema).map_err(Into::into)
    }
}

impl Executor for UpdateExecutor {
    fn init(&mut self) -> ExecResult<()> {
        self.child.init()
    }

    fn next(&mut self) -> ExecResult<Option<(Tuple, Rid)>> {
        let (old_tuple, rid) = match self.child.next()? {
            Some(pair) => pair,
            None => return Ok(None),
        };

        let mut new_tuple = self.generate_updated_tuple(&old_tuple)?;

        let txn = self.ctx.transaction();
        if txn.is_shared_locked(&rid) {
            self.ctx.lock_manager().lock_upgrade(txn, rid)?;
        } else if !txn.is_exclusive_locked(&rid) {
            self.ctx.lock_manager().lock_exclusive(txn, rid)?;
        }

        self.table_info.table.update_tuple(&new_tuple, rid, txn)?;
        new_tuple.set_rid(rid);

        for index_info in &self.index_infos {
            let old_key = old_tuple.key_from_tuple(&index_info.key_attrs)?;
            let new_key = new_tuple.key_from_tuple(&index_info.key_attrs)?;
            if old_key == new_key {
                continue;
            }

            index_info.index.remove(&old_key, txn)?;
            index_info.index.insert(new_key.clone(), rid, txn)?;
            txn.append_index_write_record(IndexWriteRecord {
                rid,
                key: new_key,
                op: IndexWriteOp::Update { old_key },
                index: Arc::clone(&index_info.index),
            });
        }

        Ok(Some((new_tuple, rid)))
    }

    fn output_schema(&self) -> &Schema {
        &self.table_info.schema
    }
}
