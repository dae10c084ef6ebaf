// Insert Operator
//
// Two feeding modes: literal rows carried by the plan, or rows pulled
// from a child operator. Every insert goes through the table heap and
// then into each index registered on the table.

use std::sync::Arc;

use crate::catalog::catalog::{IndexInfo, TableInfo};
use crate::catalog::schema::Schema;
use crate::catalog::value::Value;
use crate::common::types::Rid;
use crate::query::executor::engine::create_executor;
use crate::query::executor::{ExecResult, ExecutionError, Executor, ExecutorContext};
use crate::query::plan::{InsertPlanNode, InsertSource};
use crate::storage::table::Tuple;
use crate::transaction::transaction::{IndexWriteOp, IndexWriteRecord};

enum Source {
    Raw {
        rows: Vec<Vec<Value>>,
        cursor: usize,
    },
    Child(Box<dyn Executor>),
}

pub struct InsertExecutor {
    ctx: Arc<ExecutorContext>,
    table_info: Arc<TableInfo>,
    index_infos: Vec<Arc<IndexInfo>>,
    source: Source,
}

impl InsertExecutor {
    pub fn new(ctx: Arc<ExecutorContext>, plan: &InsertPlanNode) -> ExecResult<Self> {
        let table_info = ctx.catalog().get_table_by_oid(plan.table_oid)?;
        let index_infos = ctx.catalog().get_table_indexes(&table_info.name);

        let source = match &plan.source {
            InsertSource::Raw(rows) => Source::Raw {
                rows: rows.clone(),
                cursor: 0,
            },
            InsertSource::Child(child) => Source::Child(create_executor(&ctx, child)?),
        };

        Ok(Self {
            ctx,
            table_info,
            index_infos,
            source,
        })
    }

    fn insert_tuple(&self, mut tuple: Tuple) -> ExecResult<(Tuple, Rid)> {
        let txn = self.ctx.transaction();
        let rid = self.table_info.table.insert_tuple(&tuple, txn)?;
        tuple.set_rid(rid);

        for index_info in &self.index_infos {
            let key = tuple.key_from_tuple(&index_info.key_attrs)?;
            index_info.index.insert(key.clone(), rid, txn)?;
            txn.append_index_write_record(IndexWriteRecord {
                rid,
                key,
                op: IndexWriteOp::Insert,
                index: Arc::clone(&index_info.index),
            });
        }

        Ok((tuple, rid))
    }
}

impl Executor for InsertExecutor {
    fn init(&mut self) -> ExecResult<()> {
        match &mut self.source {
            Source::Raw { cursor, .. } => *cursor = 0,
            Source::Child(child) => child.init()?,
        }
        Ok(())
    }

    fn next(&mut self) -> ExecResult<Option<(Tuple, Rid)>> {
        let tuple = match &mut self.source {
            Source::Raw { rows, cursor } => {
                if *cursor >= rows.len() {
                    return Ok(None);
                }
                let values = &rows[*cursor];
                *cursor += 1;
                Tuple::from_values(values, &self.table_info.schema)
                    .map_err(ExecutionError::from)?
            }
            Source::Child(child) => match child.next()? {
                Some((tuple, _rid)) => tuple,
                None => return Ok(None),
            },
        };

        self.insert_tuple(tuple).map(Some)
    }

    fn output_schema(&self) -> &Schema {
        &self.table_info.schema
    }
}
