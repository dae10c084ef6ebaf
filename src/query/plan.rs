// Query Plans
//
// Plan nodes are tagged variants mirroring the executor family. Each
// node carries everything its executor needs: resolved oids, the
// predicate, and the output projection.

use crate::catalog::catalog::{IndexOid, TableOid};
use crate::catalog::schema::Schema;
use crate::catalog::value::Value;
use crate::query::expression::Expression;

/// Output description of a plan node: one expression per output
/// column, evaluated against the node's input tuple(s).
#[derive(Debug, Clone)]
pub struct Projection {
    pub schema: Schema,
    pub exprs: Vec<Expression>,
}

#[derive(Debug, Clone)]
pub enum PlanNode {
    SeqScan(SeqScanPlanNode),
    IndexScan(IndexScanPlanNode),
    Insert(InsertPlanNode),
    Delete(DeletePlanNode),
    Update(UpdatePlanNode),
    NestedLoopJoin(NestedLoopJoinPlanNode),
    NestedIndexJoin(NestedIndexJoinPlanNode),
    Aggregation(AggregationPlanNode),
}

#[derive(Debug, Clone)]
pub struct SeqScanPlanNode {
    pub table_oid: TableOid,
    pub predicate: Option<Expression>,
    pub output: Projection,
}

#[derive(Debug, Clone)]
pub struct IndexScanPlanNode {
    pub index_oid: IndexOid,
    pub predicate: Option<Expression>,
    pub output: Projection,
}

/// Insert sources: either literal rows from the plan, or rows produced
/// by a child operator.
#[derive(Debug, Clone)]
pub enum InsertSource {
    Raw(Vec<Vec<Value>>),
    Child(Box<PlanNode>),
}

#[derive(Debug, Clone)]
pub struct InsertPlanNode {
    pub table_oid: TableOid,
    pub source: InsertSource,
}

#[derive(Debug, Clone)]
pub struct DeletePlanNode {
    pub table_oid: TableOid,
    /// Produces the (tuple, rid) pairs to delete; must scan the target
    /// table without projecting columns away.
    pub child: Box<PlanNode>,
}

#[derive(Debug, Clone, Copy)]
pub enum UpdateOp {
    Add(i64),
}

#[derive(Debug, Clone)]
pub enum UpdateExpr {
    Set { column_index: usize, value: Value },
    Apply { column_index: usize, op: UpdateOp },
}

#[derive(Debug, Clone)]
pub struct UpdatePlanNode {
    pub table_oid: TableOid,
    pub updates: Vec<UpdateExpr>,
    pub child: Box<PlanNode>,
}

#[derive(Debug, Clone)]
pub struct NestedLoopJoinPlanNode {
    pub left: Box<PlanNode>,
    pub right: Box<PlanNode>,
    pub predicate: Option<Expression>,
    pub output: Projection,
}

#[derive(Debug, Clone)]
pub struct NestedIndexJoinPlanNode {
    pub outer: Box<PlanNode>,
    pub inner_table_oid: TableOid,
    pub index_name: String,
    /// Evaluated against each outer tuple to produce the probe key.
    pub outer_key: Expression,
    pub output: Projection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregateType {
    CountStar,
    Count,
    Sum,
    Min,
    Max,
}

#[derive(Debug, Clone)]
pub struct AggregateExpression {
    pub agg_type: AggregateType,
    /// The aggregated input; `None` only for COUNT(*).
    pub argument: Option<Expression>,
}

#[derive(Debug, Clone)]
pub struct AggregationPlanNode {
    pub child: Box<PlanNode>,
    pub group_bys: Vec<Expression>,
    pub aggregates: Vec<AggregateExpression>,
    /// Evaluated per group over (group-bys, aggregates).
    pub having: Option<Expression>,
    pub output: Projection,
}
