// Query Executor Module
//
// Pull-based operators over the storage core. Every operator exposes
// the same contract: `init` resets iteration, `next` produces the next
// (tuple, rid) pair or signals exhaustion, `output_schema` is static
// per plan node.

pub mod aggregation;
pub mod context;
pub mod delete;
pub mod engine;
pub mod index_scan;
pub mod insert;
pub mod nested_index_join;
pub mod nested_loop_join;
pub mod seq_scan;
pub mod update;

use thiserror::Error;

use crate::catalog::catalog::CatalogError;
use crate::catalog::schema::Schema;
use crate::common::types::{Rid, INVALID_PAGE_ID};
use crate::index::btree::BTreeError;
use crate::query::plan::Projection;
use crate::storage::table::{TableError, Tuple, TupleError};
use crate::transaction::TransactionError;

pub use context::ExecutorContext;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("table error: {0}")]
    Table(#[from] TableError),
    #[error("tuple error: {0}")]
    Tuple(#[from] TupleError),
    #[error("index error: {0}")]
    Index(#[from] BTreeError),
    #[error("transaction error: {0}")]
    Transaction(#[from] TransactionError),
    #[error("expression error: {0}")]
    Evaluation(String),
    #[error("bad plan: {0}")]
    Plan(String),
}

pub type ExecResult<T> = Result<T, ExecutionError>;

/// The operator contract every executor implements.
pub trait Executor {
    /// Reset internal iteration state.
    fn init(&mut self) -> ExecResult<()>;

    /// Produce the next output pair, or `None` at end of stream.
    fn next(&mut self) -> ExecResult<Option<(Tuple, Rid)>>;

    /// The schema of the tuples this operator emits.
    fn output_schema(&self) -> &Schema;
}

/// Rid attached to synthesized tuples (joins, aggregates) that do not
/// correspond to a single heap row.
pub(crate) fn synthesized_rid() -> Rid {
    Rid::new(INVALID_PAGE_ID, 0)
}

/// Evaluate a node's output projection against an input tuple.
pub(crate) fn project_tuple(
    tuple: &Tuple,
    input_schema: &Schema,
    output: &Projection,
) -> ExecResult<Tuple> {
    let mut values = Vec::with_capacity(output.exprs.len());
    for expr in &output.exprs {
        values.push(expr.evaluate(tuple, input_schema)?);
    }
    Tuple::from_values(&values, &output.schema).map_err(Into::into)
}

/// Evaluate a join node's output projection against both inputs.
pub(crate) fn project_join_tuple(
    left: &Tuple,
    left_schema: &Schema,
    right: &Tuple,
    right_schema: &Schema,
    output: &Projection,
) -> ExecResult<Tuple> {
    let mut values = Vec::with_capacity(output.exprs.len());
    for expr in &output.exprs {
        values.push(expr.evaluate_join(left, left_schema, right, right_schema)?);
    }
    Tuple::from_values(&values, &output.schema).map_err(Into::into)
}
