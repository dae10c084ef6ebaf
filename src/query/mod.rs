// Query Processing Module
//
// Plan nodes, expressions, and the pull-based executors that evaluate
// them. The SQL front-end that would produce these plans is out of
// scope; plans are built directly by callers.

pub mod executor;
pub mod expression;
pub mod plan;

pub use executor::engine::ExecutionEngine;
pub use executor::{ExecResult, ExecutionError, Executor, ExecutorContext};
pub use expression::{ComparisonOp, Expression};
pub use plan::PlanNode;
