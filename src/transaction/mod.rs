// Transaction Management Module

pub mod lock_manager;
pub mod transaction;
pub mod transaction_manager;

pub use lock_manager::{LockManager, LockManagerOptions, LockMode};
pub use transaction::{
    AbortReason, IsolationLevel, Transaction, TransactionError, TransactionState,
};
pub use transaction_manager::TransactionManager;
