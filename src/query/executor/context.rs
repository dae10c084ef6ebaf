use std::sync::Arc;

use crate::catalog::Catalog;
use crate::storage::buffer::BufferPoolManager;
use crate::transaction::{LockManager, Transaction};

/// Everything an executor needs at runtime: the catalog for metadata,
/// the buffer pool for storage, the lock manager for row locks, and
/// the transaction the query runs inside.
pub struct ExecutorContext {
    catalog: Arc<Catalog>,
    buffer_pool: Arc<BufferPoolManager>,
    lock_manager: Arc<LockManager>,
    transaction: Arc<Transaction>,
}

impl ExecutorContext {
    pub fn new(
        catalog: Arc<Catalog>,
        buffer_pool: Arc<BufferPoolManager>,
        lock_manager: Arc<LockManager>,
        transaction: Arc<Transaction>,
    ) -> Self {
        Self {
            catalog,
            buffer_pool,
            lock_manager,
            transaction,
        }
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.buffer_pool
    }

    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    pub fn transaction(&self) -> &Arc<Transaction> {
        &self.transaction
    }
}
