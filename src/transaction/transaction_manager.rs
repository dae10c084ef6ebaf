use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use parking_lot::Mutex;

use crate::common::types::TxnId;
use crate::transaction::lock_manager::LockManager;
use crate::transaction::transaction::{
    IndexWriteOp, IsolationLevel, TableWriteOp, Transaction, TransactionError, TransactionState,
};

/// Creates and tracks transactions, and drives their termination:
/// commit releases locks, abort first undoes every table and index
/// write in reverse order.
pub struct TransactionManager {
    next_txn_id: AtomicU32,
    lock_manager: Arc<LockManager>,
    active_transactions: Mutex<HashMap<TxnId, Arc<Transaction>>>,
}

impl TransactionManager {
    pub fn new(lock_manager: Arc<LockManager>) -> Self {
        Self {
            next_txn_id: AtomicU32::new(1),
            lock_manager,
            active_transactions: Mutex::new(HashMap::new()),
        }
    }

    /// Begin a new transaction at the given isolation level.
    pub fn begin(&self, isolation_level: IsolationLevel) -> Arc<Transaction> {
        let txn_id = self.next_txn_id.fetch_add(1, Ordering::SeqCst);
        let txn = Arc::new(Transaction::new(txn_id, isolation_level));
        self.active_transactions
            .lock()
            .insert(txn_id, Arc::clone(&txn));
        log::debug!("txn {} begins ({:?})", txn_id, isolation_level);
        txn
    }

    pub fn get_transaction(&self, txn_id: TxnId) -> Option<Arc<Transaction>> {
        self.active_transactions.lock().get(&txn_id).cloned()
    }

    /// Commit: under strict two-phase locking all locks are held to
    /// this point and released here.
    pub fn commit(&self, txn: &Arc<Transaction>) -> Result<(), TransactionError> {
        match txn.state() {
            TransactionState::Committed | TransactionState::Aborted => {
                return Err(TransactionError::InvalidState(txn.id()));
            }
            _ => {}
        }

        txn.set_state(TransactionState::Committed);
        // Undo information dies with the commit.
        txn.take_table_write_records();
        txn.take_index_write_records();

        self.release_all_locks(txn);
        self.active_transactions.lock().remove(&txn.id());
        log::debug!("txn {} committed", txn.id());
        Ok(())
    }

    /// Abort: replay the write records backwards to restore the heap
    /// and every index, then release all locks.
    pub fn abort(&self, txn: &Arc<Transaction>) -> Result<(), TransactionError> {
        if txn.state() == TransactionState::Committed {
            return Err(TransactionError::InvalidState(txn.id()));
        }
        txn.set_state(TransactionState::Aborted);

        for record in txn.take_table_write_records().into_iter().rev() {
            let result = match &record.op {
                TableWriteOp::Insert => record.table.undo_insert(record.rid),
                TableWriteOp::Delete { old } => record.table.undo_delete(record.rid, old),
                TableWriteOp::Update { old } => record.table.undo_update(record.rid, old),
            };
            result.map_err(|e| {
                TransactionError::Internal(format!("undo of {} failed: {}", record.rid, e))
            })?;
        }

        for record in txn.take_index_write_records().into_iter().rev() {
            let result = match record.op {
                IndexWriteOp::Insert => record.index.remove(&record.key, txn).map(|_| ()),
                IndexWriteOp::Delete => record
                    .index
                    .insert(record.key.clone(), record.rid, txn)
                    .map(|_| ()),
                IndexWriteOp::Update { old_key } => {
                    record.index.remove(&record.key, txn).and_then(|_| {
                        record.index.insert(old_key, record.rid, txn).map(|_| ())
                    })
                }
            };
            result.map_err(|e| {
                TransactionError::Internal(format!("index undo of {} failed: {}", record.rid, e))
            })?;
        }

        self.release_all_locks(txn);
        self.active_transactions.lock().remove(&txn.id());
        log::debug!("txn {} aborted", txn.id());
        Ok(())
    }

    fn release_all_locks(&self, txn: &Arc<Transaction>) {
        for rid in txn.exclusive_locked_rids() {
            let _ = self.lock_manager.unlock(txn, rid);
        }
        for rid in txn.shared_locked_rids() {
            let _ = self.lock_manager.unlock(txn, rid);
        }
    }
}
