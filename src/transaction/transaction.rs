// Transaction context: per-transaction lock sets, the page set used by
// index descents, and the write records replayed by abort.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use parking_lot::Mutex;
use thiserror::Error;

use crate::catalog::value::CompositeKey;
use crate::common::types::{PageId, Rid, TxnId};
use crate::index::btree::tree::BPlusTree;
use crate::storage::table::TableHeap;
use crate::transaction::lock_manager::LockMode;

/// Transaction isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
}

/// Two-phase locking states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Growing,
    Shrinking,
    Committed,
    Aborted,
}

/// Why a transaction was forcibly aborted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    Deadlock,
    UpgradeConflict,
    LockOnShrinking,
    SharedOnReadUncommitted,
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::Deadlock => write!(f, "deadlock"),
            AbortReason::UpgradeConflict => write!(f, "upgrade conflict"),
            AbortReason::LockOnShrinking => write!(f, "lock acquired while shrinking"),
            AbortReason::SharedOnReadUncommitted => {
                write!(f, "shared lock under read-uncommitted")
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("transaction {txn_id} aborted: {reason}")]
    Abort { txn_id: TxnId, reason: AbortReason },

    #[error("transaction {0} is not active")]
    InvalidState(TxnId),

    #[error("internal transaction error: {0}")]
    Internal(String),
}

/// Undo information for one heap mutation.
pub enum TableWriteOp {
    Insert,
    Delete { old: Vec<u8> },
    Update { old: Vec<u8> },
}

pub struct TableWriteRecord {
    pub rid: Rid,
    pub op: TableWriteOp,
    pub table: Arc<TableHeap>,
}

/// Undo information for one index mutation. `key` is the key the
/// operation touched; an update additionally remembers the key it
/// replaced.
pub enum IndexWriteOp {
    Insert,
    Delete,
    Update { old_key: CompositeKey },
}

pub struct IndexWriteRecord {
    pub rid: Rid,
    pub key: CompositeKey,
    pub op: IndexWriteOp,
    pub index: Arc<BPlusTree<CompositeKey>>,
}

/// An active transaction. Shared across the executor, the lock manager
/// and the deadlock detector, so every mutable piece sits behind its
/// own small mutex.
pub struct Transaction {
    id: TxnId,
    isolation_level: IsolationLevel,
    state: Mutex<TransactionState>,
    shared_lock_set: Mutex<HashSet<Rid>>,
    exclusive_lock_set: Mutex<HashSet<Rid>>,
    deleted_page_set: Mutex<HashSet<PageId>>,
    table_write_records: Mutex<Vec<TableWriteRecord>>,
    index_write_records: Mutex<Vec<IndexWriteRecord>>,
}

impl Transaction {
    pub fn new(id: TxnId, isolation_level: IsolationLevel) -> Self {
        Self {
            id,
            isolation_level,
            state: Mutex::new(TransactionState::Growing),
            shared_lock_set: Mutex::new(HashSet::new()),
            exclusive_lock_set: Mutex::new(HashSet::new()),
            deleted_page_set: Mutex::new(HashSet::new()),
            table_write_records: Mutex::new(Vec::new()),
            index_write_records: Mutex::new(Vec::new()),
        }
    }

    pub fn id(&self) -> TxnId {
        self.id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation_level
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock()
    }

    pub fn set_state(&self, state: TransactionState) {
        *self.state.lock() = state;
    }

    pub fn is_aborted(&self) -> bool {
        self.state() == TransactionState::Aborted
    }

    /// The single growing -> shrinking transition point of two-phase
    /// locking. Releasing a shared lock under read-committed does not
    /// end the growing phase; that level takes short read locks.
    pub fn record_unlock(&self, mode: LockMode) {
        let mut state = self.state.lock();
        if *state == TransactionState::Growing
            && !(mode == LockMode::Shared
                && self.isolation_level == IsolationLevel::ReadCommitted)
        {
            *state = TransactionState::Shrinking;
        }
    }

    // Lock bookkeeping

    pub fn is_shared_locked(&self, rid: &Rid) -> bool {
        self.shared_lock_set.lock().contains(rid)
    }

    pub fn is_exclusive_locked(&self, rid: &Rid) -> bool {
        self.exclusive_lock_set.lock().contains(rid)
    }

    pub fn add_shared_lock(&self, rid: Rid) {
        self.shared_lock_set.lock().insert(rid);
    }

    pub fn add_exclusive_lock(&self, rid: Rid) {
        self.exclusive_lock_set.lock().insert(rid);
    }

    pub fn remove_shared_lock(&self, rid: &Rid) {
        self.shared_lock_set.lock().remove(rid);
    }

    pub fn remove_exclusive_lock(&self, rid: &Rid) {
        self.exclusive_lock_set.lock().remove(rid);
    }

    pub fn shared_locked_rids(&self) -> Vec<Rid> {
        self.shared_lock_set.lock().iter().copied().collect()
    }

    pub fn exclusive_locked_rids(&self) -> Vec<Rid> {
        self.exclusive_lock_set.lock().iter().copied().collect()
    }

    // Index page bookkeeping

    pub fn add_deleted_page(&self, page_id: PageId) {
        self.deleted_page_set.lock().insert(page_id);
    }

    pub fn take_deleted_pages(&self) -> Vec<PageId> {
        self.deleted_page_set.lock().drain().collect()
    }

    // Write records, consumed in reverse by the abort path

    pub fn append_table_write_record(&self, record: TableWriteRecord) {
        self.table_write_records.lock().push(record);
    }

    pub fn append_index_write_record(&self, record: IndexWriteRecord) {
        self.index_write_records.lock().push(record);
    }

    pub fn take_table_write_records(&self) -> Vec<TableWriteRecord> {
        std::mem::take(&mut self.table_write_records.lock())
    }

    pub fn take_index_write_records(&self) -> Vec<IndexWriteRecord> {
        std::mem::take(&mut self.index_write_records.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_transaction_is_growing() {
        let txn = Transaction::new(1, IsolationLevel::RepeatableRead);
        assert_eq!(txn.id(), 1);
        assert_eq!(txn.state(), TransactionState::Growing);
        assert!(!txn.is_aborted());
    }

    #[test]
    fn test_unlock_transitions_to_shrinking() {
        let txn = Transaction::new(2, IsolationLevel::RepeatableRead);
        txn.record_unlock(LockMode::Shared);
        assert_eq!(txn.state(), TransactionState::Shrinking);

        // Further unlocks keep it shrinking.
        txn.record_unlock(LockMode::Exclusive);
        assert_eq!(txn.state(), TransactionState::Shrinking);
    }

    #[test]
    fn test_read_committed_shared_unlock_stays_growing() {
        let txn = Transaction::new(3, IsolationLevel::ReadCommitted);
        txn.record_unlock(LockMode::Shared);
        assert_eq!(txn.state(), TransactionState::Growing);

        txn.record_unlock(LockMode::Exclusive);
        assert_eq!(txn.state(), TransactionState::Shrinking);
    }

    #[test]
    fn test_lock_sets() {
        let txn = Transaction::new(4, IsolationLevel::RepeatableRead);
        let rid = Rid::new(1, 7);

        txn.add_shared_lock(rid);
        assert!(txn.is_shared_locked(&rid));
        txn.remove_shared_lock(&rid);
        txn.add_exclusive_lock(rid);
        assert!(!txn.is_shared_locked(&rid));
        assert!(txn.is_exclusive_locked(&rid));
    }
}
