use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use anyhow::Result;

use minnowdb::common::types::Rid;
use minnowdb::transaction::{
    AbortReason, IsolationLevel, LockManager, LockManagerOptions, TransactionError,
    TransactionManager, TransactionState,
};

mod common;

fn fast_detection() -> LockManagerOptions {
    LockManagerOptions {
        detection_interval: Duration::from_millis(10),
    }
}

#[test]
fn test_shared_locks_are_compatible() -> Result<()> {
    let lock_manager = Arc::new(LockManager::new(LockManagerOptions::default()));
    let txn_manager = TransactionManager::new(Arc::clone(&lock_manager));

    let t1 = txn_manager.begin(IsolationLevel::RepeatableRead);
    let t2 = txn_manager.begin(IsolationLevel::RepeatableRead);
    let rid = Rid::new(1, 0);

    assert!(lock_manager.lock_shared(&t1, rid)?);
    assert!(lock_manager.lock_shared(&t2, rid)?);
    assert!(t1.is_shared_locked(&rid));
    assert!(t2.is_shared_locked(&rid));

    txn_manager.commit(&t1)?;
    txn_manager.commit(&t2)?;
    Ok(())
}

#[test]
fn test_writer_waits_for_readers() -> Result<()> {
    let lock_manager = Arc::new(LockManager::new(LockManagerOptions::default()));
    let txn_manager = Arc::new(TransactionManager::new(Arc::clone(&lock_manager)));

    let t1 = txn_manager.begin(IsolationLevel::RepeatableRead);
    let t2 = txn_manager.begin(IsolationLevel::RepeatableRead);
    let t3 = txn_manager.begin(IsolationLevel::RepeatableRead);
    let rid = Rid::new(2, 5);

    assert!(lock_manager.lock_shared(&t1, rid)?);
    assert!(lock_manager.lock_shared(&t2, rid)?);

    let (sender, receiver) = mpsc::channel();
    let writer = {
        let lock_manager = Arc::clone(&lock_manager);
        let t3 = Arc::clone(&t3);
        thread::spawn(move || {
            let granted = lock_manager.lock_exclusive(&t3, rid);
            sender.send(()).unwrap();
            granted
        })
    };

    // The writer must still be blocked while both readers hold on.
    assert!(receiver
        .recv_timeout(Duration::from_millis(100))
        .is_err());

    lock_manager.unlock(&t1, rid)?;
    assert!(receiver
        .recv_timeout(Duration::from_millis(100))
        .is_err());

    lock_manager.unlock(&t2, rid)?;
    assert!(receiver.recv_timeout(Duration::from_secs(2)).is_ok());
    assert!(writer.join().unwrap()?);
    assert!(t3.is_exclusive_locked(&rid));

    txn_manager.commit(&t3)?;
    Ok(())
}

#[test]
fn test_shared_lock_rejected_under_read_uncommitted() {
    let lock_manager = Arc::new(LockManager::new(LockManagerOptions::default()));
    let txn_manager = TransactionManager::new(Arc::clone(&lock_manager));

    let txn = txn_manager.begin(IsolationLevel::ReadUncommitted);
    let result = lock_manager.lock_shared(&txn, Rid::new(1, 1));

    match result {
        Err(TransactionError::Abort { reason, .. }) => {
            assert_eq!(reason, AbortReason::SharedOnReadUncommitted);
        }
        other => panic!("expected abort, got {:?}", other.map(|_| ())),
    }
    assert_eq!(txn.state(), TransactionState::Aborted);
}

#[test]
fn test_lock_after_unlock_aborts_on_shrinking() -> Result<()> {
    let lock_manager = Arc::new(LockManager::new(LockManagerOptions::default()));
    let txn_manager = TransactionManager::new(Arc::clone(&lock_manager));

    let txn = txn_manager.begin(IsolationLevel::RepeatableRead);
    let r1 = Rid::new(1, 1);
    let r2 = Rid::new(1, 2);

    lock_manager.lock_shared(&txn, r1)?;
    lock_manager.unlock(&txn, r1)?;
    assert_eq!(txn.state(), TransactionState::Shrinking);

    match lock_manager.lock_shared(&txn, r2) {
        Err(TransactionError::Abort { reason, .. }) => {
            assert_eq!(reason, AbortReason::LockOnShrinking);
        }
        other => panic!("expected abort, got {:?}", other.map(|_| ())),
    }
    Ok(())
}

#[test]
fn test_read_committed_keeps_growing_after_shared_unlock() -> Result<()> {
    let lock_manager = Arc::new(LockManager::new(LockManagerOptions::default()));
    let txn_manager = TransactionManager::new(Arc::clone(&lock_manager));

    let txn = txn_manager.begin(IsolationLevel::ReadCommitted);
    let r1 = Rid::new(1, 1);
    let r2 = Rid::new(1, 2);

    lock_manager.lock_shared(&txn, r1)?;
    lock_manager.unlock(&txn, r1)?;
    assert_eq!(txn.state(), TransactionState::Growing);

    // Short read locks do not end the growing phase.
    assert!(lock_manager.lock_shared(&txn, r2)?);
    txn_manager.commit(&txn)?;
    Ok(())
}

#[test]
fn test_upgrade_grants_after_other_reader_leaves() -> Result<()> {
    let lock_manager = Arc::new(LockManager::new(LockManagerOptions::default()));
    let txn_manager = Arc::new(TransactionManager::new(Arc::clone(&lock_manager)));

    let t1 = txn_manager.begin(IsolationLevel::RepeatableRead);
    let t2 = txn_manager.begin(IsolationLevel::RepeatableRead);
    let rid = Rid::new(3, 3);

    lock_manager.lock_shared(&t1, rid)?;
    lock_manager.lock_shared(&t2, rid)?;

    let upgrader = {
        let lock_manager = Arc::clone(&lock_manager);
        let t1 = Arc::clone(&t1);
        thread::spawn(move || lock_manager.lock_upgrade(&t1, rid))
    };

    // Let the upgrader get in line, then release the other reader.
    thread::sleep(Duration::from_millis(100));
    lock_manager.unlock(&t2, rid)?;

    assert!(upgrader.join().unwrap()?);
    assert!(t1.is_exclusive_locked(&rid));
    txn_manager.commit(&t1)?;
    Ok(())
}

#[test]
fn test_concurrent_upgrade_aborts_second_upgrader() -> Result<()> {
    let lock_manager = Arc::new(LockManager::new(LockManagerOptions::default()));
    let txn_manager = Arc::new(TransactionManager::new(Arc::clone(&lock_manager)));

    let t1 = txn_manager.begin(IsolationLevel::RepeatableRead);
    let t2 = txn_manager.begin(IsolationLevel::RepeatableRead);
    let rid = Rid::new(4, 4);

    lock_manager.lock_shared(&t1, rid)?;
    lock_manager.lock_shared(&t2, rid)?;

    // First upgrader blocks waiting for t2's read lock to go away.
    let first_upgrader = {
        let lock_manager = Arc::clone(&lock_manager);
        let t1 = Arc::clone(&t1);
        thread::spawn(move || lock_manager.lock_upgrade(&t1, rid))
    };
    thread::sleep(Duration::from_millis(100));

    // Second upgrade on the same queue conflicts immediately.
    match lock_manager.lock_upgrade(&t2, rid) {
        Err(TransactionError::Abort { reason, .. }) => {
            assert_eq!(reason, AbortReason::UpgradeConflict);
        }
        other => panic!("expected upgrade conflict, got {:?}", other.map(|_| ())),
    }
    assert_eq!(t2.state(), TransactionState::Aborted);
    txn_manager.abort(&t2)?;

    // With the conflicting reader gone, the first upgrade completes.
    assert!(first_upgrader.join().unwrap()?);
    txn_manager.commit(&t1)?;
    Ok(())
}

#[test]
fn test_deadlock_detector_aborts_younger_transaction() -> Result<()> {
    let lock_manager = Arc::new(LockManager::new(fast_detection()));
    let txn_manager = Arc::new(TransactionManager::new(Arc::clone(&lock_manager)));

    let t1 = txn_manager.begin(IsolationLevel::RepeatableRead);
    let t2 = txn_manager.begin(IsolationLevel::RepeatableRead);
    let r1 = Rid::new(5, 1);
    let r2 = Rid::new(5, 2);

    lock_manager.lock_exclusive(&t1, r1)?;
    lock_manager.lock_exclusive(&t2, r2)?;

    // t1 waits for r2 while t2 waits for r1: a two-cycle the detector
    // must break by aborting the younger (larger-id) transaction.
    let older = {
        let lock_manager = Arc::clone(&lock_manager);
        let t1 = Arc::clone(&t1);
        thread::spawn(move || lock_manager.lock_exclusive(&t1, r2))
    };
    thread::sleep(Duration::from_millis(50));

    let younger_result = {
        let lock_manager = Arc::clone(&lock_manager);
        let t2 = Arc::clone(&t2);
        let txn_manager = Arc::clone(&txn_manager);
        thread::spawn(move || {
            let result = lock_manager.lock_exclusive(&t2, r1);
            if result.is_err() {
                // The aborted side releases its locks, unblocking t1.
                txn_manager.abort(&t2).unwrap();
            }
            result
        })
        .join()
        .unwrap()
    };

    match younger_result {
        Err(TransactionError::Abort { reason, txn_id }) => {
            assert_eq!(reason, AbortReason::Deadlock);
            assert_eq!(txn_id, t2.id());
        }
        other => panic!("expected deadlock abort, got {:?}", other.map(|_| ())),
    }

    // The survivor finishes its acquisition.
    assert!(older.join().unwrap()?);
    assert!(t1.is_exclusive_locked(&r2));
    txn_manager.commit(&t1)?;
    Ok(())
}
