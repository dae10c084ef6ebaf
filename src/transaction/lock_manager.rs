// Lock Manager
//
// Row-granularity shared/exclusive locks with strict two-phase locking
// and a background deadlock detector. One coarse mutex guards every
// per-rid request queue; waiters block on the queue's condition
// variable and re-check their transaction's aborted flag on wake.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use parking_lot::{Condvar, Mutex};

use crate::common::types::{Rid, TxnId};
use crate::transaction::transaction::{
    AbortReason, IsolationLevel, Transaction, TransactionError, TransactionState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    Shared,
    Exclusive,
}

/// Tuning knobs for the lock manager.
#[derive(Debug, Clone)]
pub struct LockManagerOptions {
    /// How often the detector rebuilds the wait-for graph.
    pub detection_interval: Duration,
}

impl Default for LockManagerOptions {
    fn default() -> Self {
        Self {
            detection_interval: Duration::from_millis(50),
        }
    }
}

struct LockRequest {
    txn: Arc<Transaction>,
    mode: LockMode,
    granted: bool,
}

/// Per-rid FIFO of lock requests plus the grant counters the wait
/// conditions are phrased over.
struct LockRequestQueue {
    requests: VecDeque<LockRequest>,
    reader_count: u32,
    writer_present: bool,
    upgrading: bool,
    condvar: Arc<Condvar>,
}

impl Default for LockRequestQueue {
    fn default() -> Self {
        Self {
            requests: VecDeque::new(),
            reader_count: 0,
            writer_present: false,
            upgrading: false,
            condvar: Arc::new(Condvar::new()),
        }
    }
}

#[derive(Default)]
struct LockTable {
    queues: HashMap<Rid, LockRequestQueue>,
}

pub struct LockManager {
    latch: Arc<Mutex<LockTable>>,
    detector_running: Arc<AtomicBool>,
    detector: Mutex<Option<JoinHandle<()>>>,
}

impl LockManager {
    pub fn new(options: LockManagerOptions) -> Self {
        let latch = Arc::new(Mutex::new(LockTable::default()));
        let detector_running = Arc::new(AtomicBool::new(true));

        let detector = {
            let latch = Arc::clone(&latch);
            let running = Arc::clone(&detector_running);
            let interval = options.detection_interval;
            std::thread::spawn(move || {
                while running.load(Ordering::SeqCst) {
                    std::thread::sleep(interval);
                    if !running.load(Ordering::SeqCst) {
                        break;
                    }
                    let mut table = latch.lock();
                    Self::run_detection_pass(&mut table);
                }
            })
        };

        Self {
            latch,
            detector_running,
            detector: Mutex::new(Some(detector)),
        }
    }

    /// Acquire a shared lock on `rid`, blocking while a writer is
    /// present. Fails while shrinking, and under read-uncommitted
    /// (which never takes read locks).
    pub fn lock_shared(
        &self,
        txn: &Arc<Transaction>,
        rid: Rid,
    ) -> Result<bool, TransactionError> {
        let mut table = self.latch.lock();

        Self::check_not_shrinking(txn)?;
        if txn.is_shared_locked(&rid) {
            return Ok(true);
        }
        if txn.isolation_level() == IsolationLevel::ReadUncommitted {
            txn.set_state(TransactionState::Aborted);
            return Err(TransactionError::Abort {
                txn_id: txn.id(),
                reason: AbortReason::SharedOnReadUncommitted,
            });
        }

        let queue = table.queues.entry(rid).or_default();
        queue.requests.push_back(LockRequest {
            txn: Arc::clone(txn),
            mode: LockMode::Shared,
            granted: false,
        });
        let condvar = queue.condvar.clone();

        log::trace!("txn {} waiting for shared lock on {}", txn.id(), rid);
        loop {
            let queue = Self::queue_of(&mut table, &rid)?;
            if !queue.writer_present || txn.is_aborted() {
                break;
            }
            condvar.wait(&mut table);
        }

        if txn.is_aborted() {
            Self::abandon_request(&mut table, txn.id(), &rid);
            return Err(TransactionError::Abort {
                txn_id: txn.id(),
                reason: AbortReason::Deadlock,
            });
        }

        let queue = Self::queue_of(&mut table, &rid)?;
        Self::request_of(queue, txn.id())?.granted = true;
        queue.reader_count += 1;
        txn.add_shared_lock(rid);
        log::trace!("txn {} granted shared lock on {}", txn.id(), rid);
        Ok(true)
    }

    /// Acquire an exclusive lock on `rid`, blocking while any reader or
    /// writer is present.
    pub fn lock_exclusive(
        &self,
        txn: &Arc<Transaction>,
        rid: Rid,
    ) -> Result<bool, TransactionError> {
        let mut table = self.latch.lock();

        Self::check_not_shrinking(txn)?;
        if txn.is_exclusive_locked(&rid) {
            return Ok(true);
        }

        let queue = table.queues.entry(rid).or_default();
        queue.requests.push_back(LockRequest {
            txn: Arc::clone(txn),
            mode: LockMode::Exclusive,
            granted: false,
        });
        let condvar = queue.condvar.clone();

        log::trace!("txn {} waiting for exclusive lock on {}", txn.id(), rid);
        loop {
            let queue = Self::queue_of(&mut table, &rid)?;
            if (!queue.writer_present && queue.reader_count == 0) || txn.is_aborted() {
                break;
            }
            condvar.wait(&mut table);
        }

        if txn.is_aborted() {
            Self::abandon_request(&mut table, txn.id(), &rid);
            return Err(TransactionError::Abort {
                txn_id: txn.id(),
                reason: AbortReason::Deadlock,
            });
        }

        let queue = Self::queue_of(&mut table, &rid)?;
        Self::request_of(queue, txn.id())?.granted = true;
        queue.writer_present = true;
        txn.add_exclusive_lock(rid);
        log::trace!("txn {} granted exclusive lock on {}", txn.id(), rid);
        Ok(true)
    }

    /// Upgrade a held shared lock to exclusive. Only one upgrade may be
    /// in flight per queue; a second upgrader aborts with an upgrade
    /// conflict.
    pub fn lock_upgrade(
        &self,
        txn: &Arc<Transaction>,
        rid: Rid,
    ) -> Result<bool, TransactionError> {
        let mut table = self.latch.lock();

        Self::check_not_shrinking(txn)?;
        if txn.is_exclusive_locked(&rid) {
            return Ok(true);
        }

        // Give up the read grant and requeue the request as exclusive.
        txn.remove_shared_lock(&rid);
        let queue = Self::queue_of(&mut table, &rid)?;
        queue.reader_count = queue.reader_count.saturating_sub(1);
        if queue.reader_count == 0 {
            queue.condvar.notify_all();
        }

        if queue.upgrading {
            Self::abandon_request(&mut table, txn.id(), &rid);
            txn.set_state(TransactionState::Aborted);
            return Err(TransactionError::Abort {
                txn_id: txn.id(),
                reason: AbortReason::UpgradeConflict,
            });
        }

        let queue = Self::queue_of(&mut table, &rid)?;
        let request = Self::request_of(queue, txn.id())?;
        request.mode = LockMode::Exclusive;
        request.granted = false;
        queue.upgrading = true;
        let condvar = queue.condvar.clone();

        log::trace!("txn {} upgrading lock on {}", txn.id(), rid);
        loop {
            let queue = Self::queue_of(&mut table, &rid)?;
            if (!queue.writer_present && queue.reader_count == 0) || txn.is_aborted() {
                break;
            }
            condvar.wait(&mut table);
        }

        if txn.is_aborted() {
            let queue = Self::queue_of(&mut table, &rid)?;
            queue.upgrading = false;
            Self::abandon_request(&mut table, txn.id(), &rid);
            return Err(TransactionError::Abort {
                txn_id: txn.id(),
                reason: AbortReason::Deadlock,
            });
        }

        let queue = Self::queue_of(&mut table, &rid)?;
        queue.upgrading = false;
        queue.writer_present = true;
        Self::request_of(queue, txn.id())?.granted = true;
        txn.add_exclusive_lock(rid);
        log::trace!("txn {} upgraded lock on {}", txn.id(), rid);
        Ok(true)
    }

    /// Release a held lock and wake whoever the grant change unblocks.
    /// The first unlock moves a growing transaction into its shrinking
    /// phase (except short read-committed read locks).
    pub fn unlock(&self, txn: &Arc<Transaction>, rid: Rid) -> Result<bool, TransactionError> {
        let mut table = self.latch.lock();

        let queue = match table.queues.get_mut(&rid) {
            Some(queue) => queue,
            None => return Ok(false),
        };
        let position = match queue
            .requests
            .iter()
            .position(|request| request.txn.id() == txn.id())
        {
            Some(position) => position,
            None => return Ok(false),
        };

        let request = queue
            .requests
            .remove(position)
            .ok_or_else(|| TransactionError::Internal("request vanished".to_string()))?;

        txn.remove_shared_lock(&rid);
        txn.remove_exclusive_lock(&rid);
        txn.record_unlock(request.mode);

        match request.mode {
            LockMode::Shared => {
                queue.reader_count = queue.reader_count.saturating_sub(1);
                if queue.reader_count == 0 {
                    queue.condvar.notify_all();
                }
            }
            LockMode::Exclusive => {
                queue.writer_present = false;
                queue.condvar.notify_all();
            }
        }

        log::trace!("txn {} released lock on {}", txn.id(), rid);
        Ok(true)
    }

    // Deadlock detection

    /// One detector tick: rebuild the wait-for graph from the queues,
    /// abort the victim of every cycle, and wake its waiter. The graph
    /// is rebuilt from scratch on each pass.
    fn run_detection_pass(table: &mut LockTable) {
        let (mut graph, wait_rids, txns) = Self::build_wait_graph(table);

        while let Some(victim) = Self::find_cycle_victim(&graph) {
            log::warn!("deadlock detected, aborting txn {}", victim);

            if let Some(txn) = txns.get(&victim) {
                txn.set_state(TransactionState::Aborted);
            }

            graph.remove(&victim);
            for neighbors in graph.values_mut() {
                neighbors.retain(|&t| t != victim);
            }

            if let Some(rid) = wait_rids.get(&victim) {
                if let Some(queue) = table.queues.get(rid) {
                    queue.condvar.notify_all();
                }
            }
        }
    }

    /// Edges run from every waiting request to every granted request
    /// ahead of it in the same queue.
    #[allow(clippy::type_complexity)]
    fn build_wait_graph(
        table: &LockTable,
    ) -> (
        BTreeMap<TxnId, Vec<TxnId>>,
        HashMap<TxnId, Rid>,
        HashMap<TxnId, Arc<Transaction>>,
    ) {
        let mut graph: BTreeMap<TxnId, Vec<TxnId>> = BTreeMap::new();
        let mut wait_rids = HashMap::new();
        let mut txns = HashMap::new();

        for (rid, queue) in &table.queues {
            let mut grants = Vec::new();
            let mut requests = queue.requests.iter();

            for request in requests.by_ref() {
                txns.insert(request.txn.id(), Arc::clone(&request.txn));
                if !request.granted {
                    // First waiter: edges from it and everything behind.
                    let waiter = request.txn.id();
                    for &grantee in &grants {
                        graph.entry(waiter).or_default().push(grantee);
                    }
                    wait_rids.insert(waiter, *rid);
                    break;
                }
                grants.push(request.txn.id());
            }

            for request in requests {
                txns.insert(request.txn.id(), Arc::clone(&request.txn));
                let waiter = request.txn.id();
                for &grantee in &grants {
                    graph.entry(waiter).or_default().push(grantee);
                }
                wait_rids.insert(waiter, *rid);
            }
        }

        for neighbors in graph.values_mut() {
            neighbors.sort_unstable();
            neighbors.dedup();
        }

        (graph, wait_rids, txns)
    }

    /// DFS from every vertex in ascending id order, neighbors likewise.
    /// On the first cycle the victim is the largest id on the stack,
    /// which makes the choice deterministic.
    fn find_cycle_victim(graph: &BTreeMap<TxnId, Vec<TxnId>>) -> Option<TxnId> {
        fn dfs(
            node: TxnId,
            graph: &BTreeMap<TxnId, Vec<TxnId>>,
            on_stack: &mut BTreeSet<TxnId>,
            found: &mut bool,
        ) {
            on_stack.insert(node);
            if let Some(neighbors) = graph.get(&node) {
                for &next in neighbors {
                    if *found {
                        return;
                    }
                    if on_stack.contains(&next) {
                        *found = true;
                        return;
                    }
                    dfs(next, graph, on_stack, found);
                }
            }
            if !*found {
                on_stack.remove(&node);
            }
        }

        for &start in graph.keys() {
            let mut on_stack = BTreeSet::new();
            let mut found = false;
            dfs(start, graph, &mut on_stack, &mut found);
            if found {
                return on_stack.iter().next_back().copied();
            }
        }
        None
    }

    // Small helpers under the table latch

    fn check_not_shrinking(txn: &Arc<Transaction>) -> Result<(), TransactionError> {
        if txn.state() == TransactionState::Shrinking {
            txn.set_state(TransactionState::Aborted);
            return Err(TransactionError::Abort {
                txn_id: txn.id(),
                reason: AbortReason::LockOnShrinking,
            });
        }
        Ok(())
    }

    fn queue_of<'a>(
        table: &'a mut parking_lot::MutexGuard<'_, LockTable>,
        rid: &Rid,
    ) -> Result<&'a mut LockRequestQueue, TransactionError> {
        table
            .queues
            .get_mut(rid)
            .ok_or_else(|| TransactionError::Internal(format!("no lock queue for {}", rid)))
    }

    fn request_of<'a>(
        queue: &'a mut LockRequestQueue,
        txn_id: TxnId,
    ) -> Result<&'a mut LockRequest, TransactionError> {
        queue
            .requests
            .iter_mut()
            .find(|request| request.txn.id() == txn_id)
            .ok_or_else(|| {
                TransactionError::Internal(format!("no lock request for txn {}", txn_id))
            })
    }

    /// Drop an ungranted request after its transaction was aborted
    /// mid-wait.
    fn abandon_request(
        table: &mut parking_lot::MutexGuard<'_, LockTable>,
        txn_id: TxnId,
        rid: &Rid,
    ) {
        if let Some(queue) = table.queues.get_mut(rid) {
            if let Some(position) = queue
                .requests
                .iter()
                .position(|request| request.txn.id() == txn_id)
            {
                queue.requests.remove(position);
            }
            queue.condvar.notify_all();
        }
    }
}

impl Drop for LockManager {
    fn drop(&mut self) {
        self.detector_running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.detector.lock().take() {
            let _ = handle.join();
        }
    }
}
