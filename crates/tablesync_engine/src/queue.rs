//! Pending operation queues.
//!
//! One FIFO per target store. Operations wait here until they are applied
//! or discarded; failed attempts are re-armed with exponential backoff.
//! A queue's lock is never held while a store is being written.

use crate::applier::apply;
use crate::clock::Clock;
use crate::config::RetryConfig;
use crate::log_sink::LogSink;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use tablesync_protocol::{LogStatus, StoreId, SyncOperation};
use tablesync_store::SqlStore;
use tracing::{debug, error, warn};

/// Counts from one replay of one queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayStats {
    /// Operations applied successfully.
    pub applied: usize,
    /// Operations that failed and were re-armed for a later attempt.
    pub retried: usize,
    /// Operations discarded after their final attempt.
    pub failed: usize,
    /// Operations left untouched because their retry time had not come.
    pub deferred: usize,
}

impl ReplayStats {
    /// Adds another replay's counts to this one.
    pub fn merge(&mut self, other: ReplayStats) {
        self.applied += other.applied;
        self.retried += other.retried;
        self.failed += other.failed;
        self.deferred += other.deferred;
    }
}

/// The pending queues of both stores.
#[derive(Debug, Default)]
pub struct PendingQueues {
    to_a: Mutex<VecDeque<SyncOperation>>,
    to_b: Mutex<VecDeque<SyncOperation>>,
}

impl PendingQueues {
    /// Creates empty queues.
    pub fn new() -> Self {
        Self::default()
    }

    fn queue(&self, target: StoreId) -> &Mutex<VecDeque<SyncOperation>> {
        match target {
            StoreId::A => &self.to_a,
            StoreId::B => &self.to_b,
        }
    }

    /// Queues an operation on its target's queue.
    ///
    /// A pending operation for the same row, table and direction is
    /// replaced in place by the new one, which starts with a fresh attempt
    /// count. Returns true if an operation was replaced.
    pub fn enqueue(&self, operation: SyncOperation) -> bool {
        let mut queue = self.queue(operation.target).lock();
        match queue.iter_mut().find(|pending| operation.supersedes(pending)) {
            Some(pending) => {
                debug!(
                    table = operation.table(),
                    key = %operation.primary_key,
                    target = %operation.target,
                    replaced = %pending.id,
                    "pending operation superseded"
                );
                *pending = operation;
                true
            }
            None => {
                queue.push_back(operation);
                false
            }
        }
    }

    /// Puts an operation back at the tail, unless a fresher operation for
    /// the same row was queued meanwhile.
    fn requeue(&self, operation: SyncOperation) {
        let mut queue = self.queue(operation.target).lock();
        if queue.iter().any(|pending| pending.supersedes(&operation)) {
            debug!(op_id = %operation.id, "dropping retry superseded while in flight");
            return;
        }
        queue.push_back(operation);
    }

    /// Number of operations waiting for `target`.
    pub fn pending_count(&self, target: StoreId) -> usize {
        self.queue(target).lock().len()
    }

    /// Number of operations waiting for either store.
    pub fn total_pending(&self) -> usize {
        StoreId::ALL.iter().map(|t| self.pending_count(*t)).sum()
    }

    /// Copies the operations waiting for `target`, in queue order.
    pub fn snapshot(&self, target: StoreId) -> Vec<SyncOperation> {
        self.queue(target).lock().iter().cloned().collect()
    }

    /// Drops every pending operation.
    pub fn clear(&self) {
        for target in StoreId::ALL {
            self.queue(target).lock().clear();
        }
    }

    /// Attempts every operation currently waiting for `target`.
    ///
    /// Only the operations present when the replay starts are visited, each
    /// at most once. An operation whose retry time has not come is put back
    /// untouched. A failed attempt is re-armed while the error is retryable
    /// and attempts remain; otherwise the operation is discarded with a
    /// `FAILED` audit entry.
    pub fn replay(
        &self,
        target: StoreId,
        store: &dyn SqlStore,
        retry: &RetryConfig,
        clock: &dyn Clock,
        log: &dyn LogSink,
    ) -> ReplayStats {
        let mut stats = ReplayStats::default();
        let size = self.pending_count(target);
        let now = clock.now();

        for _ in 0..size {
            let Some(mut operation) = self.queue(target).lock().pop_front() else {
                break;
            };
            if !operation.is_eligible(now) {
                stats.deferred += 1;
                self.requeue(operation);
                continue;
            }

            let attempt = operation.record_attempt();
            match apply(store, &operation) {
                Ok(outcome) => {
                    debug!(
                        op_id = %operation.id,
                        table = operation.table(),
                        key = %operation.primary_key,
                        ?outcome,
                        attempt,
                        "operation applied"
                    );
                    log.record(
                        operation.source,
                        operation.target,
                        operation.table(),
                        operation.kind.into(),
                        LogStatus::Success,
                        &format!("Row synchronized for key {}", operation.primary_key),
                    );
                    stats.applied += 1;
                }
                Err(e) if e.is_retryable() && retry.allows_retry(attempt) => {
                    let delay = retry.delay_for_attempt(attempt);
                    let step = chrono::Duration::from_std(delay)
                        .unwrap_or_else(|_| chrono::Duration::zero());
                    operation.arm_retry(clock.now() + step);
                    warn!(
                        op_id = %operation.id,
                        kind = %operation.kind,
                        table = operation.table(),
                        target = %target,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "operation failed, retrying"
                    );
                    stats.retried += 1;
                    self.requeue(operation);
                }
                Err(e) => {
                    error!(
                        op_id = %operation.id,
                        kind = %operation.kind,
                        table = operation.table(),
                        target = %target,
                        attempt,
                        error = %e,
                        "operation failed permanently"
                    );
                    log.record(
                        operation.source,
                        operation.target,
                        operation.table(),
                        operation.kind.into(),
                        LogStatus::Failed,
                        &e.to_string(),
                    );
                    stats.failed += 1;
                }
            }
        }
        stats
    }
}
