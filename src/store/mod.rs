//! Task storage and the FIFO admission queue.
//!
//! [`TaskStore`] owns every [`TaskRecord`] plus the queue of identities
//! waiting for dispatch. All state lives behind one [`parking_lot::Mutex`]
//! and every status change writes status, result, timestamps and progress
//! inside the same critical section, so a reader that sees a terminal
//! status always sees the matching result.
//!
//! # Admission
//!
//! [`insert`](TaskStore::insert) rejects a submission with
//! [`TaskError::CapacityExceeded`] once the number of non-terminal records
//! reaches `max_tracked`. Terminal records awaiting eviction do not count.
//!
//! # Pending queue reconciliation
//!
//! Cancelling a pending task finishes its record immediately but leaves its
//! identity in the pending queue. [`claim_next`](TaskStore::claim_next) is
//! the single place that reconciles the two: it discards every queued
//! identity whose record is gone or no longer `Pending`.
//!
//! # Examples
//!
//! ```
//! use toolqueue::store::TaskStore;
//! use toolqueue::{TaskRecord, TaskStatus};
//! use std::time::Duration;
//!
//! let store = TaskStore::new(10);
//! let record = TaskRecord::new("echo", serde_json::Map::new(), Duration::from_secs(1));
//! let id = store.insert(record).unwrap();
//!
//! let claimed = store.claim_next().unwrap();
//! assert_eq!(claimed.record.task_id, id);
//! assert_eq!(store.find(id).unwrap().status, TaskStatus::Running);
//! ```

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use crate::domain::{millis, TaskId, TaskRecord};
use crate::error::TaskError;
use crate::types::result::{QueueStats, ToolResult};
use crate::types::task::TaskStatus;

/// Outcome of a successful cancel request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The task was pending and is now `Cancelled`.
    Cancelled,
    /// The task is running; it is recorded as `Cancelled` once its tool call
    /// returns, unless it times out first.
    Requested,
}

/// A task handed to a worker by [`TaskStore::claim_next`].
#[derive(Debug, Clone)]
pub struct ClaimedTask {
    /// Snapshot taken right after the `Running` transition.
    pub record: TaskRecord,
    /// Token cancelled on cancel, timeout or shutdown.
    pub token: CancellationToken,
}

#[derive(Debug)]
struct Entry {
    seq: u64,
    record: TaskRecord,
    token: CancellationToken,
}

impl Entry {
    fn signal_cancel(&mut self) {
        self.record.cancellation_requested = true;
        self.token.cancel();
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    entries: HashMap<TaskId, Entry>,
    pending: VecDeque<TaskId>,
    next_seq: u64,
}

impl StoreInner {
    fn active_count(&self) -> usize {
        self.entries
            .values()
            .filter(|e| !e.record.is_terminal())
            .count()
    }

    fn entry_mut(&mut self, task_id: TaskId) -> Result<&mut Entry, TaskError> {
        self.entries
            .get_mut(&task_id)
            .ok_or(TaskError::NotFound { task_id })
    }

    fn remove_terminal(&mut self, task_id: TaskId) -> Result<TaskRecord, TaskError> {
        let status = self.entry_mut(task_id)?.record.status;
        if !status.is_terminal() {
            return Err(TaskError::NotReady { task_id, status });
        }
        self.entries
            .remove(&task_id)
            .map(|e| e.record)
            .ok_or(TaskError::NotFound { task_id })
    }

    /// Drops queued identities whose record is gone or no longer `Pending`.
    fn prune_pending(&mut self) -> usize {
        let Self {
            entries, pending, ..
        } = self;
        let before = pending.len();
        pending.retain(|id| {
            entries
                .get(id)
                .is_some_and(|e| e.record.status == TaskStatus::Pending)
        });
        before - pending.len()
    }
}

/// Mutex-guarded map of task records with a FIFO pending queue.
#[derive(Debug)]
pub struct TaskStore {
    inner: Mutex<StoreInner>,
    max_tracked: usize,
    terminal: Notify,
}

impl TaskStore {
    /// Creates an empty store admitting at most `max_tracked` non-terminal
    /// records.
    pub fn new(max_tracked: usize) -> Self {
        Self {
            inner: Mutex::new(StoreInner::default()),
            max_tracked,
            terminal: Notify::new(),
        }
    }

    /// The admission ceiling.
    pub fn max_tracked(&self) -> usize {
        self.max_tracked
    }

    /// Adds a `Pending` record and appends its identity to the pending queue.
    ///
    /// # Errors
    ///
    /// - [`TaskError::CapacityExceeded`] if `max_tracked` non-terminal
    ///   records already exist.
    /// - [`TaskError::InvalidTransition`] if the record is not `Pending`.
    pub fn insert(&self, record: TaskRecord) -> Result<TaskId, TaskError> {
        if record.status != TaskStatus::Pending {
            return Err(TaskError::InvalidTransition {
                task_id: record.task_id,
                from: record.status,
                to: TaskStatus::Pending,
            });
        }

        let mut inner = self.inner.lock();
        if inner.active_count() >= self.max_tracked {
            return Err(TaskError::CapacityExceeded {
                max_tracked: self.max_tracked,
            });
        }

        let task_id = record.task_id;
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            task_id,
            Entry {
                seq,
                record,
                token: CancellationToken::new(),
            },
        );
        inner.pending.push_back(task_id);
        Ok(task_id)
    }

    /// Returns a snapshot of the record, if it is still tracked.
    pub fn find(&self, task_id: TaskId) -> Option<TaskRecord> {
        self.inner
            .lock()
            .entries
            .get(&task_id)
            .map(|e| e.record.clone())
    }

    /// Returns snapshots of all records, newest submitted first.
    ///
    /// Terminal records are skipped unless `include_terminal` is set.
    pub fn list_all(&self, include_terminal: bool) -> Vec<TaskRecord> {
        let inner = self.inner.lock();
        let mut entries: Vec<&Entry> = inner
            .entries
            .values()
            .filter(|e| include_terminal || !e.record.is_terminal())
            .collect();
        entries.sort_by(|a, b| b.seq.cmp(&a.seq));
        entries.into_iter().map(|e| e.record.clone()).collect()
    }

    /// Removes a terminal record.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] for an unknown identity.
    /// - [`TaskError::NotReady`] if the task is still pending or running;
    ///   its worker owns the final write.
    pub fn remove(&self, task_id: TaskId) -> Result<TaskRecord, TaskError> {
        self.inner.lock().remove_terminal(task_id)
    }

    /// Dequeues the next genuinely pending task and moves it to `Running`.
    ///
    /// Identities whose record was evicted or is no longer `Pending` are
    /// discarded on the way. Returns `None` once the queue is drained.
    pub fn claim_next(&self) -> Option<ClaimedTask> {
        let mut inner = self.inner.lock();
        while let Some(task_id) = inner.pending.pop_front() {
            let Some(entry) = inner.entries.get_mut(&task_id) else {
                continue;
            };
            if entry.record.status != TaskStatus::Pending {
                tracing::debug!(task_id = %task_id, status = %entry.record.status, "discarding stale pending entry");
                continue;
            }
            if entry.record.start(Utc::now()).is_err() {
                continue;
            }
            return Some(ClaimedTask {
                record: entry.record.clone(),
                token: entry.token.clone(),
            });
        }
        None
    }

    /// Writes a terminal status and result for a task.
    ///
    /// Fails with [`TaskError::InvalidTransition`] if the task is already
    /// terminal, which is how a late worker result loses to an earlier
    /// timeout or cancellation.
    pub fn finish(
        &self,
        task_id: TaskId,
        status: TaskStatus,
        result: ToolResult,
    ) -> Result<TaskRecord, TaskError> {
        let snapshot = {
            let mut inner = self.inner.lock();
            let entry = inner.entry_mut(task_id)?;
            entry.record.finish(status, result, Utc::now())?;
            entry.record.clone()
        };
        self.terminal.notify_waiters();
        Ok(snapshot)
    }

    /// Signals cancellation to a task.
    ///
    /// A pending task is finished as `Cancelled` on the spot. A running task
    /// only has its flag set and token cancelled; the worker decides the
    /// final status when the tool call returns.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] for an unknown identity.
    /// - [`TaskError::AlreadyTerminal`] if the task already finished.
    pub fn request_cancel(&self, task_id: TaskId) -> Result<CancelOutcome, TaskError> {
        let outcome = {
            let mut inner = self.inner.lock();
            let entry = inner.entry_mut(task_id)?;
            match entry.record.status {
                status if status.is_terminal() => {
                    return Err(TaskError::AlreadyTerminal { task_id, status });
                },
                TaskStatus::Pending => {
                    entry.signal_cancel();
                    entry.record.finish(
                        TaskStatus::Cancelled,
                        ToolResult::cancelled(),
                        Utc::now(),
                    )?;
                    CancelOutcome::Cancelled
                },
                _ => {
                    entry.signal_cancel();
                    CancelOutcome::Requested
                },
            }
        };
        if outcome == CancelOutcome::Cancelled {
            self.terminal.notify_waiters();
        }
        Ok(outcome)
    }

    /// Sets the cancellation flag on every non-terminal record.
    ///
    /// Returns how many records were signalled.
    pub fn request_cancel_all(&self) -> usize {
        let mut inner = self.inner.lock();
        let mut signalled = 0;
        for entry in inner.entries.values_mut() {
            if !entry.record.is_terminal() && !entry.record.cancellation_requested {
                entry.signal_cancel();
                signalled += 1;
            }
        }
        signalled
    }

    /// Returns `true` if cancellation was requested for the task.
    ///
    /// Unknown identities report `false`.
    pub fn is_cancel_requested(&self, task_id: TaskId) -> bool {
        self.inner
            .lock()
            .entries
            .get(&task_id)
            .is_some_and(|e| e.record.cancellation_requested)
    }

    /// Records progress for a running task, clamped to 100.
    ///
    /// Returns `false` if the task is unknown or not running.
    pub fn set_progress(&self, task_id: TaskId, percent: u8) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.get_mut(&task_id) {
            Some(entry) if entry.record.status == TaskStatus::Running => {
                entry.record.progress = Some(percent.min(100));
                true
            },
            _ => false,
        }
    }

    /// Moves every running task that exceeded its timeout to `TimedOut`.
    ///
    /// Each timed-out task also gets its cancellation flag set so a
    /// cooperative tool can stop early. Returns the affected identities.
    pub fn sweep_timeouts(&self, now: DateTime<Utc>) -> Vec<TaskId> {
        let timed_out: Vec<TaskId> = {
            let mut inner = self.inner.lock();
            let mut timed_out = Vec::new();
            for entry in inner.entries.values_mut() {
                if !entry.record.is_overdue(now) {
                    continue;
                }
                let timeout_ms = millis(entry.record.timeout);
                entry.signal_cancel();
                if entry
                    .record
                    .finish(TaskStatus::TimedOut, ToolResult::timed_out(timeout_ms), now)
                    .is_ok()
                {
                    timed_out.push(entry.record.task_id);
                }
            }
            timed_out
        };
        if !timed_out.is_empty() {
            self.terminal.notify_waiters();
        }
        timed_out
    }

    /// Evicts terminal records whose retention window has elapsed, then
    /// prunes stale identities from the pending queue.
    ///
    /// Returns the number of records removed.
    pub fn sweep_expired(&self, now: DateTime<Utc>, retention: Duration) -> usize {
        let mut inner = self.inner.lock();
        let expired: Vec<TaskId> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.record.is_expired(now, retention))
            .map(|(id, _)| *id)
            .collect();
        let evicted = expired
            .into_iter()
            .filter(|id| inner.remove_terminal(*id).is_ok())
            .count();
        let pruned = inner.prune_pending();
        if pruned > 0 {
            tracing::debug!(pruned, "pruned stale pending entries");
        }
        evicted
    }

    /// Counts pending, running and retained terminal records.
    pub fn stats(&self) -> QueueStats {
        let inner = self.inner.lock();
        let mut stats = QueueStats::default();
        for entry in inner.entries.values() {
            match entry.record.status {
                TaskStatus::Pending => stats.pending += 1,
                TaskStatus::Running => stats.running += 1,
                _ => stats.completed += 1,
            }
        }
        stats
    }

    /// Number of non-terminal records.
    pub fn active_count(&self) -> usize {
        self.inner.lock().active_count()
    }

    /// Number of identities waiting in the pending queue, including stale
    /// ones not yet discarded.
    pub fn queued_len(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Returns `true` if the pending queue holds any identity.
    pub fn has_queued(&self) -> bool {
        !self.inner.lock().pending.is_empty()
    }

    /// Waits until the task reaches a terminal state and returns its
    /// snapshot.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] if the task is unknown or evicted while
    ///   waiting.
    /// - [`TaskError::WaitTimeout`] if `timeout` elapses first.
    pub async fn wait_for_terminal(
        &self,
        task_id: TaskId,
        timeout: Duration,
    ) -> Result<TaskRecord, TaskError> {
        // No deadline when the timeout overflows the clock.
        let deadline = tokio::time::Instant::now().checked_add(timeout);

        loop {
            // Register before checking so a notification between the check
            // and the await is not lost.
            let notified = self.terminal.notified();

            let record = self.find(task_id).ok_or(TaskError::NotFound { task_id })?;
            if record.is_terminal() {
                return Ok(record);
            }

            let Some(deadline) = deadline else {
                notified.await;
                continue;
            };
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return match self.find(task_id) {
                    Some(record) if record.is_terminal() => Ok(record),
                    Some(_) => Err(TaskError::WaitTimeout { task_id, timeout }),
                    None => Err(TaskError::NotFound { task_id }),
                };
            }
        }
    }
}
