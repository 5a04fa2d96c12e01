//! The coordinating loop and per-task workers.
//!
//! One loop owns admission: it wakes on a submission, on a worker finishing
//! or on a tick of at most `tick_interval_ms`, claims pending tasks in FIFO
//! order while fewer than `max_concurrent_tasks` are running, and spawns a
//! worker for each. The loop never waits on a worker.
//!
//! Each worker checks the task's cancellation flag right before and right
//! after the tool call. Nothing in between is interrupted: a cancelled or
//! timed-out task keeps running until its tool returns, and its running slot
//! is released only then.
//!
//! When `cleanup_interval_secs` has elapsed since the last sweep, a wake also
//! runs the timeout sweep followed by the retention sweep.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::config::QueueConfig;
use crate::domain::millis;
use crate::store::{ClaimedTask, TaskStore};
use crate::tool::{ProgressFn, ToolContext, ToolRegistry};
use crate::types::result::ToolResult;
use crate::types::task::TaskStatus;

/// Number of tasks currently dispatched to workers.
///
/// Incremented by the loop on dispatch, decremented by the worker when its
/// tool call returns.
#[derive(Debug, Clone, Default)]
pub struct RunningCounter(Arc<AtomicUsize>);

impl RunningCounter {
    /// Creates a counter initialized to zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Increments the running count by one.
    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    /// Decrements the running count by one.
    pub fn decrement(&self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }

    /// Returns the current running count.
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

/// State shared by the façade, the loop and every worker.
#[derive(Debug)]
pub struct Scheduler {
    pub(crate) store: TaskStore,
    pub(crate) registry: Arc<ToolRegistry>,
    pub(crate) config: QueueConfig,
    running: RunningCounter,
    wake: Notify,
    workers: TaskTracker,
}

impl Scheduler {
    /// Creates scheduler state for a queue.
    pub fn new(registry: Arc<ToolRegistry>, config: QueueConfig) -> Self {
        Self {
            store: TaskStore::new(config.max_tracked_tasks),
            registry,
            config,
            running: RunningCounter::new(),
            wake: Notify::new(),
            workers: TaskTracker::new(),
        }
    }

    /// The record store.
    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    /// Tasks currently dispatched to workers.
    pub fn running(&self) -> usize {
        self.running.get()
    }

    /// Number of spawned workers that have not exited yet.
    pub fn live_workers(&self) -> usize {
        self.workers.len()
    }

    /// Asks the loop to re-check admission.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Runs the loop until `shutdown` is cancelled.
    ///
    /// On exit every non-terminal task has its cancellation flag set.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        let tick = self.config.tick_interval();
        let cleanup_interval = self.config.cleanup_interval();
        let mut last_sweep = Instant::now();

        tracing::info!(
            max_concurrent = self.config.max_concurrent_tasks,
            max_tracked = self.config.max_tracked_tasks,
            "scheduler started"
        );

        loop {
            self.admit();

            if last_sweep.elapsed() >= cleanup_interval {
                self.sweep();
                last_sweep = Instant::now();
            }

            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = self.wake.notified() => {},
                _ = tokio::time::sleep(tick) => {},
            }
        }

        let signalled = self.store.request_cancel_all();
        tracing::info!(
            signalled,
            running = self.running.get(),
            "scheduler stopped"
        );
    }

    /// Dispatches pending tasks while below the concurrency limit.
    ///
    /// Returns how many tasks were dispatched.
    pub(crate) fn admit(self: &Arc<Self>) -> usize {
        let mut dispatched = 0;
        while self.running.get() < self.config.max_concurrent_tasks {
            let Some(claimed) = self.store.claim_next() else {
                break;
            };
            self.running.increment();
            tracing::debug!(
                task_id = %claimed.record.task_id,
                running = self.running.get(),
                "task admitted"
            );
            self.workers.spawn(run_worker(Arc::clone(self), claimed));
            dispatched += 1;
        }
        dispatched
    }

    /// Runs the timeout sweep, then the retention sweep.
    pub(crate) fn sweep(&self) {
        let now = Utc::now();
        let timed_out = self.store.sweep_timeouts(now);
        for task_id in &timed_out {
            tracing::warn!(task_id = %task_id, "task timed out");
        }
        let evicted = self
            .store
            .sweep_expired(now, self.config.result_retention());
        tracing::debug!(timed_out = timed_out.len(), evicted, "sweep complete");
    }

    /// Stops accepting new workers and waits for the spawned ones to exit.
    pub(crate) async fn drain_workers(&self) {
        self.workers.close();
        self.workers.wait().await;
        self.workers.reopen();
    }
}

/// Releases a running slot and wakes the loop when dropped.
struct RunningSlot<'a> {
    scheduler: &'a Scheduler,
}

impl Drop for RunningSlot<'_> {
    fn drop(&mut self) {
        self.scheduler.running.decrement();
        self.scheduler.wake();
    }
}

async fn run_worker(scheduler: Arc<Scheduler>, claimed: ClaimedTask) {
    let _slot = RunningSlot {
        scheduler: &scheduler,
    };
    let ClaimedTask { record, token } = claimed;
    let task_id = record.task_id;
    let tool_name = record.tool_name;

    let (status, result) = if scheduler.store.is_cancel_requested(task_id) {
        (TaskStatus::Cancelled, ToolResult::cancelled())
    } else {
        tracing::info!(task_id = %task_id, tool = %tool_name, "task started");

        let weak: Weak<Scheduler> = Arc::downgrade(&scheduler);
        let progress: ProgressFn = Arc::new(move |percent| {
            if let Some(scheduler) = weak.upgrade() {
                scheduler.store.set_progress(task_id, percent);
            }
        });
        let ctx = ToolContext::new(task_id, token, Some(progress));

        let call = scheduler
            .registry
            .execute_with_context(&tool_name, record.params, ctx);
        let result = match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => ToolResult::failure(e.to_string()),
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                tracing::warn!(task_id = %task_id, tool = %tool_name, panic = %message, "tool panicked");
                ToolResult::failure(format!("tool '{tool_name}' panicked: {message}"))
            },
        };

        if scheduler.store.is_cancel_requested(task_id) {
            (TaskStatus::Cancelled, ToolResult::cancelled())
        } else if result.success {
            (TaskStatus::Completed, result)
        } else {
            (TaskStatus::Failed, result)
        }
    };

    match scheduler.store.finish(task_id, status, result) {
        Ok(record) => match record.status {
            TaskStatus::Failed => tracing::warn!(
                task_id = %task_id,
                tool = %tool_name,
                error = record.result.as_ref().map(|r| r.message.as_str()).unwrap_or_default(),
                "task failed"
            ),
            status => tracing::info!(
                task_id = %task_id,
                tool = %tool_name,
                status = %status,
                duration_ms = record.duration().map(millis).unwrap_or_default(),
                "task finished"
            ),
        },
        Err(e) => {
            // Timed out (or evicted) while the tool was still running.
            tracing::debug!(task_id = %task_id, error = %e, "discarding late result");
        },
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
