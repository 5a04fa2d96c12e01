//! The public task queue façade.
//!
//! [`TaskQueue`] ties the [`TaskStore`](crate::store::TaskStore), the
//! [`Scheduler`] loop and the [`ToolRegistry`] together. Every method except
//! [`stop`](TaskQueue::stop), [`drain`](TaskQueue::drain) and
//! [`wait_for_terminal`](TaskQueue::wait_for_terminal) is synchronous and
//! only takes the store lock, so it can be called from any thread without
//! blocking on running work.
//!
//! The queue is constructed explicitly and shared through an [`Arc`]; there
//! is no global instance.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::QueueConfig;
use crate::domain::{millis, TaskId, TaskRecord};
use crate::error::TaskError;
use crate::scheduler::Scheduler;
use crate::tool::{MainThreadExecutor, ToolRegistry};
use crate::types::result::{QueueStats, ToolParams, ToolResult};

pub use crate::store::CancelOutcome;

#[derive(Debug)]
struct LoopHandle {
    shutdown: CancellationToken,
    join: JoinHandle<()>,
}

/// Submit named tool invocations and poll for their outcome.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use toolqueue::{QueueConfig, TaskError, TaskQueue, ToolRegistry};
///
/// let queue = TaskQueue::new(Arc::new(ToolRegistry::new()), QueueConfig::default());
///
/// // Unknown tools are rejected before any record is created.
/// let err = queue.submit("unknown_tool", serde_json::Map::new(), None).unwrap_err();
/// assert!(matches!(err, TaskError::ToolNotFound { .. }));
/// assert_eq!(queue.stats().total(), 0);
/// ```
#[derive(Debug)]
pub struct TaskQueue {
    scheduler: Arc<Scheduler>,
    lifecycle: Mutex<Option<LoopHandle>>,
}

impl TaskQueue {
    /// Creates a stopped queue.
    ///
    /// Submissions are accepted before [`start`](Self::start); they wait in
    /// the pending queue until the loop runs.
    pub fn new(registry: Arc<ToolRegistry>, config: QueueConfig) -> Self {
        Self {
            scheduler: Arc::new(Scheduler::new(registry, config)),
            lifecycle: Mutex::new(None),
        }
    }

    /// The configuration the queue was built with.
    pub fn config(&self) -> &QueueConfig {
        &self.scheduler.config
    }

    /// The registry tools are looked up in.
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.scheduler.registry
    }

    /// Returns `true` while the scheduler loop is running.
    pub fn is_running(&self) -> bool {
        self.lifecycle.lock().is_some()
    }

    /// Starts the scheduler loop on the current Tokio runtime.
    ///
    /// A no-op if the loop is already running.
    ///
    /// # Errors
    ///
    /// [`TaskError::ExecutorUnavailable`] when called outside a Tokio
    /// runtime.
    pub fn start(&self) -> Result<(), TaskError> {
        let mut lifecycle = self.lifecycle.lock();
        if lifecycle.is_some() {
            return Ok(());
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| TaskError::ExecutorUnavailable(format!("no Tokio runtime: {e}")))?;
        let shutdown = CancellationToken::new();
        let join = runtime.spawn(Arc::clone(&self.scheduler).run(shutdown.clone()));
        *lifecycle = Some(LoopHandle { shutdown, join });
        Ok(())
    }

    /// Stops the scheduler loop and waits for it to exit.
    ///
    /// Every non-terminal task has its cancellation flag set. Tools already
    /// running are not waited for; use [`drain`](Self::drain) for that.
    /// A no-op if the loop is not running.
    pub async fn stop(&self) {
        let handle = self.lifecycle.lock().take();
        let Some(handle) = handle else {
            return;
        };
        handle.shutdown.cancel();
        if let Err(e) = handle.join.await {
            tracing::error!(error = %e, "scheduler loop ended abnormally");
        }
    }

    /// Waits up to `timeout` for every dispatched worker to exit.
    ///
    /// Returns `true` if all workers finished in time.
    pub async fn drain(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, self.scheduler.drain_workers())
            .await
            .is_ok()
    }

    /// Starts a [`MainThreadExecutor`] using `main_thread_timeout_ms` and
    /// installs it in the registry.
    pub fn enable_main_thread_executor(&self) -> Result<Arc<MainThreadExecutor>, TaskError> {
        let executor = Arc::new(MainThreadExecutor::start(self.config().main_thread_timeout())?);
        if let Some(previous) = self
            .registry()
            .set_main_thread_executor(Arc::clone(&executor))
        {
            previous.shutdown();
        }
        Ok(executor)
    }

    /// Submits a tool invocation and returns its identity immediately.
    ///
    /// `timeout` falls back to `default_timeout_ms` when `None` or zero.
    ///
    /// # Errors
    ///
    /// - [`TaskError::ToolNotFound`] if the registry has no such tool.
    /// - [`TaskError::CapacityExceeded`] if `max_tracked_tasks` non-terminal
    ///   tasks already exist.
    ///
    /// No record is created on error.
    pub fn submit(
        &self,
        tool_name: &str,
        params: ToolParams,
        timeout: Option<Duration>,
    ) -> Result<TaskId, TaskError> {
        if !self.registry().has_tool(tool_name) {
            tracing::debug!(tool = %tool_name, "rejecting submission for unknown tool");
            return Err(TaskError::ToolNotFound {
                tool_name: tool_name.to_string(),
            });
        }

        let timeout = timeout
            .filter(|t| !t.is_zero())
            .unwrap_or_else(|| self.config().default_timeout());
        let task_id = self
            .scheduler
            .store
            .insert(TaskRecord::new(tool_name, params, timeout))?;

        tracing::info!(
            task_id = %task_id,
            tool = %tool_name,
            timeout_ms = millis(timeout),
            "task submitted"
        );
        self.scheduler.wake();
        Ok(task_id)
    }

    /// Point-in-time snapshot of a task.
    pub fn get_status(&self, task_id: TaskId) -> Result<TaskRecord, TaskError> {
        self.scheduler
            .store
            .find(task_id)
            .ok_or(TaskError::NotFound { task_id })
    }

    /// The result of a terminal task.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] for an unknown or evicted task.
    /// - [`TaskError::NotReady`] while the task is pending or running.
    pub fn get_result(&self, task_id: TaskId) -> Result<ToolResult, TaskError> {
        let record = self.get_status(task_id)?;
        match record.result {
            Some(result) if record.status.is_terminal() => Ok(result),
            _ => Err(TaskError::NotReady {
                task_id,
                status: record.status,
            }),
        }
    }

    /// Cancels a pending task or signals a running one.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] for an unknown task.
    /// - [`TaskError::AlreadyTerminal`] if the task already finished.
    pub fn cancel(&self, task_id: TaskId) -> Result<CancelOutcome, TaskError> {
        let outcome = self.scheduler.store.request_cancel(task_id)?;
        tracing::info!(task_id = %task_id, outcome = ?outcome, "task cancel requested");
        Ok(outcome)
    }

    /// Snapshots of tracked tasks, newest submitted first.
    pub fn list_tasks(&self, include_terminal: bool, limit: Option<usize>) -> Vec<TaskRecord> {
        let mut tasks = self.scheduler.store.list_all(include_terminal);
        if let Some(limit) = limit {
            tasks.truncate(limit);
        }
        tasks
    }

    /// Pending, running and retained-terminal counts.
    pub fn stats(&self) -> QueueStats {
        self.scheduler.store.stats()
    }

    /// Waits for a task to reach a terminal state.
    ///
    /// # Errors
    ///
    /// - [`TaskError::NotFound`] for an unknown task.
    /// - [`TaskError::WaitTimeout`] if `timeout` elapses first.
    pub async fn wait_for_terminal(
        &self,
        task_id: TaskId,
        timeout: Duration,
    ) -> Result<TaskRecord, TaskError> {
        self.scheduler
            .store
            .wait_for_terminal(task_id, timeout)
            .await
    }

    /// Registers the `task_*` router methods as tools in this queue's
    /// registry.
    pub fn register_task_tools(self: &Arc<Self>) {
        crate::router::register_task_tools(self);
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        if let Some(handle) = self.lifecycle.get_mut().take() {
            handle.shutdown.cancel();
        }
    }
}
