//! Per-call context handed to a tool.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::domain::TaskId;

/// Callback receiving progress percentages (0-100).
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// What a tool can see about the task it runs for.
///
/// The cancellation token is cancelled when the task is cancelled, times
/// out or the queue shuts down. Observing it is optional.
#[derive(Clone)]
pub struct ToolContext {
    task_id: Option<TaskId>,
    token: CancellationToken,
    progress: Option<ProgressFn>,
}

impl fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContext")
            .field("task_id", &self.task_id)
            .field("cancelled", &self.token.is_cancelled())
            .field("progress", &self.progress.is_some())
            .finish()
    }
}

impl ToolContext {
    /// Context for a queued task.
    pub fn new(task_id: TaskId, token: CancellationToken, progress: Option<ProgressFn>) -> Self {
        Self {
            task_id: Some(task_id),
            token,
            progress,
        }
    }

    /// Context for a direct, unqueued call. Never cancelled.
    pub fn detached() -> Self {
        Self {
            task_id: None,
            token: CancellationToken::new(),
            progress: None,
        }
    }

    /// The task this call belongs to, if it was queued.
    pub fn task_id(&self) -> Option<TaskId> {
        self.task_id
    }

    /// Returns `true` once cancellation or timeout has been signalled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Completes when cancellation or timeout is signalled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// The underlying token, for use in `tokio::select!`.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    /// Reports progress. Values above 100 are clamped; ignored for
    /// detached calls.
    pub fn report_progress(&self, percent: u8) {
        if let Some(progress) = &self.progress {
            progress(percent.min(100));
        }
    }
}
