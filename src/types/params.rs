//! Request and response shapes for the task router methods.
//!
//! All fields are `snake_case` on the wire, matching the names tool-calling
//! clients already send.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{millis, TaskId, TaskRecord};
use crate::types::result::ToolParams;
use crate::types::task::TaskStatus;

/// Parameters for `task_submit`.
///
/// # Examples
///
/// ```
/// use toolqueue::SubmitParams;
/// use serde_json::json;
///
/// let params: SubmitParams = serde_json::from_value(json!({
///     "tool_name": "echo",
///     "params": {"msg": "hi"},
/// }))
/// .unwrap();
/// assert_eq!(params.tool_name, "echo");
/// assert!(params.timeout_ms.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitParams {
    /// Registered tool to invoke.
    pub tool_name: String,
    /// Arguments passed verbatim to the tool.
    #[serde(default)]
    pub params: ToolParams,
    /// Per-task timeout; the queue default applies when absent or zero.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Response for `task_submit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitResponse {
    /// Identity to poll with.
    pub task_id: TaskId,
}

/// Parameters for `task_status`, `task_result` and `task_cancel`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskIdParams {
    /// The task to act on.
    pub task_id: TaskId,
}

/// Response for `task_cancel`.
///
/// `reason` explains a refusal or a deferred cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    /// Whether the cancellation took (or will take) effect.
    pub cancelled: bool,
    /// Why cancellation was refused or deferred.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Parameters for `task_list`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListParams {
    /// Include terminal tasks still inside the retention window.
    #[serde(default)]
    pub include_completed: bool,
    /// Maximum number of tasks to return, newest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

/// Response for `task_list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    /// Newest-submitted-first task snapshots.
    pub tasks: Vec<TaskView>,
    /// Number of entries in `tasks`.
    pub count: usize,
}

/// Serializable snapshot of a [`TaskRecord`], without its parameters and
/// result.
///
/// # Examples
///
/// ```
/// use toolqueue::{TaskRecord, TaskView};
/// use std::time::Duration;
///
/// let record = TaskRecord::new("echo", serde_json::Map::new(), Duration::from_secs(1));
/// let view = TaskView::from(&record);
/// assert_eq!(view.status.to_string(), "pending");
/// assert_eq!(view.duration_ms, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    /// Task identity.
    pub task_id: TaskId,
    /// Tool the task invokes.
    pub tool_name: String,
    /// Current status.
    pub status: TaskStatus,
    /// Last reported progress (0-100).
    pub progress: Option<u8>,
    /// When the task was accepted.
    pub submitted_at: DateTime<Utc>,
    /// When the task was dispatched.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// Completed minus started, or 0 when the task never ran to an end.
    pub duration_ms: u64,
    /// Whether cancellation has been signalled.
    pub cancellation_requested: bool,
}

impl From<&TaskRecord> for TaskView {
    fn from(record: &TaskRecord) -> Self {
        let duration_ms = record
            .duration()
            .map(millis)
            .unwrap_or(0);
        Self {
            task_id: record.task_id,
            tool_name: record.tool_name.clone(),
            status: record.status,
            progress: record.progress,
            submitted_at: record.submitted_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
            duration_ms,
            cancellation_requested: record.cancellation_requested,
        }
    }
}
