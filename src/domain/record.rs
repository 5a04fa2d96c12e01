//! Task record -- the store's representation of one submitted invocation.
//!
//! Records are only mutated by the [`TaskStore`](crate::store::TaskStore)
//! while it holds its lock; everything handed to callers is a cloned
//! snapshot, so status and result are always observed together.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TaskError;
use crate::types::result::{ToolParams, ToolResult};
use crate::types::task::TaskStatus;

/// Unique identity of a submitted task.
///
/// A random UUIDv4 assigned at submission and never reused.
///
/// # Examples
///
/// ```
/// use toolqueue::TaskId;
///
/// let id = TaskId::new();
/// let parsed: TaskId = id.to_string().parse().unwrap();
/// assert_eq!(id, parsed);
/// assert!("not-a-uuid".parse::<TaskId>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Generates a fresh identity.
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for TaskId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Tracked state of one submitted tool invocation.
///
/// `tool_name`, `params` and `timeout` never change after construction.
/// `started_at` is only set once the task leaves `Pending`; `completed_at`
/// and `result` only once it is terminal.
///
/// # Examples
///
/// ```
/// use toolqueue::{TaskRecord, TaskStatus};
/// use std::time::Duration;
///
/// let record = TaskRecord::new("echo", serde_json::Map::new(), Duration::from_secs(5));
/// assert_eq!(record.status, TaskStatus::Pending);
/// assert!(record.started_at.is_none());
/// assert!(record.result.is_none());
/// assert!(record.duration().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct TaskRecord {
    /// Identity returned to the submitter.
    pub task_id: TaskId,
    /// Registered tool to invoke.
    pub tool_name: String,
    /// Arguments passed verbatim to the tool.
    pub params: ToolParams,
    /// Current lifecycle status.
    pub status: TaskStatus,
    /// Outcome, present once terminal.
    pub result: Option<ToolResult>,
    /// Last reported progress, 0-100.
    pub progress: Option<u8>,
    /// When the task was accepted.
    pub submitted_at: DateTime<Utc>,
    /// When the task was dispatched to a worker.
    pub started_at: Option<DateTime<Utc>>,
    /// When the task reached a terminal state.
    pub completed_at: Option<DateTime<Utc>>,
    /// How long the task may run before the timeout sweep ends it.
    pub timeout: Duration,
    /// Whether cancellation has been signalled to the task.
    pub cancellation_requested: bool,
}

impl TaskRecord {
    /// Creates a new `Pending` record with a fresh identity.
    pub fn new(tool_name: impl Into<String>, params: ToolParams, timeout: Duration) -> Self {
        Self {
            task_id: TaskId::new(),
            tool_name: tool_name.into(),
            params,
            status: TaskStatus::Pending,
            result: None,
            progress: None,
            submitted_at: Utc::now(),
            started_at: None,
            completed_at: None,
            timeout,
            cancellation_requested: false,
        }
    }

    /// Returns `true` if the task is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Completed minus started, when both are known.
    pub fn duration(&self) -> Option<Duration> {
        let started = self.started_at?;
        let completed = self.completed_at?;
        (completed - started).to_std().ok()
    }

    /// How long the task has been running as of `now`.
    ///
    /// `None` unless the task is `Running`.
    pub fn running_for(&self, now: DateTime<Utc>) -> Option<Duration> {
        if self.status != TaskStatus::Running {
            return None;
        }
        let started = self.started_at?;
        Some((now - started).to_std().unwrap_or(Duration::ZERO))
    }

    /// Returns `true` if the task is running and has exceeded its timeout.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.running_for(now)
            .is_some_and(|elapsed| elapsed > self.timeout)
    }

    /// Returns `true` if the task is terminal and its retention window has
    /// elapsed as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        if !self.is_terminal() {
            return false;
        }
        let Some(completed) = self.completed_at else {
            return false;
        };
        let age = (now - completed).to_std().unwrap_or(Duration::ZERO);
        age >= retention
    }

    /// Moves the record from `Pending` to `Running`.
    pub(crate) fn start(&mut self, now: DateTime<Utc>) -> Result<(), TaskError> {
        self.status
            .validate_transition(self.task_id, &TaskStatus::Running)?;
        self.status = TaskStatus::Running;
        self.started_at = Some(now);
        Ok(())
    }

    /// Writes a terminal status together with its result and completion time.
    ///
    /// Progress is forced to 100 for `Completed` and `Failed`.
    pub(crate) fn finish(
        &mut self,
        status: TaskStatus,
        result: ToolResult,
        now: DateTime<Utc>,
    ) -> Result<(), TaskError> {
        debug_assert!(status.is_terminal());
        self.status.validate_transition(self.task_id, &status)?;
        self.status = status;
        self.result = Some(result);
        self.completed_at = Some(now);
        if matches!(status, TaskStatus::Completed | TaskStatus::Failed) {
            self.progress = Some(100);
        }
        Ok(())
    }
}
