//! Error types for task queue operations.
//!
//! [`TaskError`] covers admission, lifecycle and lookup failures returned
//! from the [`TaskQueue`](crate::TaskQueue) façade. Failures reported by a
//! capability are never errors here: they are captured in the task's
//! terminal [`ToolResult`](crate::types::ToolResult).
//!
//! [`ConfigError`] covers loading and validating a
//! [`QueueConfig`](crate::QueueConfig).

use std::time::Duration;

use crate::domain::TaskId;
use crate::types::task::TaskStatus;

/// Errors that can occur during task queue operations.
///
/// Use [`error_code`](TaskError::error_code) to map to a JSON-RPC error
/// code when reporting through the [`TaskRouter`](crate::TaskRouter).
///
/// # Examples
///
/// ```
/// use toolqueue::TaskError;
///
/// let err = TaskError::ToolNotFound {
///     tool_name: "spawn_actor".to_string(),
/// };
/// assert_eq!(err.error_code(), -32602);
/// assert!(err.to_string().contains("spawn_actor"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Submission named a tool the registry does not know.
    #[error("tool not found: {tool_name}")]
    ToolNotFound {
        /// The unknown tool name.
        tool_name: String,
    },

    /// The store already tracks the maximum number of non-terminal tasks.
    #[error("task queue is at capacity ({max_tracked} active tasks)")]
    CapacityExceeded {
        /// The configured admission ceiling.
        max_tracked: usize,
    },

    /// No record exists for this identity (never existed or evicted).
    #[error("task not found: {task_id}")]
    NotFound {
        /// The identity that was looked up.
        task_id: TaskId,
    },

    /// The task has not reached a terminal state yet.
    #[error("task not ready: {task_id} (status: {status})")]
    NotReady {
        /// The task identity.
        task_id: TaskId,
        /// The task's current, non-terminal status.
        status: TaskStatus,
    },

    /// Cancel was requested for a task that already finished.
    #[error("task already terminal: {task_id} (status: {status})")]
    AlreadyTerminal {
        /// The task identity.
        task_id: TaskId,
        /// The terminal status the task is in.
        status: TaskStatus,
    },

    /// The state machine rejected a transition.
    #[error("invalid transition from {from} to {to} for task {task_id}")]
    InvalidTransition {
        /// The task identity.
        task_id: TaskId,
        /// The status the task was in.
        from: TaskStatus,
        /// The rejected target status.
        to: TaskStatus,
    },

    /// A router request carried malformed parameters.
    #[error("invalid params: {0}")]
    InvalidParams(String),

    /// The router does not implement the requested method.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// `wait_for_terminal` gave up before the task finished.
    #[error("timed out after {timeout:?} waiting for task {task_id}")]
    WaitTimeout {
        /// The task identity.
        task_id: TaskId,
        /// How long the caller waited.
        timeout: Duration,
    },

    /// The main-thread executor could not be started.
    #[error("executor unavailable: {0}")]
    ExecutorUnavailable(String),
}

impl TaskError {
    /// Maps this error to a JSON-RPC error code.
    ///
    /// - `-32602` (Invalid params): caller-side problems such as an unknown
    ///   tool, unknown task, not-ready result or cancel of a finished task.
    /// - `-32601` (Method not found): an unknown router method.
    /// - `-32603` (Internal error): capacity, wait timeout, executor failures.
    ///
    /// # Examples
    ///
    /// ```
    /// use toolqueue::TaskError;
    ///
    /// let err = TaskError::CapacityExceeded { max_tracked: 100 };
    /// assert_eq!(err.error_code(), -32603);
    ///
    /// let err = TaskError::InvalidParams("missing task_id".to_string());
    /// assert_eq!(err.error_code(), -32602);
    /// ```
    pub fn error_code(&self) -> i32 {
        match self {
            Self::ToolNotFound { .. }
            | Self::NotFound { .. }
            | Self::NotReady { .. }
            | Self::AlreadyTerminal { .. }
            | Self::InvalidTransition { .. }
            | Self::InvalidParams(_) => -32602,
            Self::UnknownMethod(_) => -32601,
            Self::CapacityExceeded { .. }
            | Self::WaitTimeout { .. }
            | Self::ExecutorUnavailable(_) => -32603,
        }
    }

    /// Returns `true` for the two admission errors a caller can retry after
    /// changing its input or waiting for capacity.
    pub fn is_admission_error(&self) -> bool {
        matches!(
            self,
            Self::ToolNotFound { .. } | Self::CapacityExceeded { .. }
        )
    }
}

/// Errors that occur while loading or validating a queue configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The TOML text is malformed or does not match the schema.
    #[error("Failed to parse config TOML: {source}")]
    Parse {
        #[from]
        source: toml::de::Error,
    },

    /// The config parsed but holds an unusable value.
    #[error("Config validation error: {message}")]
    Validation { message: String },

    /// The config file could not be read.
    #[error("Failed to read config file '{path}': {source}")]
    Io {
        source: std::io::Error,
        path: String,
    },
}
