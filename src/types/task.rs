//! Task lifecycle status and its state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::TaskId;
use crate::error::TaskError;

/// Lifecycle status of a submitted tool invocation.
///
/// Status moves monotonically: once a task leaves `Pending` it never
/// returns, and terminal states (`Completed`, `Failed`, `Cancelled`,
/// `TimedOut`) reject all transitions. Self-transitions are rejected.
///
/// # State Machine
///
/// ```text
/// Pending -> Running, Cancelled
/// Running -> Completed, Failed, Cancelled, TimedOut
/// Completed | Failed | Cancelled | TimedOut -> (terminal, no transitions)
/// ```
///
/// # Examples
///
/// ```
/// use toolqueue::TaskStatus;
///
/// let status = TaskStatus::Pending;
/// assert!(!status.is_terminal());
/// assert!(status.can_transition_to(&TaskStatus::Running));
/// assert!(!status.can_transition_to(&TaskStatus::Completed));
/// assert!(!status.can_transition_to(&TaskStatus::Pending));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Accepted and waiting for a concurrency slot.
    Pending,
    /// Dispatched to a worker.
    Running,
    /// The capability returned a successful result (terminal).
    Completed,
    /// The capability returned a failure result or panicked (terminal).
    Failed,
    /// Cancelled before or during execution (terminal).
    Cancelled,
    /// Exceeded its timeout while running (terminal).
    TimedOut,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

impl TaskStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [TaskStatus; 6] = [
        Self::Pending,
        Self::Running,
        Self::Completed,
        Self::Failed,
        Self::Cancelled,
        Self::TimedOut,
    ];

    /// Returns `true` if this status is terminal (no further transitions allowed).
    ///
    /// # Examples
    ///
    /// ```
    /// use toolqueue::TaskStatus;
    ///
    /// assert!(!TaskStatus::Pending.is_terminal());
    /// assert!(!TaskStatus::Running.is_terminal());
    /// assert!(TaskStatus::Completed.is_terminal());
    /// assert!(TaskStatus::TimedOut.is_terminal());
    /// ```
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut
        )
    }

    /// Returns `true` if transitioning from this status to `next` is valid.
    ///
    /// # Examples
    ///
    /// ```
    /// use toolqueue::TaskStatus;
    ///
    /// assert!(TaskStatus::Pending.can_transition_to(&TaskStatus::Cancelled));
    /// assert!(TaskStatus::Running.can_transition_to(&TaskStatus::TimedOut));
    /// assert!(!TaskStatus::Pending.can_transition_to(&TaskStatus::TimedOut));
    /// assert!(!TaskStatus::Completed.can_transition_to(&TaskStatus::Running));
    /// ```
    pub fn can_transition_to(&self, next: &Self) -> bool {
        if self == next {
            return false;
        }

        match self {
            Self::Pending => matches!(next, Self::Running | Self::Cancelled),
            Self::Running => matches!(
                next,
                Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut
            ),
            Self::Completed | Self::Failed | Self::Cancelled | Self::TimedOut => false,
        }
    }

    /// Validates a transition from this status to `next`.
    ///
    /// Returns [`TaskError::InvalidTransition`] when the state machine
    /// does not allow it.
    ///
    /// # Examples
    ///
    /// ```
    /// use toolqueue::{TaskId, TaskStatus};
    ///
    /// let id = TaskId::new();
    /// assert!(TaskStatus::Running.validate_transition(id, &TaskStatus::Completed).is_ok());
    /// assert!(TaskStatus::Completed.validate_transition(id, &TaskStatus::Failed).is_err());
    /// ```
    pub fn validate_transition(&self, task_id: TaskId, next: &Self) -> Result<(), TaskError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(TaskError::InvalidTransition {
                task_id,
                from: *self,
                to: *next,
            })
        }
    }
}
