//! Tool results, parameter bags and queue counters.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parameter bag passed verbatim to a capability.
///
/// Insertion ordered (`serde_json` is built with `preserve_order`).
pub type ToolParams = Map<String, Value>;

/// Outcome produced by a capability, or synthesized by the queue for
/// cancelled and timed-out tasks.
///
/// # Examples
///
/// ```
/// use toolqueue::ToolResult;
/// use serde_json::json;
///
/// let ok = ToolResult::success("done", Some(json!({"count": 3})));
/// assert!(ok.success);
///
/// let err = ToolResult::failure("asset not found");
/// assert!(!err.success);
/// assert!(err.data.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the capability reported success.
    pub success: bool,
    /// Human-readable summary.
    pub message: String,
    /// Optional structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ToolResult {
    /// A successful result with an optional payload.
    pub fn success(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }

    /// A failed result carrying only a message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: None,
        }
    }

    /// A failed result with a structured payload.
    pub fn failure_with_data(message: impl Into<String>, data: Value) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: Some(data),
        }
    }

    pub(crate) fn cancelled() -> Self {
        Self::failure("task cancelled")
    }

    pub(crate) fn timed_out(timeout_ms: u64) -> Self {
        Self::failure(format!("task timed out after {timeout_ms} ms"))
    }
}

/// Snapshot of queue occupancy.
///
/// `completed` counts every terminal task still retained, whatever its
/// outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Tasks waiting for a concurrency slot.
    pub pending: usize,
    /// Tasks dispatched to a worker.
    pub running: usize,
    /// Retained terminal tasks.
    pub completed: usize,
}

impl QueueStats {
    /// Number of non-terminal tasks, the figure admission is checked against.
    pub fn active(&self) -> usize {
        self.pending + self.running
    }

    /// Total tracked tasks.
    pub fn total(&self) -> usize {
        self.pending + self.running + self.completed
    }
}
