//! JSON front end for the task queue.
//!
//! [`TaskRouter`] turns `task_*` method calls with JSON parameters into
//! [`TaskQueue`] operations and serializes the outcome. It is the piece a
//! request handler (an MCP server, a socket listener) plugs into.
//!
//! The same methods can be exposed to tool-calling clients as tools:
//! [`register_task_tools`] registers one async-wrapper tool per method in
//! the queue's own registry, which lets a client submit a long-running tool
//! and poll for it through ordinary tool calls.
//!
//! # Error Conversion
//!
//! Router errors are [`TaskError`]s. [`error_object`] renders one as a
//! JSON-RPC style `{ "code", "message" }` object using
//! [`TaskError::error_code`].

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::constants::{
    DEFAULT_LIST_LIMIT, METHOD_TASK_CANCEL, METHOD_TASK_LIST, METHOD_TASK_RESULT,
    METHOD_TASK_STATS, METHOD_TASK_STATUS, METHOD_TASK_SUBMIT, TASK_METHODS,
};
use crate::error::TaskError;
use crate::queue::{CancelOutcome, TaskQueue};
use crate::tool::{Tool, ToolContext};
use crate::types::params::{
    CancelResponse, ListParams, ListResponse, SubmitParams, SubmitResponse, TaskIdParams,
    TaskView,
};
use crate::types::result::{ToolParams, ToolResult};

/// Dispatches `task_*` methods to a [`TaskQueue`].
///
/// Holds a weak reference so that router tools registered in the queue's
/// own registry do not keep the queue alive.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use toolqueue::{QueueConfig, TaskQueue, TaskRouter, ToolRegistry};
/// use serde_json::json;
///
/// let queue = Arc::new(TaskQueue::new(Arc::new(ToolRegistry::new()), QueueConfig::default()));
/// let router = TaskRouter::new(&queue);
///
/// let stats = router.handle("task_stats", json!({})).unwrap();
/// assert_eq!(stats, json!({"pending": 0, "running": 0, "completed": 0}));
///
/// let err = router.handle("task_submit", json!({"tool_name": "nope"})).unwrap_err();
/// assert_eq!(err.error_code(), -32602);
/// ```
#[derive(Debug, Clone)]
pub struct TaskRouter {
    queue: Weak<TaskQueue>,
}

impl TaskRouter {
    /// Creates a router for `queue`.
    pub fn new(queue: &Arc<TaskQueue>) -> Self {
        Self {
            queue: Arc::downgrade(queue),
        }
    }

    /// Methods this router answers.
    pub fn methods(&self) -> &'static [&'static str] {
        TASK_METHODS
    }

    fn queue(&self) -> Result<Arc<TaskQueue>, TaskError> {
        self.queue
            .upgrade()
            .ok_or_else(|| TaskError::ExecutorUnavailable("task queue has been dropped".to_string()))
    }

    /// Handles one method call.
    ///
    /// # Errors
    ///
    /// [`TaskError::UnknownMethod`] for a method outside [`TASK_METHODS`],
    /// [`TaskError::InvalidParams`] for malformed parameters, and whatever
    /// the underlying queue operation returns.
    pub fn handle(&self, method: &str, params: Value) -> Result<Value, TaskError> {
        match method {
            METHOD_TASK_SUBMIT => self.task_submit(parse(method, params)?),
            METHOD_TASK_STATUS => self.task_status(parse(method, params)?),
            METHOD_TASK_RESULT => self.task_result(parse(method, params)?),
            METHOD_TASK_CANCEL => self.task_cancel(parse(method, params)?),
            METHOD_TASK_LIST => self.task_list(parse(method, params)?),
            METHOD_TASK_STATS => self.task_stats(),
            other => Err(TaskError::UnknownMethod(other.to_string())),
        }
    }

    /// Handles `task_submit`.
    pub fn task_submit(&self, params: SubmitParams) -> Result<Value, TaskError> {
        let timeout = params.timeout_ms.map(Duration::from_millis);
        let task_id = self
            .queue()?
            .submit(&params.tool_name, params.params, timeout)?;
        to_value(&SubmitResponse { task_id })
    }

    /// Handles `task_status`.
    pub fn task_status(&self, params: TaskIdParams) -> Result<Value, TaskError> {
        let record = self.queue()?.get_status(params.task_id)?;
        to_value(&TaskView::from(&record))
    }

    /// Handles `task_result`.
    pub fn task_result(&self, params: TaskIdParams) -> Result<Value, TaskError> {
        let result = self.queue()?.get_result(params.task_id)?;
        to_value(&result)
    }

    /// Handles `task_cancel`.
    ///
    /// Cancelling a finished task is not an error here: the response carries
    /// `cancelled: false` with the task's status as the reason.
    pub fn task_cancel(&self, params: TaskIdParams) -> Result<Value, TaskError> {
        let response = match self.queue()?.cancel(params.task_id) {
            Ok(CancelOutcome::Cancelled) => CancelResponse {
                cancelled: true,
                reason: None,
            },
            Ok(CancelOutcome::Requested) => CancelResponse {
                cancelled: true,
                reason: Some("cancellation requested; the task is recorded as cancelled when its tool call returns".to_string()),
            },
            Err(TaskError::AlreadyTerminal { status, .. }) => CancelResponse {
                cancelled: false,
                reason: Some(format!("task already {status}")),
            },
            Err(e) => return Err(e),
        };
        to_value(&response)
    }

    /// Handles `task_list`.
    pub fn task_list(&self, params: ListParams) -> Result<Value, TaskError> {
        let limit = params.limit.unwrap_or(DEFAULT_LIST_LIMIT);
        let tasks: Vec<TaskView> = self
            .queue()?
            .list_tasks(params.include_completed, Some(limit))
            .iter()
            .map(TaskView::from)
            .collect();
        to_value(&ListResponse {
            count: tasks.len(),
            tasks,
        })
    }

    /// Handles `task_stats`.
    pub fn task_stats(&self) -> Result<Value, TaskError> {
        to_value(&self.queue()?.stats())
    }
}

/// Renders an error as a JSON-RPC style error object.
///
/// # Examples
///
/// ```
/// use toolqueue::router::error_object;
/// use toolqueue::TaskError;
/// use serde_json::json;
///
/// let err = TaskError::InvalidParams("missing task_id".to_string());
/// assert_eq!(
///     error_object(&err),
///     json!({"code": -32602, "message": "invalid params: missing task_id"})
/// );
/// ```
pub fn error_object(err: &TaskError) -> Value {
    json!({
        "code": err.error_code(),
        "message": err.to_string(),
    })
}

fn parse<T: DeserializeOwned>(method: &str, params: Value) -> Result<T, TaskError> {
    // Absent params are treated as an empty object.
    let params = if params.is_null() { json!({}) } else { params };
    serde_json::from_value(params)
        .map_err(|e| TaskError::InvalidParams(format!("invalid {method} params: {e}")))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, TaskError> {
    serde_json::to_value(value)
        .map_err(|e| TaskError::InvalidParams(format!("failed to serialize response: {e}")))
}

/// A registry tool that forwards to one router method.
#[derive(Debug)]
pub struct TaskMethodTool {
    method: &'static str,
    router: TaskRouter,
}

impl TaskMethodTool {
    /// Creates the tool for `method`.
    pub fn new(method: &'static str, router: TaskRouter) -> Self {
        Self { method, router }
    }
}

#[async_trait]
impl Tool for TaskMethodTool {
    fn name(&self) -> &str {
        self.method
    }

    fn description(&self) -> Option<&str> {
        Some(match self.method {
            METHOD_TASK_SUBMIT => "Submit a tool call to run in the background and return its task id",
            METHOD_TASK_STATUS => "Get the status, progress and timestamps of a background task",
            METHOD_TASK_RESULT => "Get the result of a finished background task",
            METHOD_TASK_CANCEL => "Cancel a pending or running background task",
            METHOD_TASK_LIST => "List background tasks, newest first",
            METHOD_TASK_STATS => "Count pending, running and finished background tasks",
            _ => "Task queue method",
        })
    }

    async fn call(&self, params: ToolParams, _ctx: ToolContext) -> ToolResult {
        match self.router.handle(self.method, Value::Object(params)) {
            Ok(data) => ToolResult::success(format!("{} succeeded", self.method), Some(data)),
            Err(e) => ToolResult::failure_with_data(e.to_string(), error_object(&e)),
        }
    }
}

/// Registers one [`TaskMethodTool`] per router method in the queue's
/// registry. Existing tools with the same names are replaced.
pub fn register_task_tools(queue: &Arc<TaskQueue>) {
    let router = TaskRouter::new(queue);
    for method in TASK_METHODS {
        queue
            .registry()
            .register(Arc::new(TaskMethodTool::new(*method, router.clone())));
    }
    tracing::debug!(count = TASK_METHODS.len(), "registered task router tools");
}
