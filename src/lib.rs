//! Asynchronous tool-call task queue.
//!
//! `toolqueue` accepts named tool invocations, runs them off the caller's
//! thread with bounded concurrency, tracks each invocation through a
//! lifecycle state machine, and exposes a poll-based status/result API to
//! callers that cannot block.
//!
//! # Overview
//!
//! A caller submits a tool name and a parameter bag to the [`TaskQueue`]
//! and receives a [`TaskId`] immediately. A single coordinating loop admits
//! pending tasks in FIFO order up to the configured concurrency limit and
//! dispatches each to its own worker, which invokes the capability through
//! the [`ToolRegistry`]. The caller polls [`TaskQueue::get_status`] and
//! [`TaskQueue::get_result`] with the identity it was given.
//!
//! Cancellation and timeout are cooperative: they change the recorded
//! outcome of a task and signal the capability through its
//! [`CancellationToken`](tokio_util::sync::CancellationToken), but never
//! interrupt a call in flight.
//!
//! # Module Organization
//!
//! - [`types`] - Task status state machine, tool results and wire types
//! - [`domain`] - The [`TaskRecord`] tracked for every submission
//! - [`store`] - Mutex-guarded record map with FIFO admission queue
//! - [`tool`] - The [`Tool`] capability trait, registry and main-thread executor
//! - [`scheduler`] - Coordinating loop, workers, timeout and retention sweeps
//! - [`queue`] - The public [`TaskQueue`] façade
//! - [`router`] - JSON request front end and async-wrapper tools
//! - [`config`] - [`QueueConfig`] with TOML loading
//! - [`error`] - [`TaskError`] and [`ConfigError`]
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use toolqueue::{QueueConfig, TaskQueue, TaskStatus, ToolRegistry};
//! use toolqueue::tool::FnTool;
//! use toolqueue::types::ToolResult;
//! use serde_json::json;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let registry = Arc::new(ToolRegistry::new());
//! registry.register(Arc::new(FnTool::new("echo", |params, _ctx| async move {
//!     ToolResult::success("echoed", Some(serde_json::Value::Object(params)))
//! })));
//!
//! let queue = TaskQueue::new(registry, QueueConfig::default());
//! queue.start().unwrap();
//!
//! let mut params = serde_json::Map::new();
//! params.insert("msg".to_string(), json!("hi"));
//! let task_id = queue.submit("echo", params, None).unwrap();
//!
//! let record = queue
//!     .wait_for_terminal(task_id, std::time::Duration::from_secs(5))
//!     .await
//!     .unwrap();
//! assert_eq!(record.status, TaskStatus::Completed);
//! assert_eq!(queue.get_result(task_id).unwrap().data, Some(json!({"msg": "hi"})));
//!
//! queue.stop().await;
//! # });
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

/// Domain types ([`TaskRecord`]) for internal task representation.
pub mod domain;

pub mod queue;
pub mod router;
pub mod scheduler;
pub mod store;
pub mod tool;

#[cfg(feature = "logging")]
mod logging;

// Re-exports for ergonomic access
pub use config::QueueConfig;
pub use constants::*;
pub use domain::{TaskId, TaskRecord};
pub use error::{ConfigError, TaskError};
pub use queue::{CancelOutcome, TaskQueue};
pub use router::TaskRouter;
pub use tool::{ExecutionContext, MainThreadExecutor, Tool, ToolContext, ToolRegistry};
pub use types::*;

#[cfg(feature = "logging")]
pub use logging::init_logging;
