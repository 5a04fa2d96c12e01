//! Capabilities the queue executes, and the registry that looks them up.
//!
//! A [`Tool`] is an opaque unit of work: given a parameter bag it produces
//! a [`ToolResult`]. The queue never interprets a result beyond its
//! `success` flag and never retries.
//!
//! Tools that must run on the host's main execution context declare
//! [`ExecutionContext::MainThread`]; the [`ToolRegistry`] forwards those
//! calls to its [`MainThreadExecutor`] when one is installed.

mod context;
mod executor;
mod registry;

use std::fmt;
use std::future::Future;

use async_trait::async_trait;

pub use context::{ProgressFn, ToolContext};
pub use executor::MainThreadExecutor;
pub use registry::ToolRegistry;

use crate::types::result::{ToolParams, ToolResult};

/// Where a tool's code is allowed to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionContext {
    /// Any worker task.
    #[default]
    Any,
    /// Only on the main-thread executor.
    MainThread,
}

/// A named capability the queue can invoke.
///
/// Failures are reported through [`ToolResult::failure`], not by
/// panicking; a panic is still caught by the worker and recorded as a
/// failed task.
///
/// Long-running tools should check [`ToolContext::is_cancelled`] between
/// steps. The queue never interrupts a call in flight.
///
/// # Blocking work
///
/// `call` runs on a Tokio worker and must not block it. Synchronous or
/// CPU-heavy work belongs in [`tokio::task::spawn_blocking`]; a blocked
/// worker on a current-thread runtime also stalls the scheduler loop and
/// its timeout sweep.
///
/// ```
/// use toolqueue::tool::FnTool;
/// use toolqueue::ToolResult;
///
/// let tool = FnTool::new("checksum", |_params, _ctx| async {
///     match tokio::task::spawn_blocking(|| std::fs::read("Cargo.toml").map(|b| b.len())).await {
///         Ok(Ok(len)) => ToolResult::success(format!("{len} bytes"), None),
///         Ok(Err(e)) => ToolResult::failure(e.to_string()),
///         Err(e) => ToolResult::failure(e.to_string()),
///     }
/// });
/// # let _ = tool;
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Registry key.
    fn name(&self) -> &str;

    /// One-line description for listings.
    fn description(&self) -> Option<&str> {
        None
    }

    /// Where this tool must run.
    fn execution_context(&self) -> ExecutionContext {
        ExecutionContext::Any
    }

    /// Runs the tool.
    async fn call(&self, params: ToolParams, ctx: ToolContext) -> ToolResult;
}

/// A [`Tool`] backed by an async closure.
///
/// # Examples
///
/// ```
/// use toolqueue::tool::{ExecutionContext, FnTool};
/// use toolqueue::{Tool, ToolResult};
///
/// let tool = FnTool::new("ping", |_params, _ctx| async { ToolResult::success("pong", None) })
///     .with_description("Replies with pong")
///     .on_main_thread();
/// assert_eq!(tool.name(), "ping");
/// assert_eq!(tool.execution_context(), ExecutionContext::MainThread);
/// ```
pub struct FnTool<F> {
    name: String,
    description: Option<String>,
    context: ExecutionContext,
    handler: F,
}

impl<F> fmt::Debug for FnTool<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("context", &self.context)
            .finish()
    }
}

impl<F, Fut> FnTool<F>
where
    F: Fn(ToolParams, ToolContext) -> Fut + Send + Sync,
    Fut: Future<Output = ToolResult> + Send,
{
    /// Create a tool that runs on any worker.
    pub fn new(name: impl Into<String>, handler: F) -> Self {
        Self {
            name: name.into(),
            description: None,
            context: ExecutionContext::Any,
            handler,
        }
    }

    /// Set the description for this tool.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Require this tool to run on the main-thread executor.
    pub fn on_main_thread(mut self) -> Self {
        self.context = ExecutionContext::MainThread;
        self
    }
}

#[async_trait]
impl<F, Fut> Tool for FnTool<F>
where
    F: Fn(ToolParams, ToolContext) -> Fut + Send + Sync,
    Fut: Future<Output = ToolResult> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn execution_context(&self) -> ExecutionContext {
        self.context
    }

    async fn call(&self, params: ToolParams, ctx: ToolContext) -> ToolResult {
        (self.handler)(params, ctx).await
    }
}
