//! Name-keyed tool registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use super::{ExecutionContext, MainThreadExecutor, Tool, ToolContext};
use crate::error::TaskError;
use crate::types::result::{ToolParams, ToolResult};

/// Maps tool names to capabilities and executes them by name.
///
/// Shared between the submitting side (which only asks
/// [`has_tool`](Self::has_tool)) and the workers (which call
/// [`execute_with_context`](Self::execute_with_context)).
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use toolqueue::tool::FnTool;
/// use toolqueue::{ToolRegistry, ToolResult};
///
/// let registry = ToolRegistry::new();
/// registry.register(Arc::new(FnTool::new("ping", |_p, _c| async {
///     ToolResult::success("pong", None)
/// })));
/// assert!(registry.has_tool("ping"));
/// assert_eq!(registry.tool_names(), vec!["ping".to_string()]);
/// ```
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<dyn Tool>>>,
    main_thread: RwLock<Option<Arc<MainThreadExecutor>>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tool_names())
            .field("main_thread", &self.main_thread.read().is_some())
            .finish()
    }
}

impl ToolRegistry {
    /// Creates an empty registry with no main-thread executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tool under its own name, returning any tool it replaced.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Option<Arc<dyn Tool>> {
        let name = tool.name().to_string();
        tracing::debug!(tool = %name, "registering tool");
        self.tools.write().insert(name, tool)
    }

    /// Removes a tool by name.
    pub fn unregister(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.write().remove(name)
    }

    /// Returns `true` if a tool with this name is registered.
    pub fn has_tool(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    /// Looks up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.read().get(name).cloned()
    }

    /// Registered names, sorted.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    /// Returns `true` if no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    /// Installs the executor used for [`ExecutionContext::MainThread`] tools,
    /// returning the previous one.
    pub fn set_main_thread_executor(
        &self,
        executor: Arc<MainThreadExecutor>,
    ) -> Option<Arc<MainThreadExecutor>> {
        self.main_thread.write().replace(executor)
    }

    /// Removes the main-thread executor. Main-thread tools run inline
    /// afterwards.
    pub fn clear_main_thread_executor(&self) -> Option<Arc<MainThreadExecutor>> {
        self.main_thread.write().take()
    }

    /// The installed main-thread executor, if any.
    pub fn main_thread_executor(&self) -> Option<Arc<MainThreadExecutor>> {
        self.main_thread.read().clone()
    }

    /// Executes a tool outside the queue with a detached context.
    ///
    /// # Errors
    ///
    /// [`TaskError::ToolNotFound`] if no tool has this name. Tool failures
    /// are returned as `Ok` with `success == false`.
    pub async fn execute(&self, name: &str, params: ToolParams) -> Result<ToolResult, TaskError> {
        self.execute_with_context(name, params, ToolContext::detached())
            .await
    }

    /// Executes a tool with the given context.
    ///
    /// Main-thread tools are marshalled to the installed executor and run
    /// inline when there is none.
    pub async fn execute_with_context(
        &self,
        name: &str,
        params: ToolParams,
        ctx: ToolContext,
    ) -> Result<ToolResult, TaskError> {
        let tool = self.get(name).ok_or_else(|| TaskError::ToolNotFound {
            tool_name: name.to_string(),
        })?;

        if tool.execution_context() == ExecutionContext::MainThread {
            if let Some(executor) = self.main_thread_executor() {
                return Ok(executor.run(tool, params, ctx).await);
            }
        }
        Ok(tool.call(params, ctx).await)
    }
}
