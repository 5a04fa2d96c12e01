//! Dedicated executor for tools that must not run on worker tasks.
//!
//! Hosts with thread-affine state (an editor's main thread, a GUI toolkit)
//! cannot let arbitrary workers touch it. [`MainThreadExecutor`] owns one
//! OS thread with a single-threaded Tokio runtime and runs marshalled calls
//! there one at a time, in arrival order.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use super::{Tool, ToolContext};
use crate::domain::millis;
use crate::error::TaskError;
use crate::types::result::{ToolParams, ToolResult};

const THREAD_NAME: &str = "toolqueue-main";

struct Job {
    tool: Arc<dyn Tool>,
    params: ToolParams,
    ctx: ToolContext,
    reply: oneshot::Sender<ToolResult>,
}

/// Runs marshalled tool calls on a dedicated thread.
///
/// Dropping the executor (or calling [`shutdown`](Self::shutdown)) closes
/// the job channel; the thread finishes the call in progress and exits.
pub struct MainThreadExecutor {
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    timeout: Duration,
}

impl std::fmt::Debug for MainThreadExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MainThreadExecutor")
            .field("running", &self.is_running())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl MainThreadExecutor {
    /// Spawns the executor thread.
    ///
    /// `timeout` bounds how long a caller waits for one marshalled call.
    ///
    /// # Errors
    ///
    /// [`TaskError::ExecutorUnavailable`] if the OS refuses the thread.
    pub fn start(timeout: Duration) -> Result<Self, TaskError> {
        let (sender, receiver) = mpsc::unbounded_channel::<Job>();
        let thread = std::thread::Builder::new()
            .name(THREAD_NAME.to_string())
            .spawn(move || run_jobs(receiver))
            .map_err(|e| TaskError::ExecutorUnavailable(e.to_string()))?;

        tracing::debug!(timeout_ms = millis(timeout), "main-thread executor started");
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            thread: Mutex::new(Some(thread)),
            timeout,
        })
    }

    /// How long a caller waits for one marshalled call.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Returns `true` while the executor thread accepts jobs.
    pub fn is_running(&self) -> bool {
        self.sender
            .lock()
            .as_ref()
            .is_some_and(|sender| !sender.is_closed())
    }

    /// Sends a call to the executor thread and waits for it.
    ///
    /// Never fails: an unavailable executor, a dropped call or an elapsed
    /// timeout all come back as a failure [`ToolResult`]. On timeout the
    /// call keeps running on the executor thread; its result is discarded.
    pub async fn run(&self, tool: Arc<dyn Tool>, params: ToolParams, ctx: ToolContext) -> ToolResult {
        let (reply, response) = oneshot::channel();
        let job = Job {
            tool,
            params,
            ctx,
            reply,
        };

        let sent = match self.sender.lock().as_ref() {
            Some(sender) => sender.send(job).is_ok(),
            None => false,
        };
        if !sent {
            return ToolResult::failure("main-thread executor is not running");
        }

        match tokio::time::timeout(self.timeout, response).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => ToolResult::failure("main-thread call was dropped before completing"),
            Err(_) => {
                tracing::warn!(timeout_ms = millis(self.timeout), "main-thread call timed out");
                ToolResult::failure(format!(
                    "main-thread call timed out after {} ms",
                    millis(self.timeout)
                ))
            },
        }
    }

    /// Closes the job channel. The thread exits after its current call.
    pub fn shutdown(&self) {
        self.sender.lock().take();
        // Detach rather than join: the current call may be long-running.
        self.thread.lock().take();
    }
}

impl Drop for MainThreadExecutor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_jobs(mut receiver: mpsc::UnboundedReceiver<Job>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            tracing::error!(error = %e, "failed to build main-thread runtime");
            return;
        },
    };

    runtime.block_on(async move {
        while let Some(job) = receiver.recv().await {
            let Job {
                tool,
                params,
                ctx,
                reply,
            } = job;
            let name = tool.name().to_string();
            let result = match AssertUnwindSafe(tool.call(params, ctx)).catch_unwind().await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!(tool = %name, "tool panicked on main thread");
                    ToolResult::failure(format!("tool '{name}' panicked"))
                },
            };
            // The caller may have timed out and gone away.
            let _ = reply.send(result);
        }
    });
    tracing::debug!("main-thread executor stopped");
}
