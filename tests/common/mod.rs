//! Shared tools and helpers for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::Semaphore;

use toolqueue::tool::FnTool;
use toolqueue::{QueueConfig, TaskQueue, ToolParams, ToolRegistry, ToolResult};

/// Config with a short tick and a sweep on every wake.
pub fn fast_config() -> QueueConfig {
    QueueConfig::default()
        .with_tick_interval_ms(10)
        .with_cleanup_interval_secs(0)
}

/// Builds a parameter bag from a JSON object literal.
pub fn params(value: Value) -> ToolParams {
    match value {
        Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    }
}

/// Registry preloaded with `echo`, `fail`, `panic` and `sleep`.
///
/// `sleep` waits `params.ms` milliseconds and ignores cancellation.
pub fn base_registry() -> Arc<ToolRegistry> {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(Arc::new(FnTool::new("echo", |params, _ctx| async move {
        ToolResult::success("echoed", Some(Value::Object(params)))
    })));
    registry.register(Arc::new(FnTool::new("fail", |_params, _ctx| async {
        ToolResult::failure("asset not found")
    })));
    registry.register(Arc::new(FnTool::new("panic", |_params, _ctx| async {
        if true {
            panic!("capability crashed");
        }
        ToolResult::success("unreachable", None)
    })));
    registry.register(Arc::new(FnTool::new("sleep", |params, _ctx| async move {
        let ms = params.get("ms").and_then(Value::as_u64).unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(ms)).await;
        ToolResult::success("slept", Some(json!({ "ms": ms })))
    })));
    registry
}

/// A tool that blocks until the test releases it, ignoring cancellation.
#[derive(Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
    pub entered: Arc<AtomicUsize>,
    pub finished: Arc<AtomicBool>,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
            entered: Arc::new(AtomicUsize::new(0)),
            finished: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Registers the gate as tool `name`.
    pub fn register(&self, registry: &ToolRegistry, name: &str) {
        let gate = self.clone();
        registry.register(Arc::new(FnTool::new(name, move |_params, ctx| {
            let gate = gate.clone();
            async move {
                gate.entered.fetch_add(1, Ordering::SeqCst);
                ctx.report_progress(50);
                if let Ok(permit) = gate.permits.acquire().await {
                    permit.forget();
                }
                gate.finished.store(true, Ordering::SeqCst);
                ToolResult::success("released", None)
            }
        })));
    }

    /// Lets `n` blocked calls return.
    pub fn release(&self, n: usize) {
        self.permits.add_permits(n);
    }

    pub fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }
}

/// Polls `condition` every 5ms until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// A started queue over `registry` with `config`.
pub fn started_queue(registry: Arc<ToolRegistry>, config: QueueConfig) -> Arc<TaskQueue> {
    let queue = Arc::new(TaskQueue::new(registry, config));
    queue.start().unwrap();
    queue
}
