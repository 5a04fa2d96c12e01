//! Default limits and tool-call method names for the task queue.

/// Default maximum number of tasks executing at once.
pub const DEFAULT_MAX_CONCURRENT_TASKS: usize = 4;

/// Default maximum number of non-terminal tasks tracked at once.
pub const DEFAULT_MAX_TRACKED_TASKS: usize = 100;

/// Default time a terminal task stays queryable, in seconds.
pub const DEFAULT_RESULT_RETENTION_SECS: u64 = 300;

/// Default per-task timeout, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 120_000;

/// Default interval between cleanup and timeout sweeps, in seconds.
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 60;

/// Default upper bound on how long the scheduler loop sleeps between wakes.
pub const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;

/// Default time a worker waits for a main-thread tool call to finish.
pub const DEFAULT_MAIN_THREAD_TIMEOUT_MS: u64 = 30_000;

/// Default page size for `task_list` when the caller gives no limit.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Router method: submit a tool invocation.
pub const METHOD_TASK_SUBMIT: &str = "task_submit";

/// Router method: point-in-time status snapshot.
pub const METHOD_TASK_STATUS: &str = "task_status";

/// Router method: result of a terminal task.
pub const METHOD_TASK_RESULT: &str = "task_result";

/// Router method: cancel a pending or running task.
pub const METHOD_TASK_CANCEL: &str = "task_cancel";

/// Router method: list tracked tasks.
pub const METHOD_TASK_LIST: &str = "task_list";

/// Router method: pending/running/completed counts.
pub const METHOD_TASK_STATS: &str = "task_stats";

/// All router methods, in registration order.
pub const TASK_METHODS: &[&str] = &[
    METHOD_TASK_SUBMIT,
    METHOD_TASK_STATUS,
    METHOD_TASK_RESULT,
    METHOD_TASK_CANCEL,
    METHOD_TASK_LIST,
    METHOD_TASK_STATS,
];
