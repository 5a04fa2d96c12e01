//! JSON round trips through TaskRouter and the registered task tools.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use common::{base_registry, eventually, fast_config, params, started_queue, Gate};
use toolqueue::router::error_object;
use toolqueue::{TaskError, TaskId, TaskRouter, Tool, ToolContext, TASK_METHODS};

const WAIT: Duration = Duration::from_secs(5);

fn task_id(response: &Value) -> TaskId {
    response["task_id"].as_str().unwrap().parse().unwrap()
}

// ─── Method Dispatch ────────────────────────────────────────────────────────

mod dispatch {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_submit_poll_result_flow() {
        let queue = started_queue(base_registry(), fast_config());
        let router = TaskRouter::new(&queue);

        let submitted = router
            .handle(
                "task_submit",
                json!({"tool_name": "echo", "params": {"asset": "hero.png"}}),
            )
            .unwrap();
        let id = task_id(&submitted);
        queue.wait_for_terminal(id, WAIT).await.unwrap();

        let status = router
            .handle("task_status", json!({"task_id": id.to_string()}))
            .unwrap();
        assert_eq!(status["status"], "completed");
        assert_eq!(status["tool_name"], "echo");
        assert_eq!(status["progress"], 100);
        assert_eq!(status["cancellation_requested"], false);

        let result = router
            .handle("task_result", json!({"task_id": id.to_string()}))
            .unwrap();
        assert_eq!(
            result,
            json!({"success": true, "message": "echoed", "data": {"asset": "hero.png"}})
        );
        queue.stop().await;
    }

    #[tokio::test]
    async fn test_result_before_terminal_is_not_ready() {
        let registry = base_registry();
        let gate = Gate::new();
        gate.register(&registry, "gate");
        let queue = started_queue(registry, fast_config());
        let router = TaskRouter::new(&queue);

        let id = task_id(
            &router
                .handle("task_submit", json!({"tool_name": "gate"}))
                .unwrap(),
        );
        let err = router
            .handle("task_result", json!({"task_id": id.to_string()}))
            .unwrap_err();
        assert!(matches!(err, TaskError::NotReady { .. }));
        assert_eq!(err.error_code(), -32602);

        gate.release(1);
        queue.wait_for_terminal(id, WAIT).await.unwrap();
        queue.stop().await;
    }

    #[tokio::test]
    async fn test_submit_timeout_is_forwarded() {
        let queue = started_queue(base_registry(), fast_config());
        let router = TaskRouter::new(&queue);

        let id = task_id(
            &router
                .handle(
                    "task_submit",
                    json!({"tool_name": "sleep", "params": {"ms": 400}, "timeout_ms": 50}),
                )
                .unwrap(),
        );
        queue.wait_for_terminal(id, WAIT).await.unwrap();

        let status = router
            .handle("task_status", json!({"task_id": id.to_string()}))
            .unwrap();
        assert_eq!(status["status"], "timed_out");
        queue.stop().await;
    }

    #[test]
    fn test_methods_match_constants() {
        let queue = Arc::new(toolqueue::TaskQueue::new(base_registry(), fast_config()));
        let router = TaskRouter::new(&queue);
        assert_eq!(router.methods(), TASK_METHODS);
        assert_eq!(
            TASK_METHODS.to_vec(),
            vec![
                "task_submit",
                "task_status",
                "task_result",
                "task_cancel",
                "task_list",
                "task_stats"
            ]
        );
    }
}

// ─── Cancel and List ────────────────────────────────────────────────────────

mod cancel_and_list {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_cancel_responses() {
        let registry = base_registry();
        let gate = Gate::new();
        gate.register(&registry, "gate");
        let queue = started_queue(registry, fast_config().with_max_concurrent_tasks(1));
        let router = TaskRouter::new(&queue);

        let running = task_id(&router.handle("task_submit", json!({"tool_name": "gate"})).unwrap());
        let waiting = task_id(&router.handle("task_submit", json!({"tool_name": "echo"})).unwrap());
        assert!(eventually(WAIT, || gate.entered() == 1).await);

        let pending_cancel = router
            .handle("task_cancel", json!({"task_id": waiting.to_string()}))
            .unwrap();
        assert_eq!(pending_cancel, json!({"cancelled": true}));

        let running_cancel = router
            .handle("task_cancel", json!({"task_id": running.to_string()}))
            .unwrap();
        assert_eq!(running_cancel["cancelled"], true);
        assert!(running_cancel["reason"].is_string());

        let again = router
            .handle("task_cancel", json!({"task_id": waiting.to_string()}))
            .unwrap();
        assert_eq!(
            again,
            json!({"cancelled": false, "reason": "task already cancelled"})
        );

        gate.release(1);
        queue.wait_for_terminal(running, WAIT).await.unwrap();
        queue.stop().await;
    }

    #[tokio::test]
    async fn test_cancel_unknown_task_is_error() {
        let queue = started_queue(base_registry(), fast_config());
        let router = TaskRouter::new(&queue);
        let err = router
            .handle("task_cancel", json!({"task_id": TaskId::new().to_string()}))
            .unwrap_err();
        assert!(matches!(err, TaskError::NotFound { .. }));
        queue.stop().await;
    }

    #[tokio::test]
    async fn test_list_respects_filters() {
        let queue = Arc::new(toolqueue::TaskQueue::new(base_registry(), fast_config()));
        let router = TaskRouter::new(&queue);
        let ids: Vec<TaskId> = (0..4)
            .map(|_| task_id(&router.handle("task_submit", json!({"tool_name": "echo"})).unwrap()))
            .collect();
        queue.cancel(ids[0]).unwrap();

        let active = router.handle("task_list", json!({})).unwrap();
        assert_eq!(active["count"], 3);
        assert_eq!(active["tasks"][0]["task_id"], ids[3].to_string());

        let all = router
            .handle("task_list", json!({"include_completed": true, "limit": 2}))
            .unwrap();
        assert_eq!(all["count"], 2);

        let everything = router
            .handle("task_list", json!({"include_completed": true}))
            .unwrap();
        assert_eq!(everything["count"], 4);
        assert_eq!(everything["tasks"][3]["status"], "cancelled");

        let stats = router.handle("task_stats", Value::Null).unwrap();
        assert_eq!(stats, json!({"pending": 3, "running": 0, "completed": 1}));
    }
}

// ─── Errors ─────────────────────────────────────────────────────────────────

mod errors {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_codes() {
        let queue = Arc::new(toolqueue::TaskQueue::new(base_registry(), fast_config()));
        let router = TaskRouter::new(&queue);

        let unknown_tool = router
            .handle("task_submit", json!({"tool_name": "unknown_tool"}))
            .unwrap_err();
        assert_eq!(
            error_object(&unknown_tool),
            json!({"code": -32602, "message": "tool not found: unknown_tool"})
        );

        let unknown_method = router.handle("task_resume", json!({})).unwrap_err();
        assert_eq!(error_object(&unknown_method)["code"], -32601);

        let missing = router.handle("task_submit", json!({})).unwrap_err();
        assert!(matches!(missing, TaskError::InvalidParams(_)));
    }

    #[test]
    fn test_capacity_error_code() {
        let queue = Arc::new(toolqueue::TaskQueue::new(
            base_registry(),
            fast_config().with_max_tracked_tasks(1),
        ));
        let router = TaskRouter::new(&queue);
        router
            .handle("task_submit", json!({"tool_name": "echo"}))
            .unwrap();
        let err = router
            .handle("task_submit", json!({"tool_name": "echo"}))
            .unwrap_err();
        assert!(err.is_admission_error());
        assert_eq!(err.error_code(), -32602);
    }
}

// ─── Registered Task Tools ──────────────────────────────────────────────────

mod task_tools {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_tools_wrap_router_methods() {
        let queue = started_queue(base_registry(), fast_config());
        queue.register_task_tools();
        let registry = queue.registry();

        let submitted = registry
            .execute(
                "task_submit",
                params(json!({"tool_name": "echo", "params": {"n": 1}})),
            )
            .await
            .unwrap();
        assert!(submitted.success);
        let id = task_id(submitted.data.as_ref().unwrap());
        queue.wait_for_terminal(id, WAIT).await.unwrap();

        let result = registry
            .execute("task_result", params(json!({"task_id": id.to_string()})))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.data.unwrap()["data"], json!({"n": 1}));
        queue.stop().await;
    }

    #[tokio::test]
    async fn test_tool_errors_become_failed_results() {
        let queue = started_queue(base_registry(), fast_config());
        queue.register_task_tools();

        let tool = queue.registry().get("task_status").unwrap();
        assert!(tool.description().is_some());
        let result = tool
            .call(
                params(json!({"task_id": TaskId::new().to_string()})),
                ToolContext::detached(),
            )
            .await;
        assert!(!result.success);
        assert_eq!(result.data.unwrap()["code"], -32602);
        queue.stop().await;
    }

    #[tokio::test]
    async fn test_task_tools_can_be_queued() {
        let queue = started_queue(base_registry(), fast_config());
        queue.register_task_tools();

        let id = queue
            .submit("task_stats", toolqueue::ToolParams::new(), None)
            .unwrap();
        let record = queue.wait_for_terminal(id, WAIT).await.unwrap();
        assert_eq!(record.status, toolqueue::TaskStatus::Completed);
        let stats = queue.get_result(id).unwrap().data.unwrap();
        assert_eq!(stats["running"], 1);
        queue.stop().await;
    }
}
