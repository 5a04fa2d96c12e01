//! Integration tests for TaskStore.
//!
//! Covers admission, FIFO claiming, cancellation, sweeps and snapshot
//! consistency under concurrent access. Organized into module blocks per
//! concern.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use toolqueue::store::{CancelOutcome, TaskStore};
use toolqueue::{QueueStats, TaskError, TaskId, TaskRecord, TaskStatus, ToolParams, ToolResult};

fn record(tool: &str) -> TaskRecord {
    TaskRecord::new(tool, ToolParams::new(), Duration::from_millis(100))
}

// ─── Admission Tests ────────────────────────────────────────────────────────

mod admission_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_insert_until_capacity() {
        let store = TaskStore::new(3);
        for i in 0..3 {
            store.insert(record(&format!("t{i}"))).unwrap();
        }
        let err = store.insert(record("overflow")).unwrap_err();
        assert!(matches!(err, TaskError::CapacityExceeded { max_tracked: 3 }));
        assert_eq!(store.active_count(), 3);
    }

    #[test]
    fn test_terminal_records_free_capacity() {
        let store = TaskStore::new(1);
        let id = store.insert(record("a")).unwrap();
        store.claim_next().unwrap();
        store
            .finish(id, TaskStatus::Completed, ToolResult::success("ok", None))
            .unwrap();
        assert!(store.insert(record("b")).is_ok());
        assert_eq!(
            store.stats(),
            QueueStats {
                pending: 1,
                running: 0,
                completed: 1
            }
        );
    }

    #[test]
    fn test_insert_rejects_non_pending_record() {
        let store = TaskStore::new(5);
        let mut rec = record("a");
        rec.status = TaskStatus::Running;
        assert!(matches!(
            store.insert(rec),
            Err(TaskError::InvalidTransition { .. })
        ));
        assert_eq!(store.stats().total(), 0);
    }
}

// ─── Claim Tests ────────────────────────────────────────────────────────────

mod claim_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_claim_is_fifo() {
        let store = TaskStore::new(10);
        let ids: Vec<TaskId> = (0..4).map(|i| store.insert(record(&format!("t{i}"))).unwrap()).collect();
        let claimed: Vec<TaskId> = std::iter::from_fn(|| store.claim_next())
            .map(|c| c.record.task_id)
            .collect();
        assert_eq!(claimed, ids);
    }

    #[test]
    fn test_claim_sets_started_at() {
        let store = TaskStore::new(10);
        let id = store.insert(record("a")).unwrap();
        let claimed = store.claim_next().unwrap();
        assert_eq!(claimed.record.status, TaskStatus::Running);
        assert!(claimed.record.started_at.is_some());
        assert_eq!(store.find(id).unwrap().started_at, claimed.record.started_at);
    }

    #[test]
    fn test_cancelled_identities_are_discarded() {
        let store = TaskStore::new(10);
        let a = store.insert(record("a")).unwrap();
        let b = store.insert(record("b")).unwrap();
        let c = store.insert(record("c")).unwrap();
        store.request_cancel(a).unwrap();
        store.request_cancel(c).unwrap();
        assert_eq!(store.queued_len(), 3);

        assert_eq!(store.claim_next().unwrap().record.task_id, b);
        assert!(store.claim_next().is_none());
        assert!(!store.has_queued());
    }

    #[test]
    fn test_evicted_identities_are_discarded() {
        let store = TaskStore::new(10);
        let a = store.insert(record("a")).unwrap();
        store.request_cancel(a).unwrap();
        store.remove(a).unwrap();
        assert!(store.claim_next().is_none());
    }
}

// ─── Remove Tests ───────────────────────────────────────────────────────────

mod remove_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_remove_refuses_running_record() {
        let store = TaskStore::new(10);
        let id = store.insert(record("a")).unwrap();
        store.claim_next().unwrap();

        match store.remove(id) {
            Err(TaskError::NotReady { status, .. }) => assert_eq!(status, TaskStatus::Running),
            other => panic!("Expected NotReady, got {other:?}"),
        }
        assert_eq!(store.find(id).unwrap().status, TaskStatus::Running);

        // The worker's final write still lands.
        store
            .finish(id, TaskStatus::Completed, ToolResult::success("ok", None))
            .unwrap();
        assert_eq!(store.remove(id).unwrap().status, TaskStatus::Completed);
        assert!(store.find(id).is_none());
    }

    #[test]
    fn test_remove_refuses_pending_record() {
        let store = TaskStore::new(10);
        let id = store.insert(record("a")).unwrap();
        assert!(matches!(
            store.remove(id),
            Err(TaskError::NotReady {
                status: TaskStatus::Pending,
                ..
            })
        ));
        assert_eq!(store.claim_next().unwrap().record.task_id, id);
    }

    #[test]
    fn test_remove_unknown() {
        let store = TaskStore::new(10);
        assert!(matches!(
            store.remove(TaskId::new()),
            Err(TaskError::NotFound { .. })
        ));
    }
}

// ─── Cancel Tests ───────────────────────────────────────────────────────────

mod cancel_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_cancel_pending_is_immediate() {
        let store = TaskStore::new(10);
        let id = store.insert(record("a")).unwrap();
        assert_eq!(store.request_cancel(id).unwrap(), CancelOutcome::Cancelled);

        let rec = store.find(id).unwrap();
        assert_eq!(rec.status, TaskStatus::Cancelled);
        assert!(rec.cancellation_requested);
        assert!(rec.started_at.is_none());
        assert!(rec.completed_at.is_some());
        assert_eq!(rec.result.unwrap().message, "task cancelled");
    }

    #[test]
    fn test_cancel_unknown() {
        let store = TaskStore::new(10);
        let id = TaskId::new();
        assert!(matches!(
            store.request_cancel(id),
            Err(TaskError::NotFound { task_id }) if task_id == id
        ));
    }

    #[test]
    fn test_cancel_twice_reports_terminal() {
        let store = TaskStore::new(10);
        let id = store.insert(record("a")).unwrap();
        store.request_cancel(id).unwrap();
        match store.request_cancel(id) {
            Err(TaskError::AlreadyTerminal { status, .. }) => {
                assert_eq!(status, TaskStatus::Cancelled)
            },
            other => panic!("Expected AlreadyTerminal, got {other:?}"),
        }
    }

    #[test]
    fn test_cancel_all_flags_active_records() {
        let store = TaskStore::new(10);
        let finished = store.insert(record("a")).unwrap();
        let running = store.insert(record("b")).unwrap();
        let waiting = store.insert(record("c")).unwrap();

        store.claim_next().unwrap();
        store
            .finish(finished, TaskStatus::Completed, ToolResult::success("ok", None))
            .unwrap();
        store.claim_next().unwrap();

        assert_eq!(store.request_cancel_all(), 2);
        assert!(store.is_cancel_requested(running));
        assert!(store.is_cancel_requested(waiting));
        assert!(!store.is_cancel_requested(finished));
        assert_eq!(store.find(running).unwrap().status, TaskStatus::Running);
        assert_eq!(store.find(waiting).unwrap().status, TaskStatus::Pending);

        // Already-flagged records are not counted again.
        assert_eq!(store.request_cancel_all(), 0);
    }
}

// ─── Sweep Tests ────────────────────────────────────────────────────────────

mod sweep_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_timeout_sweep_ignores_pending_and_fresh() {
        let store = TaskStore::new(10);
        let fresh = store
            .insert(TaskRecord::new("b", ToolParams::new(), Duration::from_secs(60)))
            .unwrap();
        let pending = store.insert(record("a")).unwrap();
        store.claim_next().unwrap();

        let later = Utc::now() + chrono::Duration::seconds(1);
        assert!(store.sweep_timeouts(later).is_empty());
        assert_eq!(store.find(fresh).unwrap().status, TaskStatus::Running);
        assert_eq!(store.find(pending).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn test_timeout_result_names_timeout() {
        let store = TaskStore::new(10);
        let id = store.insert(record("slow")).unwrap();
        store.claim_next().unwrap();

        let later = Utc::now() + chrono::Duration::seconds(1);
        assert_eq!(store.sweep_timeouts(later), vec![id]);
        let rec = store.find(id).unwrap();
        assert_eq!(rec.status, TaskStatus::TimedOut);
        assert_eq!(rec.result.unwrap().message, "task timed out after 100 ms");
        assert!(rec.progress.is_none());
    }

    #[test]
    fn test_retention_sweep_prunes_stale_pending_entries() {
        let store = TaskStore::new(10);
        let running = store.insert(record("busy")).unwrap();
        store.claim_next().unwrap();
        for _ in 0..5 {
            let id = store.insert(record("churn")).unwrap();
            store.request_cancel(id).unwrap();
        }
        let waiting = store.insert(record("next")).unwrap();
        assert_eq!(store.queued_len(), 6);

        assert_eq!(store.sweep_expired(Utc::now(), Duration::from_secs(60)), 0);
        assert_eq!(store.queued_len(), 1);
        assert_eq!(store.find(running).unwrap().status, TaskStatus::Running);
        assert_eq!(store.claim_next().unwrap().record.task_id, waiting);
    }

    #[test]
    fn test_retention_sweep_never_evicts_running() {
        let store = TaskStore::new(10);
        let id = store.insert(record("a")).unwrap();
        store.claim_next().unwrap();
        let later = Utc::now() + chrono::Duration::hours(1);
        assert_eq!(store.sweep_expired(later, Duration::ZERO), 0);
        assert!(store.find(id).is_some());
    }

    #[test]
    fn test_retention_sweep_keeps_young_and_active() {
        let store = TaskStore::new(10);
        let old = store.insert(record("old")).unwrap();
        let active = store.insert(record("active")).unwrap();
        store.request_cancel(old).unwrap();

        let now = Utc::now();
        assert_eq!(store.sweep_expired(now, Duration::from_secs(60)), 0);
        let later = now + chrono::Duration::seconds(61);
        assert_eq!(store.sweep_expired(later, Duration::from_secs(60)), 1);
        assert!(store.find(old).is_none());
        assert!(store.find(active).is_some());
    }
}

// ─── Concurrency Tests ──────────────────────────────────────────────────────

mod concurrency_tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_terminal_status_always_has_result() {
        let store = Arc::new(TaskStore::new(1_000));
        let ids: Vec<TaskId> = (0..200).map(|_| store.insert(record("x")).unwrap()).collect();

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                while let Some(claimed) = store.claim_next() {
                    let _ = store.finish(
                        claimed.record.task_id,
                        TaskStatus::Completed,
                        ToolResult::success("ok", None),
                    );
                    tokio::task::yield_now().await;
                }
            })
        };

        let reader = {
            let store = store.clone();
            let ids = ids.clone();
            tokio::spawn(async move {
                for _ in 0..50 {
                    for id in &ids {
                        let rec = store.find(*id).unwrap();
                        assert_eq!(rec.is_terminal(), rec.result.is_some());
                        assert_eq!(rec.is_terminal(), rec.completed_at.is_some());
                    }
                    tokio::task::yield_now().await;
                }
            })
        };

        writer.await.unwrap();
        reader.await.unwrap();
        assert_eq!(store.stats().completed, 200);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_inserts_respect_capacity() {
        let store = Arc::new(TaskStore::new(50));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                (0..20).filter(|_| store.insert(record("x")).is_ok()).count()
            }));
        }
        let mut accepted = 0;
        for handle in handles {
            accepted += handle.await.unwrap();
        }
        assert_eq!(accepted, 50);
        assert_eq!(store.active_count(), 50);
    }
}
