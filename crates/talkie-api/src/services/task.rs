//! Task submission and status lookup.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use talkie_models::{QueueEntry, TaskId, TaskStatus};
use talkie_queue::TaskQueue;
use talkie_store::TaskStore;

use crate::error::ApiResult;

/// Status payload for `GET /status/{task_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskStatusView {
    pub id: TaskId,
    pub result: Option<String>,
    pub status: TaskStatus,
    /// Queue position while pending and still queued
    pub index: Option<usize>,
}

/// Couples the task store with the live queue.
pub struct TaskService<S: TaskStore> {
    store: Arc<S>,
    queue: Arc<TaskQueue>,
}

impl<S: TaskStore> Clone for TaskService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            queue: Arc::clone(&self.queue),
        }
    }
}

impl<S: TaskStore> TaskService<S> {
    pub fn new(store: Arc<S>, queue: Arc<TaskQueue>) -> Self {
        Self { store, queue }
    }

    /// Persist a `pending` record, then enqueue the job.
    ///
    /// The record is written first so a status poll never misses a task
    /// the worker may already be running. Returns the queue position.
    pub async fn submit(
        &self,
        task_id: TaskId,
        photo_path: PathBuf,
        audio_path: PathBuf,
    ) -> ApiResult<usize> {
        self.store.create(&task_id, TaskStatus::Pending).await?;

        let position = self
            .queue
            .enqueue(QueueEntry::new(task_id.clone(), photo_path, audio_path))
            .await;

        talkie_worker::metrics::set_queue_length(self.queue.len().await);
        info!(task_id = %task_id, position, "Task queued");
        Ok(position)
    }

    /// Current record plus queue position, `None` when the id is unknown.
    pub async fn status(&self, task_id: &TaskId) -> ApiResult<Option<TaskStatusView>> {
        let Some(record) = self.store.get(task_id).await? else {
            return Ok(None);
        };

        let index = if record.status == TaskStatus::Pending {
            self.queue.position_of(task_id).await
        } else {
            None
        };

        Ok(Some(TaskStatusView {
            id: record.id,
            result: record.result,
            status: record.status,
            index,
        }))
    }
}

#[cfg(test)]
mod tests {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use talkie_store::SqliteTaskStore;

    use super::*;

    async fn service() -> (TaskService<SqliteTaskStore>, Arc<SqliteTaskStore>, Arc<TaskQueue>) {
        let store = Arc::new(SqliteTaskStore::in_memory().await.unwrap());
        let queue = Arc::new(TaskQueue::new());
        (
            TaskService::new(Arc::clone(&store), Arc::clone(&queue)),
            store,
            queue,
        )
    }

    #[tokio::test]
    async fn test_submit_reports_positions() {
        let (service, _, _) = service().await;

        for expected in 0..3 {
            let position = service
                .submit(TaskId::new(), "p.png".into(), "a.wav".into())
                .await
                .unwrap();
            assert_eq!(position, expected);
        }
    }

    #[tokio::test]
    async fn test_submit_updates_queue_gauge() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        let _guard = ::metrics::set_default_local_recorder(&recorder);
        let (service, _, _) = service().await;

        for _ in 0..2 {
            service
                .submit(TaskId::new(), "p.png".into(), "a.wav".into())
                .await
                .unwrap();
        }

        assert!(handle.render().contains("talkie_queue_length 2"));
    }

    #[tokio::test]
    async fn test_status_index_tracks_queue() {
        let (service, store, queue) = service().await;
        let first = TaskId::from("first");
        let second = TaskId::from("second");
        service
            .submit(first.clone(), "p.png".into(), "a.wav".into())
            .await
            .unwrap();
        service
            .submit(second.clone(), "p.png".into(), "a.wav".into())
            .await
            .unwrap();

        let view = service.status(&second).await.unwrap().unwrap();
        assert_eq!(view.status, TaskStatus::Pending);
        assert_eq!(view.index, Some(1));

        // Worker picks up the head
        queue.try_dequeue().await.unwrap();
        store
            .update_status(&first, TaskStatus::Running)
            .await
            .unwrap();

        let view = service.status(&first).await.unwrap().unwrap();
        assert_eq!(view.status, TaskStatus::Running);
        assert_eq!(view.index, None);
        assert_eq!(service.status(&second).await.unwrap().unwrap().index, Some(0));
    }

    #[tokio::test]
    async fn test_pending_without_queue_entry_has_no_index() {
        let (service, store, _) = service().await;
        let orphan = TaskId::from("orphan");
        store.create(&orphan, TaskStatus::Pending).await.unwrap();

        let view = service.status(&orphan).await.unwrap().unwrap();
        assert_eq!(view.index, None);
    }

    #[tokio::test]
    async fn test_status_unknown() {
        let (service, _, _) = service().await;
        assert!(service.status(&TaskId::from("nope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_submit_fails() {
        let (service, _, queue) = service().await;
        let id = TaskId::from("dup");
        service
            .submit(id.clone(), "p.png".into(), "a.wav".into())
            .await
            .unwrap();

        assert!(service
            .submit(id, "p.png".into(), "a.wav".into())
            .await
            .is_err());
        assert_eq!(queue.len().await, 1);
    }
}
