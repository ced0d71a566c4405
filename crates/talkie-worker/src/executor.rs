//! Task executor.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info, Instrument};

use talkie_models::{QueueEntry, TaskId, TaskStatus};
use talkie_queue::TaskQueue;
use talkie_store::TaskStore;

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::processor::{process_entry, TaskOutcome};

/// Drains the task queue one job at a time.
pub struct TaskExecutor<S: TaskStore> {
    config: Arc<WorkerConfig>,
    store: Arc<S>,
    queue: Arc<TaskQueue>,
    shutdown: watch::Sender<bool>,
}

impl<S: TaskStore> TaskExecutor<S> {
    /// Create a new task executor.
    pub fn new(config: WorkerConfig, store: Arc<S>, queue: Arc<TaskQueue>) -> Self {
        let (shutdown, _) = watch::channel(false);

        Self {
            config: Arc::new(config),
            store,
            queue,
            shutdown,
        }
    }

    /// Run the executor until [`shutdown`](Self::shutdown) is called.
    ///
    /// A job already in progress is finished before the loop exits.
    pub async fn run(&self) {
        info!(
            "Starting task executor (inference: {})",
            self.config.inference_bin
        );

        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            if *shutdown_rx.borrow_and_update() {
                break;
            }

            let entry = tokio::select! {
                biased;
                _ = shutdown_rx.changed() => continue,
                entry = self.queue.dequeue() => entry,
            };

            metrics::set_queue_length(self.queue.len().await);
            self.execute(entry).await;
        }

        info!("Task executor stopped");
    }

    /// Signal the executor to stop.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Execute a single job. Never fails: every error ends in a terminal status.
    async fn execute(&self, entry: QueueEntry) {
        let task_id = entry.task_id.clone();
        let logger = JobLogger::new(&task_id, "talking_head");
        let span = logger.create_span();

        async {
            logger.log_start(&format!(
                "photo={} audio={}",
                entry.photo_path.display(),
                entry.audio_path.display()
            ));
            metrics::record_task_started();

            if let Err(e) = self.store.update_status(&task_id, TaskStatus::Running).await {
                self.store_failed("mark_running", &logger, &WorkerError::from(e));
            }

            let outcome = match self.run_job(entry).await {
                Ok(outcome) => outcome,
                Err(e) => TaskOutcome::Failed {
                    exit_code: None,
                    stderr: e.to_string(),
                },
            };

            self.apply_outcome(&task_id, &outcome, &logger).await;
            metrics::record_task_finished(outcome.status());
        }
        .instrument(span)
        .await
    }

    /// Run the job on its own task so a panic surfaces as a join error.
    async fn run_job(&self, entry: QueueEntry) -> WorkerResult<TaskOutcome> {
        let config = Arc::clone(&self.config);
        let handle = tokio::spawn(async move { process_entry(&config, &entry).await });

        handle.await.map_err(WorkerError::from_join)?
    }

    /// Persist the terminal status for an outcome.
    async fn apply_outcome(&self, task_id: &TaskId, outcome: &TaskOutcome, logger: &JobLogger) {
        let write = match outcome {
            TaskOutcome::Success { result } => {
                logger.log_completion(&format!("result={}", result));
                self.store.complete(task_id, result).await
            }
            TaskOutcome::MissingResult => {
                logger.log_warning("inference exited 0 but printed no result file");
                self.store
                    .update_status(task_id, TaskStatus::MissingResult)
                    .await
            }
            TaskOutcome::Failed { exit_code, stderr } => {
                match exit_code {
                    Some(code) => logger.log_error(&format!(
                        "inference exited with code {}: {}",
                        code,
                        stderr.trim()
                    )),
                    None => logger.log_error(&format!(
                        "inference did not exit normally: {}",
                        stderr.trim()
                    )),
                }
                self.store.update_status(task_id, TaskStatus::Failed).await
            }
        };

        if let Err(e) = write {
            self.store_failed("finish", logger, &WorkerError::from(e));
        }
    }

    fn store_failed(&self, operation: &str, logger: &JobLogger, err: &WorkerError) {
        metrics::record_store_error(operation);
        error!(
            task_id = %logger.task_id(),
            operation,
            "Failed to persist task status: {}", err
        );
    }
}
