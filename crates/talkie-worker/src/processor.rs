//! Single job processing: invoke the inference tool and classify the run.

use talkie_media::{parse_result_file, InferenceCommand, InferenceRunner, ProcessOutput};
use talkie_models::{QueueEntry, TaskStatus};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::metrics;

/// Terminal outcome of one inference run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    /// Exit 0 with a recognizable result line
    Success { result: String },
    /// Exit 0 without a result line
    MissingResult,
    /// Non-zero exit or killed by a signal
    Failed {
        exit_code: Option<i32>,
        stderr: String,
    },
}

impl TaskOutcome {
    /// Terminal status this outcome maps to.
    pub fn status(&self) -> TaskStatus {
        match self {
            TaskOutcome::Success { .. } => TaskStatus::Success,
            TaskOutcome::MissingResult => TaskStatus::MissingResult,
            TaskOutcome::Failed { .. } => TaskStatus::Failed,
        }
    }

    /// Classify captured process output.
    pub fn from_output(output: &ProcessOutput) -> Self {
        if !output.success() {
            return TaskOutcome::Failed {
                exit_code: output.exit_code,
                stderr: output.stderr.clone(),
            };
        }

        match parse_result_file(&output.stdout) {
            Some(result) => TaskOutcome::Success { result },
            None => TaskOutcome::MissingResult,
        }
    }
}

/// Build the inference command for a queue entry.
pub fn build_command(config: &WorkerConfig, entry: &QueueEntry) -> InferenceCommand {
    InferenceCommand::new(&config.inference_bin, &entry.photo_path, &entry.audio_path)
        .script(config.inference_script.clone())
        .extra_args(config.extra_args.iter().cloned())
        .workdir(config.workdir.as_ref())
}

/// Run inference for one entry and classify the result.
///
/// Errors here (missing executable, spawn failure, timeout) are turned
/// into a `failed` status by the executor.
pub async fn process_entry(config: &WorkerConfig, entry: &QueueEntry) -> WorkerResult<TaskOutcome> {
    let command = build_command(config, entry);
    let runner = InferenceRunner::new().with_timeout(config.job_timeout);

    let output = runner.run(&command).await?;
    metrics::record_inference_duration(output.duration.as_secs_f64());

    Ok(TaskOutcome::from_output(&output))
}
