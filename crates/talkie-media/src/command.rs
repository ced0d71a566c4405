//! Inference command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};

/// Builder for the inference tool command line.
///
/// Produces `<program> [script] --driven_audio <audio> --source_image <photo> [extra...]`.
#[derive(Debug, Clone)]
pub struct InferenceCommand {
    /// Executable name or path
    program: String,
    /// Optional leading argument (e.g. the Python entry script)
    script: Option<String>,
    /// Source portrait image
    photo: PathBuf,
    /// Driving audio track
    audio: PathBuf,
    /// Extra arguments appended after the input flags
    extra_args: Vec<String>,
    /// Working directory of the child process
    workdir: Option<PathBuf>,
}

impl InferenceCommand {
    /// Create a new inference command.
    pub fn new(
        program: impl Into<String>,
        photo: impl AsRef<Path>,
        audio: impl AsRef<Path>,
    ) -> Self {
        Self {
            program: program.into(),
            script: None,
            photo: photo.as_ref().to_path_buf(),
            audio: audio.as_ref().to_path_buf(),
            extra_args: Vec::new(),
            workdir: None,
        }
    }

    /// Set the leading script argument. Empty strings are ignored.
    pub fn script(mut self, script: Option<impl Into<String>>) -> Self {
        self.script = script.map(Into::into).filter(|s| !s.is_empty());
        self
    }

    /// Add multiple extra arguments.
    pub fn extra_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extra_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    pub fn workdir(mut self, dir: Option<impl AsRef<Path>>) -> Self {
        self.workdir = dir.map(|d| d.as_ref().to_path_buf());
        self
    }

    /// Executable name or path.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Build the command arguments.
    pub fn build_args(&self) -> Vec<String> {
        let mut args = Vec::with_capacity(5 + self.extra_args.len());

        if let Some(script) = &self.script {
            args.push(script.clone());
        }

        args.push("--driven_audio".to_string());
        args.push(self.audio.to_string_lossy().to_string());
        args.push("--source_image".to_string());
        args.push(self.photo.to_string_lossy().to_string());

        args.extend(self.extra_args.iter().cloned());

        args
    }
}

/// Captured outcome of one inference run.
#[derive(Debug, Clone)]
pub struct ProcessOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl ProcessOutput {
    /// Whether the process exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs inference commands to completion.
#[derive(Debug, Clone, Default)]
pub struct InferenceRunner {
    /// Optional wall-clock limit
    timeout: Option<Duration>,
}

impl InferenceRunner {
    /// Create a new runner without a timeout.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the command and capture its output in full.
    ///
    /// A non-zero exit is not an error here; callers inspect
    /// [`ProcessOutput::exit_code`].
    pub async fn run(&self, cmd: &InferenceCommand) -> MediaResult<ProcessOutput> {
        let program = check_executable(cmd.program())?;
        let args = cmd.build_args();
        debug!("Running inference: {} {}", program.display(), args.join(" "));

        let mut command = Command::new(&program);
        command
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &cmd.workdir {
            command.current_dir(dir);
        }

        let start = Instant::now();
        let output = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, command.output()).await {
                Ok(result) => result,
                Err(_) => {
                    // Dropping the output future kills the child (kill_on_drop).
                    warn!("Inference timed out after {} seconds, killing process", limit.as_secs());
                    return Err(MediaError::Timeout(limit.as_secs()));
                }
            },
            None => command.output().await,
        }
        .map_err(MediaError::SpawnFailed)?;

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration: start.elapsed(),
        })
    }
}

/// Resolve an executable name or path, failing if it cannot be run.
pub fn check_executable(program: &str) -> MediaResult<PathBuf> {
    which::which(program).map_err(|_| MediaError::ExecutableNotFound(program.to_string()))
}
