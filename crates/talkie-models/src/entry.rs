//! Queue entries.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::TaskId;

/// A job waiting in the live queue.
///
/// Entries are never persisted; they pair 1:1 with a `pending` record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEntry {
    pub task_id: TaskId,
    /// Source portrait image
    pub photo_path: PathBuf,
    /// Driving audio track
    pub audio_path: PathBuf,
}

impl QueueEntry {
    pub fn new(
        task_id: TaskId,
        photo_path: impl Into<PathBuf>,
        audio_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            task_id,
            photo_path: photo_path.into(),
            audio_path: audio_path.into(),
        }
    }
}
