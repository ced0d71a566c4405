//! Submission, status and result handlers.

use std::io::ErrorKind;
use std::path::PathBuf;

use axum::body::{Body, Bytes};
use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::{Extension, Json};
use serde::Serialize;
use tracing::{info, warn};

use talkie_models::TaskId;

use crate::auth::TicketIdentity;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::{
    allowed_extension, is_valid_result_name, result_content_type, AUDIO_EXTENSIONS,
    PHOTO_EXTENSIONS,
};
use crate::services::TaskStatusView;
use crate::state::AppState;

/// Response for an accepted submission.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub task_id: TaskId,
}

/// One validated multipart file.
struct UploadedFile {
    extension: String,
    data: Bytes,
}

/// Accept a photo and an audio track and queue a generation job.
///
/// Nothing is written or queued unless both parts pass validation.
pub async fn upload(
    State(state): State<AppState>,
    Extension(identity): Extension<TicketIdentity>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let mut photo: Option<UploadedFile> = None;
    let mut audio: Option<UploadedFile> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read multipart field: {e}")))?
    {
        let (slot, allowed) = match field.name() {
            Some("photo") => (&mut photo, PHOTO_EXTENSIONS),
            Some("audio") => (&mut audio, AUDIO_EXTENSIONS),
            _ => continue,
        };

        let file_name = field.file_name().unwrap_or_default().to_string();
        if file_name.is_empty() {
            return Err(ApiError::bad_request("No selected file"));
        }
        let extension = allowed_extension(&file_name, allowed)
            .ok_or_else(|| ApiError::bad_request(format!("File type not allowed: {file_name}")))?;

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {e}")))?;

        *slot = Some(UploadedFile { extension, data });
    }

    let (Some(photo), Some(audio)) = (photo, audio) else {
        return Err(ApiError::bad_request("Both photo and audio files are required"));
    };

    let task_id = TaskId::new();
    let upload_dir = &state.config.upload_dir;
    let photo_path = upload_dir.join(format!("{}-photo.{}", task_id, photo.extension));
    let audio_path = upload_dir.join(format!("{}-audio.{}", task_id, audio.extension));

    save_uploads(&[(&photo_path, &photo.data), (&audio_path, &audio.data)]).await?;

    let position = match state
        .tasks
        .submit(task_id.clone(), photo_path.clone(), audio_path.clone())
        .await
    {
        Ok(position) => position,
        Err(e) => {
            remove_files(&[&photo_path, &audio_path]).await;
            return Err(e);
        }
    };

    metrics::record_task_submitted((photo.data.len() + audio.data.len()) as u64);
    info!(
        task_id = %task_id,
        openid = %identity.openid,
        position,
        "Accepted upload"
    );

    Ok((StatusCode::ACCEPTED, Json(UploadResponse { task_id })))
}

/// Write every file, removing the ones already written if any write fails.
async fn save_uploads(files: &[(&PathBuf, &Bytes)]) -> ApiResult<()> {
    for (i, (path, data)) in files.iter().enumerate() {
        if let Err(e) = tokio::fs::write(path, data).await {
            let written: Vec<&PathBuf> = files[..i].iter().map(|(p, _)| *p).collect();
            remove_files(&written).await;
            return Err(e.into());
        }
    }
    Ok(())
}

async fn remove_files(paths: &[&PathBuf]) {
    for path in paths {
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!("Failed to remove upload {}: {}", path.display(), e);
        }
    }
}

/// Report a task's status, result and queue position.
pub async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> ApiResult<Json<TaskStatusView>> {
    let task_id = TaskId::from(task_id);

    state
        .tasks
        .status(&task_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Task not found"))
}

/// Download a finished video from the result directory.
pub async fn download_result(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> ApiResult<Response> {
    if !is_valid_result_name(&file_name) {
        return Err(ApiError::bad_request("Invalid file name"));
    }

    let path = state.config.result_dir.join(&file_name);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(ApiError::not_found("Result not found"));
        }
        Err(e) => return Err(e.into()),
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, result_content_type(&file_name))
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        )
        .header(header::CONTENT_LENGTH, bytes.len())
        .body(Body::from(bytes))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}
