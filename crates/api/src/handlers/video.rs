//! Handlers for video upload and session initialization.

use std::path::Path;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use maskflow_core::error::CoreError;
use maskflow_core::ffmpeg;
use maskflow_core::types::SessionId;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Supported video file extensions for upload.
const SUPPORTED_VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "mov"];

/// Response for a successful upload.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub session_id: SessionId,
    pub frame_count: u32,
}

/// POST /api/v1/upload-video
///
/// Accepts a multipart body with a required `file` field, persists the raw
/// bytes, extracts the frame sequence, and registers the session. A decode
/// failure registers nothing and removes partial output.
pub async fn upload_video(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<(StatusCode, Json<UploadResponse>)> {
    let mut file_data: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        if field.name() == Some("file") {
            let filename = field.file_name().unwrap_or("upload.mp4").to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(e.to_string()))?;
            file_data = Some((filename, data.to_vec()));
        }
        // Unknown fields are ignored.
    }

    let (filename, data) =
        file_data.ok_or_else(|| AppError::BadRequest("Missing required 'file' field".into()))?;

    if data.is_empty() {
        return Err(AppError::BadRequest("Uploaded file is empty".into()));
    }

    let ext = filename.rsplit('.').next().unwrap_or("").to_lowercase();
    if !SUPPORTED_VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Unsupported video extension '{ext}'. Supported: {SUPPORTED_VIDEO_EXTENSIONS:?}"
        )));
    }

    let session_id = SessionId::new();
    let video_path = state.layout.video_path(session_id);
    tokio::fs::write(&video_path, &data)
        .await
        .map_err(CoreError::from)?;

    match probe_and_extract(&state, session_id, &video_path).await {
        Ok(frame_count) => Ok((
            StatusCode::CREATED,
            Json(UploadResponse {
                session_id,
                frame_count,
            }),
        )),
        Err(err) => {
            cleanup_partial_upload(&state, session_id).await;
            Err(err)
        }
    }
}

/// Probe the uploaded file, extract its frames, and register the session.
async fn probe_and_extract(
    state: &AppState,
    session_id: SessionId,
    video_path: &Path,
) -> AppResult<u32> {
    let probe = ffmpeg::probe_video(video_path)
        .await
        .map_err(CoreError::from)?;

    if !ffmpeg::has_video_stream(&probe) {
        return Err(CoreError::from(ffmpeg::FfmpegError::NoVideoStream).into());
    }

    let (width, height) = ffmpeg::parse_resolution(&probe);
    tracing::info!(
        session_id = %session_id,
        codec = %ffmpeg::parse_video_codec(&probe),
        width,
        height,
        estimated_frames = ffmpeg::parse_total_frames(&probe),
        "Video probe succeeded"
    );

    let frame_dir = state.layout.frame_dir(session_id);
    let frame_count = ffmpeg::extract_frames(video_path, &frame_dir)
        .await
        .map_err(CoreError::from)?;

    state
        .registry
        .register(session_id, frame_dir, frame_count)
        .await;

    tracing::info!(session_id = %session_id, frame_count, "Upload complete");
    Ok(frame_count)
}

/// Remove whatever the failed upload left behind. Best-effort.
async fn cleanup_partial_upload(state: &AppState, session_id: SessionId) {
    let video_path = state.layout.video_path(session_id);
    if let Err(e) = tokio::fs::remove_file(&video_path).await {
        tracing::warn!(session_id = %session_id, error = %e, "Failed to remove video after decode failure");
    }
    let frame_dir = state.layout.frame_dir(session_id);
    if frame_dir.is_dir() {
        if let Err(e) = tokio::fs::remove_dir_all(&frame_dir).await {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to remove frames after decode failure");
        }
    }
}

/// Request body for session initialization.
#[derive(Debug, Deserialize)]
pub struct InitVideoRequest {
    pub session_id: SessionId,
}

/// Response body for session initialization.
#[derive(Debug, Serialize)]
pub struct InitVideoResponse {
    pub status: &'static str,
}

/// POST /api/v1/init-video
///
/// Creates (or fully resets) the engine tracking state for a session.
pub async fn init_video(
    State(state): State<AppState>,
    Json(req): Json<InitVideoRequest>,
) -> AppResult<Json<InitVideoResponse>> {
    state.registry.initialize(req.session_id).await?;
    Ok(Json(InitVideoResponse {
        status: "initialized",
    }))
}
