//! Handlers for point prompts, mask propagation, and session close.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use maskflow_core::prompt::Point;
use maskflow_core::types::SessionId;

use crate::error::AppResult;
use crate::state::AppState;

/// Request body for one prompt event. Points are `[x, y]` pixel
/// coordinates on the addressed frame.
#[derive(Debug, Deserialize)]
pub struct SegmentFrameRequest {
    pub session_id: SessionId,
    pub frame_index: u32,
    #[serde(default)]
    pub pos_points: Vec<[f32; 2]>,
    #[serde(default)]
    pub neg_points: Vec<[f32; 2]>,
}

/// Response for a successful prompt: where the produced mask lives.
#[derive(Debug, Serialize)]
pub struct SegmentFrameResponse {
    pub status: &'static str,
    pub mask_path: String,
}

/// POST /api/v1/segment-frame
pub async fn segment_frame(
    State(state): State<AppState>,
    Json(req): Json<SegmentFrameRequest>,
) -> AppResult<Json<SegmentFrameResponse>> {
    let positive: Vec<Point> = req.pos_points.iter().map(|&[x, y]| Point::new(x, y)).collect();
    let negative: Vec<Point> = req.neg_points.iter().map(|&[x, y]| Point::new(x, y)).collect();

    let outcome = state
        .registry
        .add_prompt(req.session_id, req.frame_index, &positive, &negative)
        .await?;

    Ok(Json(SegmentFrameResponse {
        status: "prompt_added",
        mask_path: outcome.mask_path.display().to_string(),
    }))
}

/// Request body for propagation.
#[derive(Debug, Deserialize)]
pub struct PropagateRequest {
    pub session_id: SessionId,
}

/// Response for a completed propagation.
#[derive(Debug, Serialize)]
pub struct PropagateResponse {
    pub status: &'static str,
    pub frames_masked: u64,
}

/// POST /api/v1/propagate-video-mask
///
/// Drives temporal propagation across every frame, persisting one mask
/// per frame, and reports how many were written.
pub async fn propagate_video_mask(
    State(state): State<AppState>,
    Json(req): Json<PropagateRequest>,
) -> AppResult<Json<PropagateResponse>> {
    let frames_masked = state.registry.propagate(req.session_id).await?;
    Ok(Json(PropagateResponse {
        status: "done",
        frames_masked,
    }))
}

/// DELETE /api/v1/sessions/{session_id}
///
/// Explicitly closes a session, releasing its engine state. Persisted
/// frames and masks remain on disk for static retrieval.
pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> AppResult<StatusCode> {
    state.registry.close(session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
