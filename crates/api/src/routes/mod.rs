pub mod health;

use axum::routing::{delete, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /upload-video               upload a video, extract frames (POST)
/// /init-video                 create/reset engine state (POST)
/// /segment-frame              apply one point prompt (POST)
/// /propagate-video-mask       propagate masks across all frames (POST)
/// /sessions/{session_id}      close a session (DELETE)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/upload-video", post(handlers::video::upload_video))
        .route("/init-video", post(handlers::video::init_video))
        .route("/segment-frame", post(handlers::segmentation::segment_frame))
        .route(
            "/propagate-video-mask",
            post(handlers::segmentation::propagate_video_mask),
        )
        .route(
            "/sessions/{session_id}",
            delete(handlers::segmentation::close_session),
        )
}
