//! Integration tests for the prompt -> propagate flow over HTTP.

mod common;

use axum::http::StatusCode;
use common::{body_json, build_test_app, get, post_json, seed_session, TEST_FRAMES};
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: the full ten-frame scenario
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ten_frame_scenario_end_to_end() {
    let t = build_test_app().await;
    let id = seed_session(&t).await;

    // Initialize.
    let response = post_json(
        t.app.clone(),
        "/api/v1/init-video",
        json!({ "session_id": id }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "initialized");

    // Prompt at frame 0 with one positive point.
    let response = post_json(
        t.app.clone(),
        "/api/v1/segment-frame",
        json!({
            "session_id": id,
            "frame_index": 0,
            "pos_points": [[210.0, 350.0]],
            "neg_points": [],
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "prompt_added");

    let mask_path = body["mask_path"].as_str().unwrap().to_string();
    assert!(mask_path.ends_with(&format!("{id}/00000.png")));

    // The persisted mask has foreground at the prompted coordinate and
    // background far away from it.
    let mask = image::open(&mask_path).unwrap().into_luma8();
    assert_eq!(mask.get_pixel(210, 350).0[0], 255);
    assert_eq!(mask.get_pixel(0, 0).0[0], 0);

    // Propagate across all frames.
    let response = post_json(
        t.app.clone(),
        "/api/v1/propagate-video-mask",
        json!({ "session_id": id }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "done");
    assert_eq!(body["frames_masked"], u64::from(TEST_FRAMES));

    // One mask per frame, 0 through 9, at the deterministic paths.
    for i in 0..TEST_FRAMES {
        let path = t.layout.mask_path(id, i);
        assert!(path.is_file(), "missing mask for frame {i}");
    }
}

// ---------------------------------------------------------------------------
// Test: re-prompting a frame overwrites rather than accumulates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn repeated_prompt_overwrites_the_frame_mask() {
    let t = build_test_app().await;
    let id = seed_session(&t).await;

    post_json(
        t.app.clone(),
        "/api/v1/init-video",
        json!({ "session_id": id }),
    )
    .await;

    let prompt = json!({
        "session_id": id,
        "frame_index": 3,
        "pos_points": [[100.0, 100.0]],
        "neg_points": [],
    });

    let first = post_json(t.app.clone(), "/api/v1/segment-frame", prompt.clone()).await;
    assert_eq!(first.status(), StatusCode::OK);
    let first_path = body_json(first).await["mask_path"].as_str().unwrap().to_string();
    let first_bytes = std::fs::read(&first_path).unwrap();

    let second = post_json(t.app.clone(), "/api/v1/segment-frame", prompt).await;
    assert_eq!(second.status(), StatusCode::OK);
    let second_path = body_json(second).await["mask_path"].as_str().unwrap().to_string();

    // Same path, same content, exactly one mask file for the frame.
    assert_eq!(first_path, second_path);
    assert_eq!(std::fs::read(&second_path).unwrap(), first_bytes);
    let mask_files = std::fs::read_dir(t.layout.mask_dir(id)).unwrap().count();
    assert_eq!(mask_files, 1);
}

// ---------------------------------------------------------------------------
// Test: re-initializing discards accumulated prompts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reinitialize_discards_prompts() {
    let t = build_test_app().await;
    let id = seed_session(&t).await;

    post_json(
        t.app.clone(),
        "/api/v1/init-video",
        json!({ "session_id": id }),
    )
    .await;
    post_json(
        t.app.clone(),
        "/api/v1/segment-frame",
        json!({
            "session_id": id,
            "frame_index": 0,
            "pos_points": [[210.0, 350.0]],
            "neg_points": [],
        }),
    )
    .await;
    assert_eq!(t.fake.total_prompts(), 1);

    // Second initialize is a full reset.
    let response = post_json(
        t.app.clone(),
        "/api/v1/init-video",
        json!({ "session_id": id }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(t.fake.total_prompts(), 0);

    // With no prompts accumulated, propagation is rejected again.
    let response = post_json(
        t.app.clone(),
        "/api/v1/propagate-video-mask",
        json!({ "session_id": id }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "SESSION_NOT_INITIALIZED");
}

// ---------------------------------------------------------------------------
// Test: persisted masks are retrievable through the /storage mount
// ---------------------------------------------------------------------------

#[tokio::test]
async fn masks_are_served_statically() {
    let t = build_test_app().await;
    let id = seed_session(&t).await;

    post_json(
        t.app.clone(),
        "/api/v1/init-video",
        json!({ "session_id": id }),
    )
    .await;
    post_json(
        t.app.clone(),
        "/api/v1/segment-frame",
        json!({
            "session_id": id,
            "frame_index": 0,
            "pos_points": [[210.0, 350.0]],
            "neg_points": [],
        }),
    )
    .await;

    let response = get(t.app.clone(), &format!("/storage/masks/{id}/00000.png")).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Frames are served from the same mount.
    let response = get(t.app.clone(), &format!("/storage/frames/{id}/00000.jpg")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Test: propagation may be repeated and re-masks every frame
// ---------------------------------------------------------------------------

#[tokio::test]
async fn propagation_is_repeatable() {
    let t = build_test_app().await;
    let id = seed_session(&t).await;

    post_json(
        t.app.clone(),
        "/api/v1/init-video",
        json!({ "session_id": id }),
    )
    .await;
    post_json(
        t.app.clone(),
        "/api/v1/segment-frame",
        json!({
            "session_id": id,
            "frame_index": 0,
            "pos_points": [[50.0, 50.0]],
            "neg_points": [],
        }),
    )
    .await;

    for _ in 0..2 {
        let response = post_json(
            t.app.clone(),
            "/api/v1/propagate-video-mask",
            json!({ "session_id": id }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["frames_masked"], u64::from(TEST_FRAMES));
    }
}
