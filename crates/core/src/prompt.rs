//! Point-prompt aggregation and validation.
//!
//! A single prompt event supplies a set of positive points ("part of the
//! object") and a set of negative points ("not part of the object") for one
//! frame. The engine consumes one flat labeled point set: positives first,
//! then negatives, with label 1 for positive and 0 for negative.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Label value for a positive (foreground) point.
pub const LABEL_POSITIVE: u8 = 1;

/// Label value for a negative (background) point.
pub const LABEL_NEGATIVE: u8 = 0;

/// Upper bound on the combined point count of one prompt event.
pub const MAX_POINTS_PER_PROMPT: usize = 256;

/// A 2D pixel coordinate on a frame. The engine takes float coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One flat labeled point set, ready for the engine's point-to-mask step.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledPoints {
    pub points: Vec<Point>,
    pub labels: Vec<u8>,
}

/// Merge positive and negative point sets into one labeled set.
///
/// Order is part of the contract: positives first, then negatives.
pub fn merge_points(positive: &[Point], negative: &[Point]) -> LabeledPoints {
    let mut points = Vec::with_capacity(positive.len() + negative.len());
    points.extend_from_slice(positive);
    points.extend_from_slice(negative);

    let mut labels = vec![LABEL_POSITIVE; positive.len()];
    labels.extend(std::iter::repeat(LABEL_NEGATIVE).take(negative.len()));

    LabeledPoints { points, labels }
}

/// Validate a prompt event before any engine invocation.
///
/// - `frame_index` must lie in `[0, frame_count)`.
/// - The combined point set must be non-empty and within
///   [`MAX_POINTS_PER_PROMPT`].
/// - Coordinates must be finite.
pub fn validate_prompt(
    frame_index: u32,
    frame_count: u32,
    positive: &[Point],
    negative: &[Point],
) -> Result<(), CoreError> {
    if frame_index >= frame_count {
        return Err(CoreError::Validation(format!(
            "frame_index {frame_index} out of range for {frame_count} frames"
        )));
    }

    let total = positive.len() + negative.len();
    if total == 0 {
        return Err(CoreError::Validation(
            "A prompt must contain at least one point".to_string(),
        ));
    }
    if total > MAX_POINTS_PER_PROMPT {
        return Err(CoreError::Validation(format!(
            "A prompt may contain at most {MAX_POINTS_PER_PROMPT} points"
        )));
    }

    for p in positive.iter().chain(negative) {
        if !p.x.is_finite() || !p.y.is_finite() {
            return Err(CoreError::Validation(format!(
                "Point coordinates must be finite, got ({}, {})",
                p.x, p.y
            )));
        }
    }

    Ok(())
}
