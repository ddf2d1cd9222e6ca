//! Wire types for the predictor sidecar HTTP protocol.
//!
//! Requests and responses are JSON. Logit buffers are transported as
//! base64-encoded little-endian `f32`, row-major, `width * height` values;
//! propagation responses arrive as one [`FramePrediction`] JSON object per
//! NDJSON line.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use maskflow_core::mask::MaskLogits;

/// `POST /state/init` request body.
#[derive(Debug, Serialize)]
pub struct InitStateRequest<'a> {
    /// Directory of extracted frames the engine should index.
    pub frame_dir: &'a str,
}

/// `POST /state/init` response body.
#[derive(Debug, Deserialize)]
pub struct InitStateResponse {
    /// Sidecar-assigned identifier for the created tracking state.
    pub state_id: String,
}

/// `POST /state/{id}/points` request body.
#[derive(Debug, Serialize)]
pub struct AddPointsRequest {
    pub frame_index: u32,
    pub object_id: u32,
    /// `[x, y]` pixel coordinates, positives first.
    pub points: Vec<[f32; 2]>,
    /// Parallel to `points`: 1 = positive, 0 = negative.
    pub labels: Vec<u8>,
}

/// One frame's raw prediction, returned by the points endpoint and
/// streamed (one per NDJSON line) by the propagate endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramePrediction {
    pub frame_index: u32,
    pub object_id: u32,
    pub width: u32,
    pub height: u32,
    /// base64 little-endian f32, row-major, `width * height` values.
    pub logits: String,
}

/// Errors decoding a logit payload.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("logits are not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("logit byte length {0} is not a multiple of 4")]
    Alignment(usize),

    #[error("logit shape mismatch: {0}")]
    Shape(String),
}

impl FramePrediction {
    /// Decode the base64 payload into a validated logit grid.
    pub fn decode_logits(&self) -> Result<MaskLogits, PayloadError> {
        let raw = BASE64.decode(&self.logits)?;
        if raw.len() % 4 != 0 {
            return Err(PayloadError::Alignment(raw.len()));
        }

        let values = raw
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        MaskLogits::new(self.width, self.height, values)
            .map_err(|e| PayloadError::Shape(e.to_string()))
    }
}

/// Encode a logit grid into the wire payload. The inverse of
/// [`FramePrediction::decode_logits`]; used by the fake predictor and by
/// protocol tests.
pub fn encode_logits(logits: &MaskLogits) -> String {
    let mut raw = Vec::with_capacity(logits.data().len() * 4);
    for v in logits.data() {
        raw.extend_from_slice(&v.to_le_bytes());
    }
    BASE64.encode(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logits_survive_the_wire_encoding() {
        let logits = MaskLogits::new(2, 2, vec![-1.5, 0.0, 0.25, 7.0]).unwrap();
        let wire = FramePrediction {
            frame_index: 3,
            object_id: 1,
            width: 2,
            height: 2,
            logits: encode_logits(&logits),
        };
        assert_eq!(wire.decode_logits().unwrap(), logits);
    }

    #[test]
    fn truncated_payload_rejected() {
        let wire = FramePrediction {
            frame_index: 0,
            object_id: 1,
            width: 2,
            height: 2,
            logits: BASE64.encode([0u8; 6]),
        };
        assert!(matches!(
            wire.decode_logits(),
            Err(PayloadError::Alignment(6))
        ));
    }

    #[test]
    fn shape_mismatch_rejected() {
        // 3 floats for a 2x2 grid.
        let wire = FramePrediction {
            frame_index: 0,
            object_id: 1,
            width: 2,
            height: 2,
            logits: BASE64.encode([0u8; 12]),
        };
        assert!(matches!(wire.decode_logits(), Err(PayloadError::Shape(_))));
    }

    #[test]
    fn invalid_base64_rejected() {
        let wire = FramePrediction {
            frame_index: 0,
            object_id: 1,
            width: 1,
            height: 1,
            logits: "not base64!!!".to_string(),
        };
        assert!(matches!(wire.decode_logits(), Err(PayloadError::Base64(_))));
    }
}
