//! HTTP client for the predictor sidecar.
//!
//! Implements [`Predictor`] against a sidecar process serving the JSON
//! protocol of [`crate::messages`]. One client serves every session; the
//! sidecar multiplexes states by id. A single request timeout bounds each
//! engine call — on expiry the call surfaces an error and the caller's
//! lifecycle phase is left unchanged.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;

use maskflow_core::mask::MaskLogits;
use maskflow_core::prompt::LabeledPoints;

use crate::messages::{AddPointsRequest, FramePrediction, InitStateRequest, InitStateResponse};
use crate::predictor::{EngineError, EngineStateId, FrameMask, Predictor, PropagationStream};

/// HTTP-backed [`Predictor`] implementation.
pub struct HttpPredictor {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPredictor {
    /// Create a client for the sidecar at `base_url`
    /// (e.g. `http://127.0.0.1:8492`), with `timeout` applied to every
    /// request including streamed propagation.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, EngineError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::Request(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the response
    /// unchanged on success, or an [`EngineError::Api`] containing the
    /// status and body text on failure.
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, EngineError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(EngineError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, EngineError> {
        let response = Self::ensure_success(response).await?;
        response
            .json::<T>()
            .await
            .map_err(|e| EngineError::Protocol(e.to_string()))
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), EngineError> {
        Self::ensure_success(response).await?;
        Ok(())
    }

    async fn post_json<B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, EngineError> {
        self.client
            .post(format!("{}{path}", self.base_url))
            .json(body)
            .send()
            .await
            .map_err(|e| EngineError::Request(e.to_string()))
    }

    async fn post_empty(&self, path: &str) -> Result<reqwest::Response, EngineError> {
        self.client
            .post(format!("{}{path}", self.base_url))
            .send()
            .await
            .map_err(|e| EngineError::Request(e.to_string()))
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    async fn init_state(&self, frame_dir: &Path) -> Result<EngineStateId, EngineError> {
        let frame_dir = frame_dir.to_string_lossy();
        let request = InitStateRequest {
            frame_dir: &frame_dir,
        };
        let response = self.post_json("/state/init", &request).await?;
        let init: InitStateResponse = Self::parse_response(response).await?;

        tracing::info!(state_id = %init.state_id, "Engine state initialized");
        Ok(EngineStateId::new(init.state_id))
    }

    async fn reset_state(&self, state: &EngineStateId) -> Result<(), EngineError> {
        let response = self.post_empty(&format!("/state/{state}/reset")).await?;
        Self::check_status(response).await
    }

    async fn add_points(
        &self,
        state: &EngineStateId,
        frame_index: u32,
        object_id: u32,
        points: &LabeledPoints,
    ) -> Result<MaskLogits, EngineError> {
        let request = AddPointsRequest {
            frame_index,
            object_id,
            points: points.points.iter().map(|p| [p.x, p.y]).collect(),
            labels: points.labels.clone(),
        };

        let response = self
            .post_json(&format!("/state/{state}/points"), &request)
            .await?;
        let prediction: FramePrediction = Self::parse_response(response).await?;

        prediction
            .decode_logits()
            .map_err(|e| EngineError::Protocol(e.to_string()))
    }

    async fn propagate(&self, state: &EngineStateId) -> Result<PropagationStream, EngineError> {
        let response = self.post_empty(&format!("/state/{state}/propagate")).await?;
        let response = Self::ensure_success(response).await?;
        Ok(ndjson_stream(response))
    }

    async fn close_state(&self, state: &EngineStateId) -> Result<(), EngineError> {
        let response = self.post_empty(&format!("/state/{state}/close")).await?;
        Self::check_status(response).await
    }

    async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Decode an NDJSON body into a stream of per-frame predictions.
///
/// Frames are parsed incrementally as chunks arrive, so mask persistence
/// can proceed while the engine is still propagating later frames.
fn ndjson_stream(response: reqwest::Response) -> PropagationStream {
    let body = response.bytes_stream().boxed();

    let stream = futures::stream::try_unfold(
        (body, Vec::new(), false),
        |(mut body, mut buf, mut done)| async move {
            loop {
                // Emit the next complete line, if any.
                if let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                    let line: Vec<u8> = buf.drain(..=pos).collect();
                    if let Some(frame) = parse_prediction_line(&line)? {
                        return Ok(Some((frame, (body, buf, done))));
                    }
                    continue;
                }

                if done {
                    // Trailing line without a newline terminator.
                    if buf.is_empty() {
                        return Ok(None);
                    }
                    let line = std::mem::take(&mut buf);
                    return match parse_prediction_line(&line)? {
                        Some(frame) => Ok(Some((frame, (body, buf, done)))),
                        None => Ok(None),
                    };
                }

                match body.next().await {
                    Some(Ok(chunk)) => buf.extend_from_slice(&chunk),
                    Some(Err(e)) => return Err(EngineError::Request(e.to_string())),
                    None => done = true,
                }
            }
        },
    );

    Box::pin(stream)
}

/// Parse one NDJSON line. Blank lines are skipped.
fn parse_prediction_line(line: &[u8]) -> Result<Option<FrameMask>, EngineError> {
    let text = std::str::from_utf8(line)
        .map_err(|e| EngineError::Protocol(format!("non-UTF-8 line: {e}")))?
        .trim();

    if text.is_empty() {
        return Ok(None);
    }

    let wire: FramePrediction =
        serde_json::from_str(text).map_err(|e| EngineError::Protocol(e.to_string()))?;
    let logits = wire
        .decode_logits()
        .map_err(|e| EngineError::Protocol(e.to_string()))?;

    Ok(Some(FrameMask {
        frame_index: wire.frame_index,
        object_id: wire.object_id,
        logits,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_and_whitespace_lines_are_skipped() {
        assert!(parse_prediction_line(b"\n").unwrap().is_none());
        assert!(parse_prediction_line(b"   \n").unwrap().is_none());
    }

    #[test]
    fn malformed_json_line_is_a_protocol_error() {
        let err = parse_prediction_line(b"{not json}\n").unwrap_err();
        assert!(matches!(err, EngineError::Protocol(_)));
    }

    #[test]
    fn valid_line_decodes_to_a_frame_mask() {
        let logits = MaskLogits::new(1, 1, vec![2.0]).unwrap();
        let wire = FramePrediction {
            frame_index: 4,
            object_id: 1,
            width: 1,
            height: 1,
            logits: crate::messages::encode_logits(&logits),
        };
        let line = serde_json::to_string(&wire).unwrap();

        let frame = parse_prediction_line(line.as_bytes()).unwrap().unwrap();
        assert_eq!(frame.frame_index, 4);
        assert_eq!(frame.logits, logits);
    }
}
