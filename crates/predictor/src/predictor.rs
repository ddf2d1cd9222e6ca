//! The segmentation engine adapter seam.
//!
//! Everything the orchestration layer needs from the engine is expressed by
//! [`Predictor`]; the production implementation is
//! [`HttpPredictor`](crate::http::HttpPredictor), and tests substitute an
//! in-process fake. All methods are potentially slow (seconds): callers
//! hold the per-session lock and an engine worker permit for the duration.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;
use futures::stream::BoxStream;

use maskflow_core::error::CoreError;
use maskflow_core::mask::MaskLogits;
use maskflow_core::prompt::LabeledPoints;

/// Opaque handle to the engine-side tracking state of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineStateId(String);

impl EngineStateId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EngineStateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One frame's decoded prediction from a propagation run.
#[derive(Debug, Clone)]
pub struct FrameMask {
    pub frame_index: u32,
    pub object_id: u32,
    pub logits: MaskLogits,
}

/// Lazy, finite sequence of per-frame predictions in increasing frame
/// order, bounded by the session's frame count. Must be consumed to
/// completion before any further engine call on the same state: the
/// engine reads its live internal tracking state while producing it.
pub type PropagationStream = BoxStream<'static, Result<FrameMask, EngineError>>;

/// Errors from the engine boundary.
///
/// Never retried by the core: by the time a fault surfaces, engine state
/// may already be mutated.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The request itself failed (network, DNS, timeout).
    #[error("engine request failed: {0}")]
    Request(String),

    /// The engine answered with a non-2xx status.
    #[error("engine returned {status}: {body}")]
    Api { status: u16, body: String },

    /// The engine answered with something the protocol does not allow.
    #[error("engine protocol error: {0}")]
    Protocol(String),
}

impl From<EngineError> for CoreError {
    fn from(err: EngineError) -> Self {
        CoreError::Engine(err.to_string())
    }
}

/// Narrow interface wrapping the external segmentation engine.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Build engine-side tracking state over a directory of extracted
    /// frames. The engine loads its model lazily on first use and caches
    /// it for the life of the process.
    async fn init_state(&self, frame_dir: &Path) -> Result<EngineStateId, EngineError>;

    /// Discard every accumulated prompt and propagated result, returning
    /// the state to empty.
    async fn reset_state(&self, state: &EngineStateId) -> Result<(), EngineError>;

    /// Run the point-to-mask step for one labeled point set on one frame
    /// of the single tracked object. Returns raw confidence; the caller
    /// owns binarization.
    async fn add_points(
        &self,
        state: &EngineStateId,
        frame_index: u32,
        object_id: u32,
        points: &LabeledPoints,
    ) -> Result<MaskLogits, EngineError>;

    /// Run temporal propagation from the accumulated prompts. Not
    /// restartable: a second run re-propagates from current prompt state
    /// and may overwrite earlier results.
    async fn propagate(&self, state: &EngineStateId) -> Result<PropagationStream, EngineError>;

    /// Release engine-side resources for this state. Best-effort; used on
    /// session close, eviction, and shutdown.
    async fn close_state(&self, state: &EngineStateId) -> Result<(), EngineError>;

    /// Whether the engine is currently reachable.
    async fn health(&self) -> bool;
}
