use crate::types::SessionId;

/// Domain-level error taxonomy.
///
/// Every caller-facing failure of the orchestration layer maps to exactly
/// one of these variants; the api crate translates them into HTTP
/// status/code pairs without leaking internals.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// The uploaded bytes are not a decodable video. Fatal for upload:
    /// no session is registered.
    #[error("Video decode failed: {0}")]
    Decode(String),

    /// No session (or no frame directory) exists for the given id.
    /// The caller must re-upload.
    #[error("Session {id} not found")]
    SessionNotFound { id: SessionId },

    /// A prompt or propagation arrived out of lifecycle order.
    /// The caller must initialize (and, for propagation, prompt) first.
    #[error("Session {id} is not initialized")]
    SessionNotInitialized { id: SessionId },

    /// The external segmentation engine faulted or returned an unexpected
    /// shape. Surfaced verbatim, never retried: engine state may already
    /// be mutated.
    #[error("Engine invocation failed: {0}")]
    Engine(String),

    /// Request input failed validation before reaching the engine.
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience alias used across the workspace.
pub type CoreResult<T> = Result<T, CoreError>;
