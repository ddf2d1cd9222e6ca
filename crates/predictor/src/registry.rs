//! Session registry: per-video engine state, lifecycle enforcement, and
//! the concurrency policy protecting it.
//!
//! One [`SessionRegistry`] exists per process, created at startup and
//! cloned into request handlers as an `Arc`. The registry map is the only
//! process-wide shared mutable structure; it is locked briefly for inserts
//! and lookups. Every operation on a single session serializes on that
//! session's own mutex, held across the engine call, mask persistence, and
//! the phase transition — operations on different sessions never contend.
//!
//! Engine invocations additionally take a permit from a semaphore sized to
//! the available compute workers, so a burst of sessions cannot oversubscribe
//! the device the sidecar runs on.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::{Mutex, RwLock, Semaphore, SemaphorePermit};

use maskflow_core::error::CoreError;
use maskflow_core::lifecycle::LifecyclePhase;
use maskflow_core::mask::Mask;
use maskflow_core::prompt::{self, Point};
use maskflow_core::storage::MaskStore;
use maskflow_core::types::{SessionId, TRACKED_OBJECT_ID};

use crate::predictor::{EngineStateId, Predictor};

/// Tunables for the registry's resource policy.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of the session map. Inserting beyond it evicts the
    /// least-recently-used session.
    pub max_sessions: usize,
    /// Concurrent engine invocations allowed process-wide, sized to the
    /// sidecar's compute devices.
    pub engine_workers: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_sessions: 32,
            engine_workers: 1,
        }
    }
}

/// Result of a successful add-prompt: the produced mask and where it was
/// persisted.
#[derive(Debug)]
pub struct PromptOutcome {
    pub mask_path: PathBuf,
    pub mask: Mask,
}

/// Owns the session map and drives every engine interaction.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<SessionHandle>>>,
    predictor: Arc<dyn Predictor>,
    masks: MaskStore,
    engine_permits: Semaphore,
    max_sessions: usize,
    /// Monotonic counter stamping session access order for LRU eviction.
    access_clock: AtomicU64,
}

/// One registered session. The inner mutex is the per-session
/// serialization point.
struct SessionHandle {
    id: SessionId,
    state: Mutex<SessionState>,
    last_access: AtomicU64,
}

struct SessionState {
    frame_dir: PathBuf,
    frame_count: u32,
    phase: LifecyclePhase,
    engine_state: Option<EngineStateId>,
}

impl SessionRegistry {
    /// Create the registry. The returned `Arc` is cheap to clone into
    /// handler state.
    pub fn new(
        predictor: Arc<dyn Predictor>,
        masks: MaskStore,
        config: RegistryConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            sessions: RwLock::new(HashMap::new()),
            predictor,
            masks,
            engine_permits: Semaphore::new(config.engine_workers.max(1)),
            max_sessions: config.max_sessions.max(1),
            access_clock: AtomicU64::new(0),
        })
    }

    /// Register a freshly-extracted video under `id`.
    ///
    /// Called by upload after frame extraction succeeds — a failed
    /// extraction never reaches the registry. Evicts the least-recently-
    /// used session when the map is at capacity.
    pub async fn register(&self, id: SessionId, frame_dir: PathBuf, frame_count: u32) {
        let handle = Arc::new(SessionHandle {
            id,
            state: Mutex::new(SessionState {
                frame_dir,
                frame_count,
                phase: LifecyclePhase::Uninitialized,
                engine_state: None,
            }),
            last_access: AtomicU64::new(self.tick()),
        });

        let evicted = {
            let mut map = self.sessions.write().await;
            let evicted = if map.len() >= self.max_sessions {
                map.iter()
                    .min_by_key(|(_, h)| h.last_access.load(Ordering::Relaxed))
                    .map(|(victim, _)| *victim)
                    .and_then(|victim| map.remove(&victim))
            } else {
                None
            };
            map.insert(id, handle);
            evicted
        };

        if let Some(victim) = evicted {
            tracing::warn!(session_id = %victim.id, "Session capacity reached, evicting least-recently-used session");
            self.release_engine_state(&victim).await;
        }

        tracing::info!(session_id = %id, frame_count, "Session registered");
    }

    /// Create (or fully reset) the engine state for a session.
    ///
    /// Re-initializing a live session discards every accumulated prompt
    /// and propagated result and returns the phase to `Initialized`.
    pub async fn initialize(&self, id: SessionId) -> Result<(), CoreError> {
        let handle = self.lookup(id).await?;
        let mut state = handle.state.lock().await;

        if !state.frame_dir.is_dir() {
            return Err(CoreError::SessionNotFound { id });
        }

        {
            let _permit = self.acquire_worker().await?;
            match &state.engine_state {
                Some(engine) => {
                    self.predictor.reset_state(engine).await?;
                }
                None => {
                    let engine = self.predictor.init_state(&state.frame_dir).await?;
                    // Fresh states start with a reset so no stale tracking
                    // survives a sidecar-side state reuse.
                    if let Err(e) = self.predictor.reset_state(&engine).await {
                        let _ = self.predictor.close_state(&engine).await;
                        return Err(e.into());
                    }
                    state.engine_state = Some(engine);
                }
            }
        }

        state.phase = LifecyclePhase::Initialized;
        tracing::info!(session_id = %id, "Session initialized");
        Ok(())
    }

    /// Apply one prompt event to one frame and persist the resulting mask.
    ///
    /// Input is validated before any engine invocation; a failure at any
    /// stage leaves the lifecycle phase unchanged.
    pub async fn add_prompt(
        &self,
        id: SessionId,
        frame_index: u32,
        positive: &[Point],
        negative: &[Point],
    ) -> Result<PromptOutcome, CoreError> {
        let handle = self.lookup(id).await?;
        let mut state = handle.state.lock().await;

        if !state.phase.allows_prompt() {
            return Err(CoreError::SessionNotInitialized { id });
        }
        prompt::validate_prompt(frame_index, state.frame_count, positive, negative)?;

        let labeled = prompt::merge_points(positive, negative);
        let engine = state
            .engine_state
            .as_ref()
            .ok_or(CoreError::SessionNotInitialized { id })?;

        let logits = {
            let _permit = self.acquire_worker().await?;
            self.predictor
                .add_points(engine, frame_index, TRACKED_OBJECT_ID, &labeled)
                .await?
        };

        let mask = Mask::from_logits(&logits);
        let mask_path = self.masks.save(id, frame_index, &mask).await?;

        state.phase = LifecyclePhase::Prompted;
        tracing::info!(
            session_id = %id,
            frame_index,
            points = labeled.points.len(),
            foreground = mask.foreground_pixels(),
            "Prompt applied"
        );

        Ok(PromptOutcome { mask_path, mask })
    }

    /// Run temporal propagation and persist one mask per produced frame.
    ///
    /// Requires at least one prompt since the last initialize; propagating
    /// an unprompted session is rejected. The propagation stream is
    /// consumed to completion under the session lock — the engine reads
    /// live tracking state while producing it, so no other call on this
    /// session may interleave. Returns the number of masks persisted.
    pub async fn propagate(&self, id: SessionId) -> Result<u64, CoreError> {
        let handle = self.lookup(id).await?;
        let mut state = handle.state.lock().await;

        if !state.phase.allows_propagate() {
            return Err(CoreError::SessionNotInitialized { id });
        }
        let engine = state
            .engine_state
            .as_ref()
            .ok_or(CoreError::SessionNotInitialized { id })?;

        let frames_masked = {
            let _permit = self.acquire_worker().await?;
            let mut stream = self.predictor.propagate(engine).await?;

            let mut saved: u64 = 0;
            while let Some(item) = stream.next().await {
                let frame = item?;
                let mask = Mask::from_logits(&frame.logits);
                self.masks.save(id, frame.frame_index, &mask).await?;
                saved += 1;
            }
            saved
        };

        state.phase = LifecyclePhase::Propagated;
        tracing::info!(session_id = %id, frames_masked, "Propagation complete");
        Ok(frames_masked)
    }

    /// Close a session explicitly, releasing its engine state.
    pub async fn close(&self, id: SessionId) -> Result<(), CoreError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(&id)
            .ok_or(CoreError::SessionNotFound { id })?;

        self.release_engine_state(&handle).await;
        tracing::info!(session_id = %id, "Session closed");
        Ok(())
    }

    /// Release every remaining engine state. Called once during graceful
    /// shutdown, after the server has stopped accepting requests.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down session registry");
        let handles: Vec<_> = {
            let mut map = self.sessions.write().await;
            map.drain().map(|(_, handle)| handle).collect()
        };
        for handle in handles {
            self.release_engine_state(&handle).await;
        }
    }

    /// Current lifecycle phase of a session.
    pub async fn phase(&self, id: SessionId) -> Result<LifecyclePhase, CoreError> {
        let handle = self.lookup(id).await?;
        let state = handle.state.lock().await;
        Ok(state.phase)
    }

    /// Number of registered sessions.
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether the engine sidecar is currently reachable.
    pub async fn engine_healthy(&self) -> bool {
        self.predictor.health().await
    }

    // ---- private helpers ----

    async fn lookup(&self, id: SessionId) -> Result<Arc<SessionHandle>, CoreError> {
        let map = self.sessions.read().await;
        let handle = map
            .get(&id)
            .cloned()
            .ok_or(CoreError::SessionNotFound { id })?;
        handle.last_access.store(self.tick(), Ordering::Relaxed);
        Ok(handle)
    }

    async fn acquire_worker(&self) -> Result<SemaphorePermit<'_>, CoreError> {
        self.engine_permits
            .acquire()
            .await
            .map_err(|_| CoreError::Internal("engine worker pool closed".to_string()))
    }

    fn tick(&self) -> u64 {
        self.access_clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Best-effort release of a handle's engine state. Waits for any
    /// in-flight operation on the session to finish first.
    async fn release_engine_state(&self, handle: &SessionHandle) {
        let mut state = handle.state.lock().await;
        if let Some(engine) = state.engine_state.take() {
            if let Err(e) = self.predictor.close_state(&engine).await {
                tracing::warn!(session_id = %handle.id, error = %e, "Failed to close engine state");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
