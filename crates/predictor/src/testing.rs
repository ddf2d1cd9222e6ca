//! In-process [`Predictor`] fake for registry and API tests.
//!
//! Behaves like a miniature engine: tracking states live in a map, prompts
//! accumulate per state, and masks come back as a disc of positive logits
//! around each positive point. Every trait method passes through an
//! instrumented entry/exit pair so tests can assert that calls against one
//! session never overlap while calls against different sessions do.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use maskflow_core::mask::MaskLogits;
use maskflow_core::prompt::{LabeledPoints, Point, LABEL_POSITIVE};

use crate::predictor::{EngineError, EngineStateId, FrameMask, Predictor, PropagationStream};

/// Radius (pixels) of the synthetic foreground disc around each positive
/// point.
const DISC_RADIUS: f32 = 20.0;

/// Configurable fake engine.
pub struct FakePredictor {
    frame_count: u32,
    width: u32,
    height: u32,

    states: Mutex<HashMap<String, FakeState>>,
    next_state: AtomicU64,

    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    call_delay_ms: AtomicU64,

    fail_add_points: AtomicBool,
    fail_propagate: AtomicBool,
}

#[derive(Default)]
struct FakeState {
    /// Positive points of each accumulated prompt.
    prompts: Vec<(u32, Vec<Point>)>,
}

impl FakePredictor {
    pub fn new(frame_count: u32, width: u32, height: u32) -> Self {
        Self {
            frame_count,
            width,
            height,
            states: Mutex::new(HashMap::new()),
            next_state: AtomicU64::new(0),
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            call_delay_ms: AtomicU64::new(0),
            fail_add_points: AtomicBool::new(false),
            fail_propagate: AtomicBool::new(false),
        }
    }

    /// Total engine calls made so far (all methods).
    pub fn engine_call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously-active engine calls observed
    /// since the last [`reset_concurrency_stats`](Self::reset_concurrency_stats).
    pub fn max_concurrent_calls(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn reset_concurrency_stats(&self) {
        self.max_active.store(0, Ordering::SeqCst);
    }

    /// Hold each engine call open for `delay` so overlap is observable.
    pub fn set_call_delay(&self, delay: Duration) {
        self.call_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    /// Fail the next `add_points` call with an engine fault.
    pub fn fail_next_add_points(&self) {
        self.fail_add_points.store(true, Ordering::SeqCst);
    }

    /// Make the next propagation stream fault after two frames.
    pub fn fail_next_propagate(&self) {
        self.fail_propagate.store(true, Ordering::SeqCst);
    }

    /// Number of live (initialized, not closed) engine states.
    pub fn live_states(&self) -> usize {
        self.states.lock().unwrap().len()
    }

    /// Total prompts accumulated across all live states.
    pub fn total_prompts(&self) -> usize {
        self.states
            .lock()
            .unwrap()
            .values()
            .map(|s| s.prompts.len())
            .sum()
    }

    // ---- private helpers ----

    async fn enter(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);

        let delay = self.call_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Positive logits inside a disc around each point, negative elsewhere.
    fn logits_for(&self, points: &[Point]) -> MaskLogits {
        let mut data = vec![-2.0f32; self.width as usize * self.height as usize];
        for point in points {
            let min_x = (point.x - DISC_RADIUS).max(0.0) as u32;
            let max_x = ((point.x + DISC_RADIUS) as u32).min(self.width.saturating_sub(1));
            let min_y = (point.y - DISC_RADIUS).max(0.0) as u32;
            let max_y = ((point.y + DISC_RADIUS) as u32).min(self.height.saturating_sub(1));
            for y in min_y..=max_y {
                for x in min_x..=max_x {
                    let dx = x as f32 - point.x;
                    let dy = y as f32 - point.y;
                    if dx * dx + dy * dy <= DISC_RADIUS * DISC_RADIUS {
                        data[(y * self.width + x) as usize] = 2.0;
                    }
                }
            }
        }
        MaskLogits::new(self.width, self.height, data).expect("fake logits always match shape")
    }

    fn positive_points(points: &LabeledPoints) -> Vec<Point> {
        points
            .points
            .iter()
            .zip(&points.labels)
            .filter(|(_, &label)| label == LABEL_POSITIVE)
            .map(|(&p, _)| p)
            .collect()
    }
}

#[async_trait]
impl Predictor for FakePredictor {
    async fn init_state(&self, _frame_dir: &Path) -> Result<EngineStateId, EngineError> {
        self.enter().await;
        let id = format!("fake-{}", self.next_state.fetch_add(1, Ordering::SeqCst));
        self.states
            .lock()
            .unwrap()
            .insert(id.clone(), FakeState::default());
        self.exit();
        Ok(EngineStateId::new(id))
    }

    async fn reset_state(&self, state: &EngineStateId) -> Result<(), EngineError> {
        self.enter().await;
        let result = match self.states.lock().unwrap().get_mut(state.as_str()) {
            Some(s) => {
                s.prompts.clear();
                Ok(())
            }
            None => Err(EngineError::Protocol(format!("unknown state {state}"))),
        };
        self.exit();
        result
    }

    async fn add_points(
        &self,
        state: &EngineStateId,
        frame_index: u32,
        _object_id: u32,
        points: &LabeledPoints,
    ) -> Result<MaskLogits, EngineError> {
        self.enter().await;

        if self.fail_add_points.swap(false, Ordering::SeqCst) {
            self.exit();
            return Err(EngineError::Api {
                status: 500,
                body: "injected engine fault".to_string(),
            });
        }

        let positives = Self::positive_points(points);
        let result = match self.states.lock().unwrap().get_mut(state.as_str()) {
            Some(s) => {
                s.prompts.push((frame_index, positives.clone()));
                Ok(self.logits_for(&positives))
            }
            None => Err(EngineError::Protocol(format!("unknown state {state}"))),
        };

        self.exit();
        result
    }

    async fn propagate(&self, state: &EngineStateId) -> Result<PropagationStream, EngineError> {
        self.enter().await;

        let prompted: Vec<Point> = match self.states.lock().unwrap().get(state.as_str()) {
            Some(s) => s
                .prompts
                .iter()
                .flat_map(|(_, points)| points.iter().copied())
                .collect(),
            None => {
                self.exit();
                return Err(EngineError::Protocol(format!("unknown state {state}")));
            }
        };

        let fail = self.fail_propagate.swap(false, Ordering::SeqCst);

        let mut items: Vec<Result<FrameMask, EngineError>> = Vec::new();
        for frame_index in 0..self.frame_count {
            if fail && frame_index == 2 {
                items.push(Err(EngineError::Api {
                    status: 500,
                    body: "injected propagation fault".to_string(),
                }));
                break;
            }
            items.push(Ok(FrameMask {
                frame_index,
                object_id: maskflow_core::types::TRACKED_OBJECT_ID,
                logits: self.logits_for(&prompted),
            }));
        }

        self.exit();
        Ok(Box::pin(futures::stream::iter(items)))
    }

    async fn close_state(&self, state: &EngineStateId) -> Result<(), EngineError> {
        self.enter().await;
        let removed = self.states.lock().unwrap().remove(state.as_str());
        self.exit();
        match removed {
            Some(_) => Ok(()),
            None => Err(EngineError::Protocol(format!("unknown state {state}"))),
        }
    }

    async fn health(&self) -> bool {
        true
    }
}
