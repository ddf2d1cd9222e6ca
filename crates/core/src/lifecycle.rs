//! Session lifecycle state machine.
//!
//! A session moves `Uninitialized -> Initialized -> Prompted -> Propagated`.
//! Re-initialization is permitted from any phase and returns the session to
//! `Initialized`, discarding accumulated prompts. The registry consults
//! these predicates before every operation; a failed operation never
//! advances the phase.

/// Where a session currently sits in the initialize/prompt/propagate flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecyclePhase {
    /// Frames extracted, no engine state yet.
    Uninitialized,
    /// Engine state exists, no prompts added.
    Initialized,
    /// At least one prompt added since the last initialize.
    Prompted,
    /// Propagation has completed at least once.
    Propagated,
}

impl LifecyclePhase {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Prompted => "prompted",
            Self::Propagated => "propagated",
        }
    }

    /// Engine state exists iff the phase is `Initialized` or later.
    pub fn has_engine_state(self) -> bool {
        !matches!(self, Self::Uninitialized)
    }

    /// Add-prompt is legal from `Initialized`, `Prompted`, or `Propagated`.
    pub fn allows_prompt(self) -> bool {
        !matches!(self, Self::Uninitialized)
    }

    /// Propagation requires at least one accumulated prompt, so it is legal
    /// only from `Prompted` or `Propagated`. Propagating with no prompts is
    /// rejected rather than treated as a no-op.
    pub fn allows_propagate(self) -> bool {
        matches!(self, Self::Prompted | Self::Propagated)
    }
}

impl std::fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
