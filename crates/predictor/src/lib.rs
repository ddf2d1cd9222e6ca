//! Segmentation engine adapter and session registry.
//!
//! The engine itself (model weights, tensors, devices) lives in a sidecar
//! process. This crate owns the narrow boundary to it — the [`Predictor`]
//! trait and its HTTP implementation — plus the [`SessionRegistry`] that
//! maps session ids to live engine state, enforces the lifecycle state
//! machine, and serializes per-session access.
//!
//! [`Predictor`]: predictor::Predictor
//! [`SessionRegistry`]: registry::SessionRegistry

pub mod http;
pub mod messages;
pub mod predictor;
pub mod registry;

#[cfg(any(test, feature = "testing"))]
pub mod testing;
