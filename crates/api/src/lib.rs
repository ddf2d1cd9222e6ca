//! HTTP facade for the maskflow video segmentation service.
//!
//! Exposes the four orchestration operations (upload, initialize,
//! add-prompt, propagate) plus session close and health, translating
//! domain failures into the typed JSON error contract.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;
