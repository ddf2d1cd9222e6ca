use std::sync::Arc;

use maskflow_core::storage::StorageLayout;
use maskflow_predictor::registry::SessionRegistry;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Session registry driving every engine interaction.
    pub registry: Arc<SessionRegistry>,
    /// Deterministic videos/frames/masks path layout.
    pub layout: StorageLayout,
}
