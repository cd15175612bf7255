use std::sync::Arc;

use kura_pipeline::orchestrator::Orchestrator;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (asset and upload roots are read per request).
    pub config: Arc<ServerConfig>,
    /// Job orchestrator; owns the job store.
    pub orchestrator: Orchestrator,
}
