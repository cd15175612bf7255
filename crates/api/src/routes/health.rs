use std::collections::BTreeMap;

use axum::extract::State;
use axum::{routing::get, Json, Router};
use kura_core::types::Timestamp;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    pub timestamp: Timestamp,
    pub jobs: JobCounts,
}

/// Jobs currently held in memory.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCounts {
    pub total: usize,
    pub by_status: BTreeMap<&'static str, usize>,
}

/// GET /health -- returns service status and in-memory job counts.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let by_status: BTreeMap<_, _> = state
        .orchestrator
        .store()
        .status_counts()
        .await
        .into_iter()
        .map(|(status, count)| (status.as_str(), count))
        .collect();

    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: chrono::Utc::now(),
        jobs: JobCounts {
            total: by_status.values().sum(),
            by_status,
        },
    })
}

/// Mount health check routes (root level, not under `/api`).
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
