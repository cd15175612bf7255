pub mod assets;
pub mod generation;
pub mod health;

use axum::Router;

use crate::error::AppError;
use crate::state::AppState;

/// Build the full route tree (without middleware).
///
/// Route hierarchy:
///
/// ```text
/// /health                          service health (GET)
///
/// /api/generate                    submit a generation job (POST)
/// /api/status/{job_id}             poll job status (GET)
///
/// /images/{*path}                  reference images from the asset root (GET)
/// /uploads/{*path}                 uploaded attachments (GET)
/// ```
///
/// Anything else answers 404 with the standard error body.
pub fn app_routes() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .nest("/api", generation::router())
        .merge(assets::router())
        .fallback(route_not_found)
}

async fn route_not_found() -> AppError {
    AppError::RouteNotFound
}
