use axum::routing::{get, post};
use axum::Router;

use crate::handlers::generation;
use crate::state::AppState;

/// Generation job routes, nested under `/api`.
///
/// ```text
/// POST /generate            submit a prompt, returns 202 with the job id
/// GET  /status/{job_id}     current job snapshot
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/generate", post(generation::submit))
        .route("/status/{job_id}", get(generation::get_status))
}
