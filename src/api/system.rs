use axum::{Json, extract::State, response::IntoResponse};
use std::sync::Arc;

use super::{ApiResponse, AppState, HealthResponse};

/// `GET /api/health`
///
/// Always 200 once the process serves HTTP; `loaded` tells whether the
/// first generation has been published.
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let generation = state.cache().snapshot().ok().map(|g| g.number());

    Json(ApiResponse::success(HealthResponse {
        status: "ok",
        loaded: generation.is_some(),
        generation,
        uptime_seconds: state.start_time.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
    }))
}
