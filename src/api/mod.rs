use axum::{Router, http::HeaderValue, middleware, routing::get};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::cache::CharacterCache;
use crate::state::SharedState;

pub mod characters;
mod error;
mod observability;
mod system;
mod types;

pub use error::ApiError;
pub use types::*;

use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub struct AppState {
    pub shared: Arc<SharedState>,

    pub start_time: std::time::Instant,

    pub prometheus_handle: Option<PrometheusHandle>,
}

impl AppState {
    #[must_use]
    pub fn cache(&self) -> &Arc<CharacterCache> {
        &self.shared.cache
    }
}

#[must_use]
pub fn create_app_state(
    shared: Arc<SharedState>,
    prometheus_handle: Option<PrometheusHandle>,
) -> Arc<AppState> {
    Arc::new(AppState {
        shared,
        start_time: std::time::Instant::now(),
        prometheus_handle,
    })
}

pub async fn router(state: Arc<AppState>) -> Router {
    let cors_origins = state
        .shared
        .config
        .read()
        .await
        .server
        .cors_allowed_origins
        .clone();

    let api_router = Router::new()
        .route("/characters/random", get(characters::random_character))
        .route("/characters/batch", get(characters::batch_characters))
        .route("/characters/search", get(characters::search_characters))
        .route("/characters/stats", get(characters::get_stats))
        .route("/characters/refresh", get(characters::refresh_cache))
        .route("/characters/{id}", get(characters::get_character))
        .route("/health", get(system::health))
        .route("/metrics", get(observability::get_metrics))
        .route_layer(middleware::from_fn(observability::logging_middleware))
        .with_state(state);

    let cors_layer = if cors_origins.iter().any(|o| o == "*") {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> =
            cors_origins.iter().filter_map(|s| s.parse().ok()).collect();
        CorsLayer::new().allow_origin(origins)
    };

    Router::new()
        .nest("/api", api_router)
        .layer(cors_layer.allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(observability::security_headers_middleware))
}
