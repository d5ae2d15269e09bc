pub mod dto;
pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;

use crate::{config::Config, metrics::MetricsEngine};
use handlers::ApiDoc;

/// Shared by every handler; cloned per request.
#[derive(Clone)]
pub struct AppState {
    pub engine: MetricsEngine,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            engine: MetricsEngine::default(),
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    let (router, api) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .route("/metrics/summary", post(handlers::summary))
        .route("/metrics/series", post(handlers::series))
        .route("/metrics/chart", post(handlers::chart))
        .route("/metrics/export", post(handlers::export))
        .route("/metrics/status", post(handlers::status))
        .route("/metrics/endpoints", get(handlers::endpoints))
        .with_state(state)
        .split_for_parts();

    router
        .route("/health", get(handlers::health))
        .route(
            "/api-docs/openapi.json",
            get(move || async move { axum::Json(api) }),
        )
}
