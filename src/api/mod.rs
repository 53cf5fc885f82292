pub mod breaks;
pub mod health;
pub mod positions;
pub mod trades;

use crate::db::Repository;
use crate::orchestration::IngestOrchestrator;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub orchestrator: Arc<IngestOrchestrator>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, orchestrator: Arc<IngestOrchestrator>) -> Self {
        Self { repo, orchestrator }
    }
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .route(
            "/v1/trades",
            post(trades::ingest_trades).delete(trades::clear_trades),
        )
        .route("/v1/positions", get(positions::get_positions))
        .route("/v1/breaks", get(breaks::get_breaks))
        .layer(cors)
        .with_state(state)
}
