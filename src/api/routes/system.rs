// src/api/routes/system.rs
use axum::{
    routing::get,
    Router,
};
use crate::api::{handlers::system, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(system::index))
        .route("/health", get(system::health))
        .route("/healthz", get(system::liveness))
        .route("/metrics", get(system::metrics))
}
