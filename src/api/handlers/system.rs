use axum::{
    extract::{Json, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::Serialize;

use crate::api::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    ok: bool,
    state: &'static str,
    time: String,
}

/// 就緒探針：回報資料庫連接狀態，服務本身永遠視為可用
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let health_response = HealthResponse {
        ok: true,
        state: state.readiness().state_label(),
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    };

    Json(health_response)
}

/// 存活探針：與資料庫狀態無關
pub async fn liveness() -> &'static str {
    "ok"
}

pub async fn index() -> &'static str {
    "OK"
}

/// Prometheus 指標
pub async fn metrics(State(state): State<AppState>) -> Response {
    match state.metrics() {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
