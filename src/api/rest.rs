// src/api/rest.rs
use axum::Router;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::{routes::api_routes, AppState};

/// 建立 HTTP 應用
///
/// `extra` 為外部路由層提供的資源路由，與健康檢查路由合併後共用同一狀態。
pub fn build_app(state: AppState, extra: Router<AppState>) -> Router {
    Router::new()
        .merge(api_routes())
        .merge(extra)
        // 追蹤層
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
