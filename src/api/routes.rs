use axum::Router;

use crate::api::AppState;

pub mod system;

pub fn api_routes() -> Router<AppState> {
    Router::new().merge(system::routes())
}
