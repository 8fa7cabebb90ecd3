//! HTTP surface
//!
//! The worker has no public API; the router only exposes `/health` for
//! liveness checks when `HEALTH_PORT` is set.

pub mod health;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::models::AppState;

pub fn create_router(state: AppState) -> Router {
    info!("Creating health router");

    Router::new()
        .merge(health::router(state))
        .layer(TraceLayer::new_for_http())
}
