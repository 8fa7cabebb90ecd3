use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use tracing::warn;

use crate::db::health_check as database_health;
use crate::models::{AppState, HealthResponse};
use crate::queue::WorkerSnapshot;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let database_ok = match database_health(&state.pool).await {
        Ok(ok) => ok,
        Err(e) => {
            warn!(error = %e, "Database health check failed");
            false
        }
    };
    let response = health_response(database_ok, state.stats.snapshot().await);
    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

fn health_response(database_ok: bool, worker: WorkerSnapshot) -> HealthResponse {
    HealthResponse {
        status: if database_ok { "ok" } else { "degraded" }.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        database: if database_ok { "connected" } else { "unreachable" }.to_string(),
        worker,
    }
}
