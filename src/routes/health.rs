use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::state::AppState;
use crate::store::migrate;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .route("/database", get(database_health))
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "uptimeSecs": state.uptime_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn liveness() -> StatusCode {
    StatusCode::OK
}

/// Ready once migrations have brought the schema to the current version.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match migrate::get_current_version(state.store()) {
        Ok(version) if version >= migrate::LATEST_VERSION => StatusCode::OK,
        _ => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn database_health(State(state): State<AppState>) -> impl IntoResponse {
    let start = Instant::now();
    let version = migrate::get_current_version(state.store());
    let latency_us = start.elapsed().as_micros() as u64;

    let (status, body) = match version {
        Ok(version) => (
            StatusCode::OK,
            serde_json::json!({ "healthy": true, "schemaVersion": version, "latencyUs": latency_us }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "Database health probe failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({ "healthy": false, "latencyUs": latency_us }),
            )
        }
    };
    (status, Json(body))
}
