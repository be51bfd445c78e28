//! Health check handlers.
//!
//! - `GET /health` - liveness, plain `OK`
//! - `GET /ready` - readiness, pings the session store

use crate::models::ReadinessResponse;
use crate::routes::AppState;
use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;
use tracing::{instrument, warn};

/// Liveness probe handler.
///
/// Returns 200 OK while the process runs.
#[instrument(skip_all, name = "sc.health.live")]
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    if state.health.is_live() {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "NOT OK")
    }
}

/// Readiness probe handler.
///
/// Returns 200 when startup completed and the store answers a ping, 503
/// otherwise. The body is returned either way so probes can see why.
#[instrument(skip_all, name = "sc.health.ready")]
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let store_healthy = match state.coordinator.store().ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!(target: "sc.health", error = %e, "Readiness check: session store unreachable");
            false
        }
    };

    let ready = store_healthy && state.health.is_ready();
    let response = ReadinessResponse {
        status: if ready { "ready" } else { "not_ready" },
        store: if store_healthy { "healthy" } else { "unhealthy" },
    };

    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}
