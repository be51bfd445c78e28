//! HTTP routes for the Signaling Controller.
//!
//! Defines the Axum router and application state.

use crate::config::Config;
use crate::coordinator::SignalingCoordinator;
use crate::handlers;
use crate::middleware::{http_metrics_middleware, require_user};
use crate::observability::HealthState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Session lifecycle coordinator.
    pub coordinator: SignalingCoordinator,

    /// Liveness/readiness flags.
    pub health: Arc<HealthState>,

    /// Service configuration.
    pub config: Config,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `/health`, `/ready` - probes, public
/// - `/metrics` - Prometheus scrape endpoint, public
/// - `/api/v1/sessions/...` and `/api/v1/calls/active` - require `x-user-id`
/// - `/internal/sessions/...` - system reports, no caller identity
/// - TraceLayer for request logging
/// - HTTP metrics middleware
/// - 30 second request timeout
pub fn build_routes(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .with_state(state.clone());

    let metrics_routes = Router::new()
        .route("/metrics", get(handlers::metrics_handler))
        .with_state(metrics_handle);

    // Meant to be reachable only from inside the deployment.
    let internal_routes = Router::new()
        .route(
            "/internal/sessions/:id/missed",
            post(handlers::mark_missed),
        )
        .route(
            "/internal/sessions/:id/failed",
            post(handlers::mark_failed),
        )
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/v1/sessions", post(handlers::create_session))
        .route("/api/v1/sessions/:id", get(handlers::get_session))
        .route(
            "/api/v1/sessions/:id/participants",
            get(handlers::get_participants),
        )
        .route("/api/v1/sessions/:id/ring", post(handlers::ring))
        .route("/api/v1/sessions/:id/accept", post(handlers::accept))
        .route("/api/v1/sessions/:id/reject", post(handlers::reject))
        .route("/api/v1/sessions/:id/join", post(handlers::join))
        .route("/api/v1/sessions/:id/leave", post(handlers::leave))
        .route("/api/v1/sessions/:id/end", post(handlers::end))
        .route("/api/v1/calls/active", get(handlers::active_call))
        .route_layer(middleware::from_fn(require_user))
        .with_state(state);

    // Layer order (bottom-to-top execution):
    // 1. TimeoutLayer (innermost)
    // 2. TraceLayer
    // 3. http_metrics_middleware (outermost, sees framework rejections too)
    public_routes
        .merge(metrics_routes)
        .merge(internal_routes)
        .merge(protected_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(middleware::from_fn(http_metrics_middleware))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_state_is_clone() {
        fn assert_clone<T: Clone>() {}
        assert_clone::<AppState>();
    }
}
