//! HTTP middleware for the Signaling Controller.
//!
//! - `auth` - caller identity from the gateway header
//! - `http_metrics` - request metrics for every response

pub mod auth;
pub mod http_metrics;

pub use auth::{require_user, AuthenticatedUser, USER_ID_HEADER};
pub use http_metrics::http_metrics_middleware;
