//! HTTP request handlers for the Signaling Controller.

pub mod health;
pub mod metrics;
pub mod sessions;

pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
pub use sessions::{
    accept, active_call, create_session, end, get_participants, get_session, join, leave,
    mark_failed, mark_missed, reject, ring,
};
