//! Observability for the Signaling Controller.
//!
//! # Privacy by Default
//!
//! Instrumented functions use `#[instrument(skip_all)]` and list safe fields
//! explicitly. Session and user identifiers appear in logs, never in metric
//! labels; the Redis URL appears in neither.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `sc_session_transitions_total` | Counter | `from`, `to` | Applied status changes |
//! | `sc_sessions_live` | Gauge | none | Session actors on this instance |
//! | `sc_room_full_total` | Counter | none | Joins refused at capacity |
//! | `sc_operation_duration_seconds` | Histogram | `operation`, `status` | Coordinator latency |
//! | `sc_errors_total` | Counter | `operation`, `code` | Failed operations |
//! | `sc_store_latency_seconds` | Histogram | `operation` | Session store latency |
//! | `sc_store_conflicts_total` | Counter | `operation` | Rejected conditional writes |
//! | `sc_actor_mailbox_depth` | Gauge | `actor_type` | Backpressure indicator |
//! | `sc_actor_panics_total` | Counter | `actor_type` | Crashed actors |
//! | `sc_http_requests_total` | Counter | `method`, `endpoint`, `status` | HTTP traffic |

pub mod health;
pub mod metrics;

pub use health::HealthState;
pub use metrics::init_metrics_recorder;
