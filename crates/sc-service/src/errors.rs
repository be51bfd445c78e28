//! Signaling Controller error types.
//!
//! Every failure is recoverable and returned to the immediate caller.
//! `Conflict` is the only error internal callers retry automatically.
//! Errors map to HTTP responses via `IntoResponse`; infrastructure details
//! are logged server-side and never returned to clients.

use crate::models::SessionStatus;
use crate::state_machine::{InvalidTransition, Transition};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Signaling Controller error type.
///
/// Maps to HTTP status codes:
/// - `NotFound`: 404
/// - `InvalidTransition`, `AlreadyInCall`, `AlreadyJoined`, `RoomNameTaken`, `Conflict`: 409
/// - `RoomFull`: 429
/// - `Unauthenticated`: 401
/// - `Unauthorized`: 403
/// - `InvalidRequest`: 400
/// - `Store`, `ActorUnavailable`: 503
/// - `Config`, `Internal`: 500
#[derive(Debug, Error)]
pub enum ScError {
    /// Unknown session.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Transition not valid from the current status.
    #[error("Invalid transition: cannot {transition} a {from} session")]
    InvalidTransition {
        from: SessionStatus,
        transition: Transition,
    },

    /// A non-terminal one-to-one session already exists for the pair.
    #[error("A call between these users is already in progress")]
    AlreadyInCall,

    /// Room is at capacity.
    #[error("Room is full (capacity {capacity})")]
    RoomFull { capacity: u32 },

    /// User already holds an open membership.
    #[error("User is already a participant")]
    AlreadyJoined,

    /// No authenticated caller identity on the request.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    /// Actor lacks standing for the operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Lost an optimistic-update race; re-read and retry.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Another non-terminal room holds this name.
    #[error("Room name already in use")]
    RoomNameTaken(String),

    /// Malformed request parameters.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Persistence outage; the in-flight operation did not apply.
    #[error("Store error: {0}")]
    Store(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Session actor stopped before answering; the coordinator re-routes.
    #[error("Session actor unavailable")]
    ActorUnavailable,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ScError {
    /// Stable machine-readable code (metrics label and API `error.code`).
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            ScError::NotFound(_) => "NOT_FOUND",
            ScError::InvalidTransition { .. } => "INVALID_TRANSITION",
            ScError::AlreadyInCall => "ALREADY_IN_CALL",
            ScError::RoomFull { .. } => "ROOM_FULL",
            ScError::AlreadyJoined => "ALREADY_JOINED",
            ScError::Unauthenticated(_) => "UNAUTHENTICATED",
            ScError::Unauthorized(_) => "UNAUTHORIZED",
            ScError::Conflict(_) => "CONFLICT",
            ScError::RoomNameTaken(_) => "ROOM_NAME_TAKEN",
            ScError::InvalidRequest(_) => "INVALID_REQUEST",
            ScError::Store(_) => "STORE_UNAVAILABLE",
            ScError::ActorUnavailable => "UNAVAILABLE",
            ScError::Config(_) | ScError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            ScError::NotFound(_) => StatusCode::NOT_FOUND,
            ScError::InvalidTransition { .. }
            | ScError::AlreadyInCall
            | ScError::AlreadyJoined
            | ScError::RoomNameTaken(_)
            | ScError::Conflict(_) => StatusCode::CONFLICT,
            ScError::RoomFull { .. } => StatusCode::TOO_MANY_REQUESTS,
            ScError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ScError::Unauthorized(_) => StatusCode::FORBIDDEN,
            ScError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ScError::Store(_) | ScError::ActorUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ScError::Config(_) | ScError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether an internal caller should re-read and retry.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, ScError::Conflict(_))
    }

    /// Returns a client-safe error message (no internal details).
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            ScError::Store(_)
            | ScError::Config(_)
            | ScError::Internal(_)
            | ScError::ActorUnavailable => "An internal error occurred".to_string(),
            ScError::NotFound(_) => "Session not found".to_string(),
            ScError::Conflict(_) => "Session changed concurrently, please retry".to_string(),
            ScError::Unauthenticated(msg)
            | ScError::Unauthorized(msg)
            | ScError::InvalidRequest(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

impl From<InvalidTransition> for ScError {
    fn from(err: InvalidTransition) -> Self {
        ScError::InvalidTransition {
            from: err.from,
            transition: err.transition,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
}

impl IntoResponse for ScError {
    fn into_response(self) -> Response {
        match &self {
            ScError::Store(err) => {
                tracing::error!(target: "sc.store", error = %err, "Session store operation failed");
            }
            ScError::Config(err) | ScError::Internal(err) => {
                tracing::error!(target: "sc.errors", error = %err, "Internal error");
            }
            ScError::ActorUnavailable => {
                tracing::warn!(target: "sc.errors", "Session actor unavailable");
            }
            _ => {}
        }

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code(),
                message: self.client_message(),
            },
        };

        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            ScError::NotFound("x".to_string()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ScError::InvalidTransition {
                from: SessionStatus::Ended,
                transition: Transition::Accept
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(ScError::AlreadyInCall.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ScError::RoomFull { capacity: 3 }.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ScError::Unauthorized("no".to_string()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ScError::Unauthenticated("who".to_string()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ScError::InvalidRequest("bad".to_string()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ScError::Store("down".to_string()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ScError::Internal("boom".to_string()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_only_conflict_is_retryable() {
        assert!(ScError::Conflict("stale".to_string()).is_retryable());
        assert!(!ScError::AlreadyInCall.is_retryable());
        assert!(!ScError::Store("down".to_string()).is_retryable());
        assert!(!ScError::InvalidTransition {
            from: SessionStatus::Missed,
            transition: Transition::Accept
        }
        .is_retryable());
    }

    #[test]
    fn test_client_messages_hide_internal_details() {
        let store_err = ScError::Store("connection refused at 10.0.0.7:6379".to_string());
        assert!(!store_err.client_message().contains("10.0.0.7"));
        assert_eq!(store_err.client_message(), "An internal error occurred");

        let not_found = ScError::NotFound("session 0190".to_string());
        assert_eq!(not_found.client_message(), "Session not found");
    }

    #[test]
    fn test_invalid_transition_conversion_and_display() {
        let err: ScError = InvalidTransition {
            from: SessionStatus::Missed,
            transition: Transition::Accept,
        }
        .into();
        assert_eq!(err.error_code(), "INVALID_TRANSITION");
        assert_eq!(
            err.to_string(),
            "Invalid transition: cannot accept a missed session"
        );
    }

    #[tokio::test]
    async fn test_into_response_body() {
        let response = ScError::RoomFull { capacity: 3 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"]["code"], "ROOM_FULL");
        assert_eq!(json["error"]["message"], "Room is full (capacity 3)");
    }
}
