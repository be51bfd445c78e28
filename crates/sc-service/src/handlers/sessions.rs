//! Session handlers.
//!
//! - `POST /api/v1/sessions` - Start a call or open a room
//! - `GET /api/v1/sessions/:id` - Current session state
//! - `GET /api/v1/sessions/:id/participants` - Open members in join order
//! - `POST /api/v1/sessions/:id/{ring,accept,reject,join,leave,end}`
//! - `GET /api/v1/calls/active?peer=<user>` - Live call with a peer
//! - `POST /internal/sessions/:id/{missed,failed}` - System reports
//!
//! User-facing routes act as the caller in `x-user-id`; the coordinator
//! decides whether that caller may perform the operation.

use crate::errors::ScError;
use crate::middleware::AuthenticatedUser;
use crate::models::{
    ActiveCallQuery, CallSession, InitiateSession, InitiateSessionRequest, ParticipantsResponse,
    ReasonRequest,
};
use crate::routes::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use common::types::{SessionId, UserId};
use std::sync::Arc;
use tracing::{info, instrument};

fn parse_session_id(raw: &str) -> Result<SessionId, ScError> {
    raw.parse()
        .map_err(|_| ScError::InvalidRequest("invalid session id".to_string()))
}

fn reason_of(body: Option<Json<ReasonRequest>>) -> Option<String> {
    body.and_then(|Json(body)| body.reason)
}

/// Handler for POST /api/v1/sessions
///
/// # Response
///
/// - 201 Created: session in `Pending`
/// - 400 Bad Request: malformed parameters
/// - 409 Conflict: `ALREADY_IN_CALL` or `ROOM_NAME_TAKEN`
#[instrument(skip_all, name = "sc.handlers.create_session", fields(user_id = %user.0))]
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(body): Json<InitiateSessionRequest>,
) -> Result<(StatusCode, Json<CallSession>), ScError> {
    let request = InitiateSession {
        initiator_id: user.0,
        recipient_id: body.recipient_id.map(UserId::from),
        is_live_stream: body.is_live_stream,
        max_participants: body.max_participants,
        room_name: body.room_name,
    };

    let session = state.coordinator.initiate(request).await?;

    info!(
        target: "sc.handlers.sessions",
        session_id = %session.id,
        "Session created"
    );
    Ok((StatusCode::CREATED, Json(session)))
}

/// Handler for GET /api/v1/sessions/:id
#[instrument(skip_all, name = "sc.handlers.get_session", fields(session_id = %id))]
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CallSession>, ScError> {
    let id = parse_session_id(&id)?;
    Ok(Json(state.coordinator.get(id).await?))
}

/// Handler for GET /api/v1/sessions/:id/participants
#[instrument(skip_all, name = "sc.handlers.get_participants", fields(session_id = %id))]
pub async fn get_participants(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ParticipantsResponse>, ScError> {
    let session_id = parse_session_id(&id)?;
    let participants = state.coordinator.members(session_id).await?;
    Ok(Json(ParticipantsResponse {
        session_id,
        participants,
    }))
}

/// Handler for POST /api/v1/sessions/:id/ring
#[instrument(skip_all, name = "sc.handlers.ring", fields(session_id = %id))]
pub async fn ring(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<CallSession>, ScError> {
    let id = parse_session_id(&id)?;
    Ok(Json(state.coordinator.ring(id, &user.0).await?))
}

/// Handler for POST /api/v1/sessions/:id/accept
#[instrument(skip_all, name = "sc.handlers.accept", fields(session_id = %id))]
pub async fn accept(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<CallSession>, ScError> {
    let id = parse_session_id(&id)?;
    Ok(Json(state.coordinator.accept(id, &user.0).await?))
}

/// Handler for POST /api/v1/sessions/:id/reject
///
/// Body is optional: `{"reason": "busy"}`.
#[instrument(skip_all, name = "sc.handlers.reject", fields(session_id = %id))]
pub async fn reject(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    body: Option<Json<ReasonRequest>>,
) -> Result<Json<CallSession>, ScError> {
    let id = parse_session_id(&id)?;
    Ok(Json(
        state
            .coordinator
            .reject(id, &user.0, reason_of(body))
            .await?,
    ))
}

/// Handler for POST /api/v1/sessions/:id/join
///
/// # Response
///
/// - 200 OK: caller is a member (joining twice is not an error)
/// - 409 Conflict: session is a call or already over
/// - 429 Too Many Requests: room is full
#[instrument(skip_all, name = "sc.handlers.join", fields(session_id = %id))]
pub async fn join(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<CallSession>, ScError> {
    let id = parse_session_id(&id)?;
    Ok(Json(state.coordinator.join(id, &user.0).await?))
}

/// Handler for POST /api/v1/sessions/:id/leave
#[instrument(skip_all, name = "sc.handlers.leave", fields(session_id = %id))]
pub async fn leave(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
) -> Result<Json<CallSession>, ScError> {
    let id = parse_session_id(&id)?;
    Ok(Json(state.coordinator.leave(id, &user.0).await?))
}

/// Handler for POST /api/v1/sessions/:id/end
#[instrument(skip_all, name = "sc.handlers.end", fields(session_id = %id))]
pub async fn end(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Path(id): Path<String>,
    body: Option<Json<ReasonRequest>>,
) -> Result<Json<CallSession>, ScError> {
    let id = parse_session_id(&id)?;
    Ok(Json(
        state.coordinator.end(id, &user.0, reason_of(body)).await?,
    ))
}

/// Handler for GET /api/v1/calls/active?peer=<user>
///
/// # Response
///
/// - 200 OK: the caller's non-terminal call with `peer`
/// - 404 Not Found: no such call
#[instrument(skip_all, name = "sc.handlers.active_call")]
pub async fn active_call(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthenticatedUser>,
    Query(query): Query<ActiveCallQuery>,
) -> Result<Json<CallSession>, ScError> {
    let peer = UserId::from(query.peer.trim());
    if peer.as_str().is_empty() {
        return Err(ScError::InvalidRequest("peer is required".to_string()));
    }

    state
        .coordinator
        .find_active_between(&user.0, &peer)
        .await?
        .map(Json)
        .ok_or_else(|| ScError::NotFound("no active call with peer".to_string()))
}

/// Handler for POST /internal/sessions/:id/missed
///
/// Used by an external watchdog when the built-in one is disabled.
#[instrument(skip_all, name = "sc.handlers.mark_missed", fields(session_id = %id))]
pub async fn mark_missed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<CallSession>, ScError> {
    let id = parse_session_id(&id)?;
    Ok(Json(state.coordinator.mark_missed(id).await?))
}

/// Handler for POST /internal/sessions/:id/failed
#[instrument(skip_all, name = "sc.handlers.mark_failed", fields(session_id = %id))]
pub async fn mark_failed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Option<Json<ReasonRequest>>,
) -> Result<Json<CallSession>, ScError> {
    let id = parse_session_id(&id)?;
    Ok(Json(
        state.coordinator.mark_failed(id, reason_of(body)).await?,
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_session_id() {
        let id = SessionId::new();
        assert_eq!(parse_session_id(&id.to_string()).unwrap(), id);
        assert!(matches!(
            parse_session_id("not-a-uuid"),
            Err(ScError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_reason_of_optional_body() {
        assert_eq!(reason_of(None), None);
        assert_eq!(
            reason_of(Some(Json(ReasonRequest {
                reason: Some("busy".to_string())
            }))),
            Some("busy".to_string())
        );
    }
}
