//! Signaling Controller models.
//!
//! Contains the session entity, membership records, emitted domain events
//! and the request bodies accepted by the HTTP adapter.

use chrono::{DateTime, Utc};
use common::types::{SessionId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum participants of a one-to-one call.
pub const CALL_MAX_PARTICIPANTS: u32 = 2;

/// Smallest capacity accepted for a streaming room.
pub const MIN_ROOM_CAPACITY: u32 = 2;

/// Maximum length of a room name.
pub const MAX_ROOM_NAME_LENGTH: usize = 128;

/// Maximum length of a free-text end reason.
pub const MAX_END_REASON_LENGTH: usize = 256;

/// End reason recorded when nobody gave one.
pub const DEFAULT_END_REASON: &str = "hangup";

/// Session status.
///
/// `Ended`, `Rejected`, `Missed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Created, callee not yet reached (or room waiting for its first joiner).
    Pending,
    /// Callee's client acknowledged the incoming call.
    Ringing,
    /// Media path established, participants connected.
    Active,
    /// Hung up, cancelled or reclaimed.
    Ended,
    /// Callee declined.
    Rejected,
    /// No answer before the timeout.
    Missed,
    /// Irrecoverable signaling or transport error.
    Failed,
}

impl SessionStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [SessionStatus; 7] = [
        SessionStatus::Pending,
        SessionStatus::Ringing,
        SessionStatus::Active,
        SessionStatus::Ended,
        SessionStatus::Rejected,
        SessionStatus::Missed,
        SessionStatus::Failed,
    ];

    /// Returns the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Pending => "pending",
            SessionStatus::Ringing => "ringing",
            SessionStatus::Active => "active",
            SessionStatus::Ended => "ended",
            SessionStatus::Rejected => "rejected",
            SessionStatus::Missed => "missed",
            SessionStatus::Failed => "failed",
        }
    }

    /// Whether the status has no outgoing transitions.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionStatus::Ended
                | SessionStatus::Rejected
                | SessionStatus::Missed
                | SessionStatus::Failed
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A one-to-one call or a streaming room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSession {
    pub id: SessionId,
    pub initiator_id: UserId,
    pub recipient_id: Option<UserId>,
    pub is_live_stream: bool,
    pub room_name: Option<String>,
    pub status: SessionStatus,
    pub max_participants: u32,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
    pub duration_seconds: Option<i64>,
    pub end_reason: Option<String>,
    /// Optimistic-concurrency token, bumped by every successful store update.
    pub version: u64,
}

impl CallSession {
    /// Build a fresh `Pending` session.
    #[must_use]
    pub fn new_pending(
        initiator_id: UserId,
        recipient_id: Option<UserId>,
        is_live_stream: bool,
        max_participants: u32,
        room_name: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            initiator_id,
            recipient_id,
            is_live_stream,
            room_name,
            status: SessionStatus::Pending,
            max_participants,
            created_at: now,
            started_at: None,
            ended_at: None,
            updated_at: now,
            duration_seconds: None,
            end_reason: None,
            version: 0,
        }
    }

    /// Whether room semantics apply (no single callee, capacity from the initiator).
    #[must_use]
    pub fn is_room(&self) -> bool {
        self.is_live_stream
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether `user_id` is the designated callee.
    #[must_use]
    pub fn is_recipient(&self, user_id: &UserId) -> bool {
        self.recipient_id.as_ref() == Some(user_id)
    }

    /// Whether `user_id` is the initiator or the callee.
    #[must_use]
    pub fn is_party(&self, user_id: &UserId) -> bool {
        &self.initiator_id == user_id || self.is_recipient(user_id)
    }

    /// Unordered pair key for one-to-one calls; `None` for rooms.
    #[must_use]
    pub fn pair_key(&self) -> Option<String> {
        if self.is_room() {
            return None;
        }
        self.recipient_id
            .as_ref()
            .map(|recipient| pair_key(&self.initiator_id, recipient))
    }

    /// Room-name key for named rooms; `None` for calls.
    #[must_use]
    pub fn room_key(&self) -> Option<String> {
        if !self.is_room() {
            return None;
        }
        self.room_name.as_deref().map(room_key)
    }

    /// `ended_at - started_at` in whole seconds when both are set.
    #[must_use]
    pub fn computed_duration(&self) -> Option<i64> {
        match (self.started_at, self.ended_at) {
            (Some(started), Some(ended)) => Some((ended - started).num_seconds().max(0)),
            _ => None,
        }
    }
}

/// Canonical key of an unordered user pair.
#[must_use]
pub fn pair_key(a: &UserId, b: &UserId) -> String {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    format!("{lo}:{hi}")
}

/// Canonical key of a room name.
#[must_use]
pub fn room_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// A user's presence in one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    pub user_id: UserId,
    pub session_id: SessionId,
    pub joined_at: DateTime<Utc>,
    pub left_at: Option<DateTime<Utc>>,
}

impl Participant {
    /// Open a membership now.
    #[must_use]
    pub fn open(session_id: SessionId, user_id: UserId) -> Self {
        Self {
            user_id,
            session_id,
            joined_at: Utc::now(),
            left_at: None,
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.left_at.is_none()
    }
}

/// What a [`SessionEvent`] reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionEventKind {
    StatusChanged,
    ParticipantJoined,
    ParticipantLeft,
}

/// Domain event handed to the notification fan-out collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session_id: SessionId,
    pub kind: SessionEventKind,
    pub from_status: SessionStatus,
    pub to_status: SessionStatus,
    /// User who caused the change; `None` for system-triggered transitions.
    pub actor_user_id: Option<UserId>,
    /// Participant affected by a membership event.
    pub subject_user_id: Option<UserId>,
    pub timestamp: DateTime<Utc>,
}

impl SessionEvent {
    #[must_use]
    pub fn status_changed(
        session_id: SessionId,
        from_status: SessionStatus,
        to_status: SessionStatus,
        actor_user_id: Option<UserId>,
    ) -> Self {
        Self {
            session_id,
            kind: SessionEventKind::StatusChanged,
            from_status,
            to_status,
            actor_user_id,
            subject_user_id: None,
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn membership(
        session_id: SessionId,
        kind: SessionEventKind,
        status: SessionStatus,
        user_id: UserId,
    ) -> Self {
        Self {
            session_id,
            kind,
            from_status: status,
            to_status: status,
            actor_user_id: Some(user_id.clone()),
            subject_user_id: Some(user_id),
            timestamp: Utc::now(),
        }
    }
}

/// Parameters of an `initiate` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiateSession {
    pub initiator_id: UserId,
    #[serde(default)]
    pub recipient_id: Option<UserId>,
    #[serde(default)]
    pub is_live_stream: bool,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub room_name: Option<String>,
}

impl InitiateSession {
    /// A one-to-one call from `initiator` to `recipient`.
    #[must_use]
    pub fn call(initiator: impl Into<UserId>, recipient: impl Into<UserId>) -> Self {
        Self {
            initiator_id: initiator.into(),
            recipient_id: Some(recipient.into()),
            is_live_stream: false,
            max_participants: None,
            room_name: None,
        }
    }

    /// A named streaming room.
    #[must_use]
    pub fn room(
        initiator: impl Into<UserId>,
        room_name: impl Into<String>,
        max_participants: Option<u32>,
    ) -> Self {
        Self {
            initiator_id: initiator.into(),
            recipient_id: None,
            is_live_stream: true,
            max_participants,
            room_name: Some(room_name.into()),
        }
    }
}

/// HTTP body for `POST /api/v1/sessions`; the initiator comes from the
/// authenticated caller, never from the body.
#[derive(Debug, Clone, Deserialize)]
pub struct InitiateSessionRequest {
    #[serde(default)]
    pub recipient_id: Option<String>,
    #[serde(default)]
    pub is_live_stream: bool,
    #[serde(default)]
    pub max_participants: Option<u32>,
    #[serde(default)]
    pub room_name: Option<String>,
}

/// Optional free-text reason for `reject`, `end` and `failed`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReasonRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Query for `GET /api/v1/calls/active`.
#[derive(Debug, Clone, Deserialize)]
pub struct ActiveCallQuery {
    pub peer: String,
}

/// Body of `GET /api/v1/sessions/:id/participants`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantsResponse {
    pub session_id: SessionId,
    pub participants: Vec<UserId>,
}

/// Readiness check response.
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    /// "ready" or "not_ready".
    pub status: &'static str,

    /// Session store reachability.
    pub store: &'static str,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_terminal_statuses() {
        let terminal: Vec<_> = SessionStatus::ALL
            .iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(
            terminal,
            vec![
                &SessionStatus::Ended,
                &SessionStatus::Rejected,
                &SessionStatus::Missed,
                &SessionStatus::Failed
            ]
        );
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&SessionStatus::Ringing).unwrap();
        assert_eq!(json, "\"ringing\"");
        assert_eq!(SessionStatus::Missed.to_string(), "missed");
    }

    #[test]
    fn test_pair_key_is_unordered() {
        let a = UserId::from("alice");
        let b = UserId::from("bob");
        assert_eq!(pair_key(&a, &b), pair_key(&b, &a));
        assert_eq!(pair_key(&a, &b), "alice:bob");
    }

    #[test]
    fn test_pair_key_only_for_calls() {
        let call = CallSession::new_pending("a".into(), Some("b".into()), false, 2, None);
        assert_eq!(call.pair_key().as_deref(), Some("a:b"));
        assert!(call.room_key().is_none());

        let room =
            CallSession::new_pending("a".into(), None, true, 10, Some(" Town Hall ".into()));
        assert!(room.pair_key().is_none());
        assert_eq!(room.room_key().as_deref(), Some("town hall"));
    }

    #[test]
    fn test_computed_duration() {
        let mut session = CallSession::new_pending("a".into(), Some("b".into()), false, 2, None);
        assert_eq!(session.computed_duration(), None);

        let start = Utc::now();
        session.started_at = Some(start);
        session.ended_at = Some(start + Duration::seconds(42));
        assert_eq!(session.computed_duration(), Some(42));
    }

    #[test]
    fn test_party_checks() {
        let session = CallSession::new_pending("a".into(), Some("b".into()), false, 2, None);
        assert!(session.is_party(&"a".into()));
        assert!(session.is_party(&"b".into()));
        assert!(!session.is_party(&"c".into()));
        assert!(session.is_recipient(&"b".into()));
        assert!(!session.is_recipient(&"a".into()));
    }

    #[test]
    fn test_initiate_request_defaults() {
        let req: InitiateSessionRequest =
            serde_json::from_str(r#"{"recipient_id":"bob"}"#).unwrap();
        assert_eq!(req.recipient_id.as_deref(), Some("bob"));
        assert!(!req.is_live_stream);
        assert!(req.max_participants.is_none());
    }
}
