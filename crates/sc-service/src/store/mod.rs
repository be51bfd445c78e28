//! Session persistence.
//!
//! [`SessionStore`] is the durable record of every call and room. All
//! mutations of an existing session go through [`SessionStore::update`], a
//! conditional write that only applies when the stored `version` and
//! `status` still match what the caller read. Creation claims the
//! pair or room-name index in the same atomic step as the insert.
//!
//! Implementations:
//! - [`InMemorySessionStore`] for tests and single-instance deployments
//! - [`RedisSessionStore`] for shared persistence

pub mod lua_scripts;
pub mod memory;
pub mod redis;

use crate::errors::ScError;
use crate::models::{CallSession, Participant, SessionStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::{SessionId, UserId};

pub use self::memory::InMemorySessionStore;
pub use self::redis::RedisSessionStore;

/// Fields written by a conditional update. `None` leaves a field untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUpdate {
    pub status: SessionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub end_reason: Option<String>,
}

impl SessionUpdate {
    /// Status-only update.
    #[must_use]
    pub fn status(status: SessionStatus) -> Self {
        Self {
            status,
            started_at: None,
            ended_at: None,
            end_reason: None,
        }
    }

    #[must_use]
    pub fn with_started_at(mut self, at: DateTime<Utc>) -> Self {
        self.started_at = Some(at);
        self
    }

    /// Mark termination; `duration_seconds` is derived when the session started.
    #[must_use]
    pub fn with_ended(mut self, at: DateTime<Utc>, reason: impl Into<String>) -> Self {
        self.ended_at = Some(at);
        self.end_reason = Some(reason.into());
        self
    }

    /// Produce the next stored revision of `current`.
    ///
    /// Bumps `version` and `updated_at`. Does not check preconditions; callers
    /// compare `version` and `status` first.
    #[must_use]
    pub fn apply_to(&self, current: &CallSession) -> CallSession {
        let mut next = current.clone();
        next.status = self.status;
        if let Some(started_at) = self.started_at {
            next.started_at = Some(started_at);
        }
        if let Some(ended_at) = self.ended_at {
            next.ended_at = Some(ended_at);
        }
        if let Some(reason) = &self.end_reason {
            next.end_reason = Some(reason.clone());
        }
        next.duration_seconds = next.computed_duration();
        next.version = current.version + 1;
        next.updated_at = Utc::now();
        next
    }
}

/// Durable record of sessions and their participants.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a new session and claim its pair or room-name index.
    ///
    /// # Errors
    ///
    /// - `AlreadyInCall` when a non-terminal call holds the pair
    /// - `RoomNameTaken` when a non-terminal room holds the name
    /// - `Store` on persistence failure
    async fn create(&self, session: &CallSession) -> Result<SessionId, ScError>;

    /// # Errors
    ///
    /// `NotFound` for unknown ids, `Store` on persistence failure.
    async fn get(&self, id: SessionId) -> Result<CallSession, ScError>;

    /// Non-terminal one-to-one call between `a` and `b`, in either direction.
    async fn find_active_between(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Option<CallSession>, ScError>;

    /// Non-terminal room holding `room_name` (case-insensitive, trimmed).
    async fn find_active_room(&self, room_name: &str) -> Result<Option<CallSession>, ScError>;

    /// Conditionally apply `update`.
    ///
    /// Applies only when the stored session still has `expected_version` and
    /// `expected_status`; the write is all-or-nothing. Releases the pair or
    /// room-name index when the new status is terminal.
    ///
    /// # Errors
    ///
    /// - `Conflict` when the version or status no longer matches
    /// - `NotFound` for unknown ids
    /// - `Store` on persistence failure
    async fn update(
        &self,
        id: SessionId,
        expected_version: u64,
        expected_status: SessionStatus,
        update: SessionUpdate,
    ) -> Result<CallSession, ScError>;

    /// Record an open membership, replacing any closed record for the same user.
    ///
    /// Admission is checked against the stored open records, so instances
    /// with stale membership caches cannot overfill a room. A user who
    /// already holds an open record is admitted again without a write.
    ///
    /// # Errors
    ///
    /// - `RoomFull` when `capacity` other users hold open records
    /// - `Conflict` when the session is already terminal
    /// - `NotFound` for unknown sessions
    /// - `Store` on persistence failure
    async fn add_participant(
        &self,
        participant: &Participant,
        capacity: u32,
    ) -> Result<(), ScError>;

    /// Close the user's open membership; no-op when none is open.
    async fn close_participant(
        &self,
        id: SessionId,
        user_id: &UserId,
        left_at: DateTime<Utc>,
    ) -> Result<(), ScError>;

    /// Every membership record of the session, open or closed.
    async fn participants(&self, id: SessionId) -> Result<Vec<Participant>, ScError>;

    /// Reachability check for readiness probes.
    async fn ping(&self) -> Result<(), ScError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_apply_bumps_version_and_derives_duration() {
        let mut session = CallSession::new_pending("a".into(), Some("b".into()), false, 2, None);
        session.status = SessionStatus::Active;
        let started = Utc::now() - Duration::seconds(90);
        session.started_at = Some(started);
        session.version = 3;

        let ended = started + Duration::seconds(90);
        let next = SessionUpdate::status(SessionStatus::Ended)
            .with_ended(ended, "hangup")
            .apply_to(&session);

        assert_eq!(next.version, 4);
        assert_eq!(next.status, SessionStatus::Ended);
        assert_eq!(next.ended_at, Some(ended));
        assert_eq!(next.end_reason.as_deref(), Some("hangup"));
        assert_eq!(next.duration_seconds, Some(90));
        assert!(next.updated_at >= session.updated_at);
    }

    #[test]
    fn test_apply_without_start_leaves_duration_empty() {
        let session = CallSession::new_pending("a".into(), Some("b".into()), false, 2, None);
        let next = SessionUpdate::status(SessionStatus::Missed)
            .with_ended(Utc::now(), "timeout")
            .apply_to(&session);

        assert_eq!(next.duration_seconds, None);
        assert_eq!(next.version, 1);
    }
}
