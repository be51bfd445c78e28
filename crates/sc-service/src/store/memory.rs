//! In-memory session store.
//!
//! All state lives behind one `tokio::sync::RwLock`, so `create` and
//! `update` are atomic with respect to each other exactly like the Lua
//! scripts of the Redis store. Used by tests and `SC_STORE_BACKEND=memory`.

use crate::errors::ScError;
use crate::models::{pair_key, room_key, CallSession, Participant, SessionStatus};
use crate::observability::metrics;
use crate::store::{SessionStore, SessionUpdate};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::{SessionId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    sessions: HashMap<SessionId, CallSession>,
    /// Pair key -> non-terminal call holding it.
    pairs: HashMap<String, SessionId>,
    /// Room key -> non-terminal room holding it.
    rooms: HashMap<String, SessionId>,
    /// Latest membership record per user, per session.
    participants: HashMap<SessionId, HashMap<UserId, Participant>>,
}

impl Inner {
    /// Index entry is live only while its session is non-terminal.
    fn holder(&self, index: &HashMap<String, SessionId>, key: &str) -> Option<&CallSession> {
        index
            .get(key)
            .and_then(|id| self.sessions.get(id))
            .filter(|session| !session.is_terminal())
    }
}

/// `SessionStore` backed by process memory.
///
/// Cheaply cloneable; clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemorySessionStore {
    inner: Arc<RwLock<Inner>>,
}

impl InMemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions, terminal ones included.
    pub async fn len(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, session: &CallSession) -> Result<SessionId, ScError> {
        let start = Instant::now();
        let mut inner = self.inner.write().await;

        if inner.sessions.contains_key(&session.id) {
            return Err(ScError::Internal(format!(
                "session {} already exists",
                session.id
            )));
        }

        let pair = session.pair_key();
        let room = session.room_key();

        if let Some(key) = &pair {
            if inner.holder(&inner.pairs, key).is_some() {
                return Err(ScError::AlreadyInCall);
            }
        }
        if let Some(key) = &room {
            if inner.holder(&inner.rooms, key).is_some() {
                return Err(ScError::RoomNameTaken(key.clone()));
            }
        }

        if let Some(key) = pair {
            inner.pairs.insert(key, session.id);
        }
        if let Some(key) = room {
            inner.rooms.insert(key, session.id);
        }
        inner.sessions.insert(session.id, session.clone());

        metrics::record_store_latency("create", start.elapsed());
        debug!(target: "sc.store.memory", session_id = %session.id, "Created session");
        Ok(session.id)
    }

    async fn get(&self, id: SessionId) -> Result<CallSession, ScError> {
        let inner = self.inner.read().await;
        inner
            .sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| ScError::NotFound(id.to_string()))
    }

    async fn find_active_between(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Option<CallSession>, ScError> {
        let inner = self.inner.read().await;
        Ok(inner.holder(&inner.pairs, &pair_key(a, b)).cloned())
    }

    async fn find_active_room(&self, room_name: &str) -> Result<Option<CallSession>, ScError> {
        let inner = self.inner.read().await;
        Ok(inner.holder(&inner.rooms, &room_key(room_name)).cloned())
    }

    async fn update(
        &self,
        id: SessionId,
        expected_version: u64,
        expected_status: SessionStatus,
        update: SessionUpdate,
    ) -> Result<CallSession, ScError> {
        let start = Instant::now();
        let mut inner = self.inner.write().await;

        let current = inner
            .sessions
            .get(&id)
            .ok_or_else(|| ScError::NotFound(id.to_string()))?;

        if current.version != expected_version || current.status != expected_status {
            metrics::record_store_conflict("update");
            return Err(ScError::Conflict(format!(
                "expected version {expected_version} ({expected_status}), found version {} ({})",
                current.version, current.status
            )));
        }

        let next = update.apply_to(current);

        if next.is_terminal() {
            if let Some(key) = next.pair_key() {
                if inner.pairs.get(&key) == Some(&id) {
                    inner.pairs.remove(&key);
                }
            }
            if let Some(key) = next.room_key() {
                if inner.rooms.get(&key) == Some(&id) {
                    inner.rooms.remove(&key);
                }
            }
        }
        inner.sessions.insert(id, next.clone());

        metrics::record_store_latency("update", start.elapsed());
        Ok(next)
    }

    async fn add_participant(
        &self,
        participant: &Participant,
        capacity: u32,
    ) -> Result<(), ScError> {
        let mut inner = self.inner.write().await;
        let id = participant.session_id;
        let session = inner
            .sessions
            .get(&id)
            .ok_or_else(|| ScError::NotFound(id.to_string()))?;
        if session.is_terminal() {
            return Err(ScError::Conflict(format!(
                "session {id} is {}",
                session.status
            )));
        }
        let members = inner.participants.entry(id).or_default();

        if members
            .get(&participant.user_id)
            .is_some_and(Participant::is_open)
        {
            return Ok(());
        }
        let open = members.values().filter(|p| p.is_open()).count();
        if open >= capacity as usize {
            return Err(ScError::RoomFull { capacity });
        }

        members.insert(participant.user_id.clone(), participant.clone());
        Ok(())
    }

    async fn close_participant(
        &self,
        id: SessionId,
        user_id: &UserId,
        left_at: DateTime<Utc>,
    ) -> Result<(), ScError> {
        let mut inner = self.inner.write().await;
        if let Some(record) = inner
            .participants
            .get_mut(&id)
            .and_then(|members| members.get_mut(user_id))
        {
            if record.is_open() {
                record.left_at = Some(left_at);
            }
        }
        Ok(())
    }

    async fn participants(&self, id: SessionId) -> Result<Vec<Participant>, ScError> {
        let inner = self.inner.read().await;
        let mut records: Vec<Participant> = inner
            .participants
            .get(&id)
            .map(|members| members.values().cloned().collect())
            .unwrap_or_default();
        records.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(records)
    }

    async fn ping(&self) -> Result<(), ScError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn call(a: &str, b: &str) -> CallSession {
        CallSession::new_pending(a.into(), Some(b.into()), false, 2, None)
    }

    fn room(owner: &str, name: &str) -> CallSession {
        CallSession::new_pending(owner.into(), None, true, 10, Some(name.to_string()))
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemorySessionStore::new();
        let session = call("alice", "bob");

        let id = store.create(&session).await.unwrap();
        assert_eq!(store.get(id).await.unwrap(), session);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_unknown_is_not_found() {
        let store = InMemorySessionStore::new();
        let result = store.get(SessionId::new()).await;
        assert!(matches!(result, Err(ScError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_pair_claim_is_unordered() {
        let store = InMemorySessionStore::new();
        store.create(&call("alice", "bob")).await.unwrap();

        let result = store.create(&call("bob", "alice")).await;
        assert!(matches!(result, Err(ScError::AlreadyInCall)));

        let found = store
            .find_active_between(&"bob".into(), &"alice".into())
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn test_room_name_claim_is_case_insensitive() {
        let store = InMemorySessionStore::new();
        store.create(&room("alice", "Town Hall")).await.unwrap();

        let result = store.create(&room("bob", "  town hall ")).await;
        assert!(matches!(result, Err(ScError::RoomNameTaken(_))));
        assert!(store.find_active_room("TOWN HALL").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_update_rejects_stale_version_and_status() {
        let store = InMemorySessionStore::new();
        let session = call("alice", "bob");
        store.create(&session).await.unwrap();

        let ringing = store
            .update(
                session.id,
                0,
                SessionStatus::Pending,
                SessionUpdate::status(SessionStatus::Ringing),
            )
            .await
            .unwrap();
        assert_eq!(ringing.version, 1);

        // Same expected version again: stale.
        let stale_version = store
            .update(
                session.id,
                0,
                SessionStatus::Pending,
                SessionUpdate::status(SessionStatus::Ringing),
            )
            .await;
        assert!(matches!(stale_version, Err(ScError::Conflict(_))));

        // Right version, wrong status.
        let stale_status = store
            .update(
                session.id,
                1,
                SessionStatus::Pending,
                SessionUpdate::status(SessionStatus::Missed),
            )
            .await;
        assert!(matches!(stale_status, Err(ScError::Conflict(_))));

        // Nothing changed.
        assert_eq!(store.get(session.id).await.unwrap(), ringing);
    }

    #[tokio::test]
    async fn test_terminal_update_releases_pair() {
        let store = InMemorySessionStore::new();
        let session = call("alice", "bob");
        store.create(&session).await.unwrap();

        store
            .update(
                session.id,
                0,
                SessionStatus::Pending,
                SessionUpdate::status(SessionStatus::Ended).with_ended(Utc::now(), "hangup"),
            )
            .await
            .unwrap();

        assert!(store
            .find_active_between(&"alice".into(), &"bob".into())
            .await
            .unwrap()
            .is_none());
        store.create(&call("bob", "alice")).await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_creates_claim_pair_once() {
        let store = InMemorySessionStore::new();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.create(&call("alice", "bob")).await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            let result = handle.await.unwrap();
            if result.is_ok() {
                successes += 1;
            } else {
                assert!(matches!(result, Err(ScError::AlreadyInCall)));
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_participant_records() {
        let store = InMemorySessionStore::new();
        let session = room("alice", "lobby");
        store.create(&session).await.unwrap();

        store
            .add_participant(&Participant::open(session.id, "alice".into()), 8)
            .await
            .unwrap();
        store
            .add_participant(&Participant::open(session.id, "bob".into()), 8)
            .await
            .unwrap();
        store
            .close_participant(session.id, &"bob".into(), Utc::now())
            .await
            .unwrap();
        // Closing twice is a no-op.
        store
            .close_participant(session.id, &"bob".into(), Utc::now())
            .await
            .unwrap();

        let records = store.participants(session.id).await.unwrap();
        assert_eq!(records.len(), 2);
        let open: HashSet<_> = records
            .iter()
            .filter(|p| p.is_open())
            .map(|p| p.user_id.clone())
            .collect();
        assert_eq!(open, HashSet::from([UserId::from("alice")]));
    }

    #[tokio::test]
    async fn test_add_participant_to_unknown_session_fails() {
        let store = InMemorySessionStore::new();
        let result = store
            .add_participant(&Participant::open(SessionId::new(), "alice".into()), 8)
            .await;
        assert!(matches!(result, Err(ScError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_add_participant_respects_capacity() {
        let store = InMemorySessionStore::new();
        let session = room("host", "small");
        store.create(&session).await.unwrap();

        for user in ["host", "ann"] {
            store
                .add_participant(&Participant::open(session.id, user.into()), 2)
                .await
                .unwrap();
        }

        let result = store
            .add_participant(&Participant::open(session.id, "ben".into()), 2)
            .await;
        assert!(matches!(result, Err(ScError::RoomFull { capacity: 2 })));

        // Re-admitting an open member is not a new seat.
        store
            .add_participant(&Participant::open(session.id, "ann".into()), 2)
            .await
            .unwrap();

        // A closed record frees its seat.
        store
            .close_participant(session.id, &"ann".into(), Utc::now())
            .await
            .unwrap();
        store
            .add_participant(&Participant::open(session.id, "ben".into()), 2)
            .await
            .unwrap();

        let open = store
            .participants(session.id)
            .await
            .unwrap()
            .into_iter()
            .filter(Participant::is_open)
            .count();
        assert_eq!(open, 2);
    }

    #[tokio::test]
    async fn test_add_participant_to_terminal_session_conflicts() {
        let store = InMemorySessionStore::new();
        let session = room("host", "closed");
        store.create(&session).await.unwrap();
        store
            .update(
                session.id,
                session.version,
                SessionStatus::Pending,
                SessionUpdate::status(SessionStatus::Ended).with_ended(Utc::now(), "hangup"),
            )
            .await
            .unwrap();

        let result = store
            .add_participant(&Participant::open(session.id, "late".into()), 8)
            .await;
        assert!(matches!(result, Err(ScError::Conflict(_))));
        assert!(store.participants(session.id).await.unwrap().is_empty());
    }
}
