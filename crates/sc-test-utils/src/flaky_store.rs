//! Session store wrapper that injects failures.
//!
//! Delegates to an inner [`SessionStore`] (usually the in-memory one) and
//! fails a configurable number of upcoming `update` calls, or every call
//! while an outage is switched on. Injected failures never reach the inner
//! store, so its state is exactly what succeeded.
//!
//! # Example
//!
//! ```rust,ignore
//! let store = FlakyStore::new(Arc::new(InMemorySessionStore::new()));
//! store.conflict_next_updates(1);
//! store.set_outage(true);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::{SessionId, UserId};
use sc_service::errors::ScError;
use sc_service::models::{CallSession, Participant, SessionStatus};
use sc_service::store::{InMemorySessionStore, SessionStore, SessionUpdate};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Failure-injecting [`SessionStore`].
pub struct FlakyStore {
    inner: Arc<dyn SessionStore>,
    conflicts: AtomicU32,
    update_failures: AtomicU32,
    outage: AtomicBool,
    updates_attempted: AtomicU32,
}

impl FlakyStore {
    #[must_use]
    pub fn new(inner: Arc<dyn SessionStore>) -> Self {
        Self {
            inner,
            conflicts: AtomicU32::new(0),
            update_failures: AtomicU32::new(0),
            outage: AtomicBool::new(false),
            updates_attempted: AtomicU32::new(0),
        }
    }

    /// Wrapper around a fresh in-memory store.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemorySessionStore::new()))
    }

    /// The next `n` updates return `Conflict` as if another writer won.
    pub fn conflict_next_updates(&self, n: u32) {
        self.conflicts.store(n, Ordering::SeqCst);
    }

    /// The next `n` updates return `Store`.
    pub fn fail_next_updates(&self, n: u32) {
        self.update_failures.store(n, Ordering::SeqCst);
    }

    /// While on, every call returns `Store`.
    pub fn set_outage(&self, on: bool) {
        self.outage.store(on, Ordering::SeqCst);
    }

    /// Number of `update` calls seen, injected failures included.
    pub fn updates_attempted(&self) -> u32 {
        self.updates_attempted.load(Ordering::SeqCst)
    }

    fn check_outage(&self) -> Result<(), ScError> {
        if self.outage.load(Ordering::SeqCst) {
            return Err(ScError::Store("injected outage".to_string()));
        }
        Ok(())
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn create(&self, session: &CallSession) -> Result<SessionId, ScError> {
        self.check_outage()?;
        self.inner.create(session).await
    }

    async fn get(&self, id: SessionId) -> Result<CallSession, ScError> {
        self.check_outage()?;
        self.inner.get(id).await
    }

    async fn find_active_between(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Option<CallSession>, ScError> {
        self.check_outage()?;
        self.inner.find_active_between(a, b).await
    }

    async fn find_active_room(&self, room_name: &str) -> Result<Option<CallSession>, ScError> {
        self.check_outage()?;
        self.inner.find_active_room(room_name).await
    }

    async fn update(
        &self,
        id: SessionId,
        expected_version: u64,
        expected_status: SessionStatus,
        update: SessionUpdate,
    ) -> Result<CallSession, ScError> {
        self.updates_attempted.fetch_add(1, Ordering::SeqCst);
        self.check_outage()?;
        if Self::take(&self.conflicts) {
            return Err(ScError::Conflict("injected conflict".to_string()));
        }
        if Self::take(&self.update_failures) {
            return Err(ScError::Store("injected update failure".to_string()));
        }
        self.inner
            .update(id, expected_version, expected_status, update)
            .await
    }

    async fn add_participant(
        &self,
        participant: &Participant,
        capacity: u32,
    ) -> Result<(), ScError> {
        self.check_outage()?;
        self.inner.add_participant(participant, capacity).await
    }

    async fn close_participant(
        &self,
        id: SessionId,
        user_id: &UserId,
        left_at: DateTime<Utc>,
    ) -> Result<(), ScError> {
        self.check_outage()?;
        self.inner.close_participant(id, user_id, left_at).await
    }

    async fn participants(&self, id: SessionId) -> Result<Vec<Participant>, ScError> {
        self.check_outage()?;
        self.inner.participants(id).await
    }

    async fn ping(&self) -> Result<(), ScError> {
        self.check_outage()?;
        self.inner.ping().await
    }
}
