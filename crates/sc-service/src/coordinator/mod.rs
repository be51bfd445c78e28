//! Signaling coordinator.
//!
//! Public operation surface for calls and streaming rooms. Each operation is
//! routed to the session's `SessionActor`, spawned on first use from the
//! stored session and its open participants. The registry of actor handles
//! is only locked for lookups and inserts, never across store I/O.
//!
//! Media transport calls happen here, after the actor has replied.

mod locks;

pub use locks::KeyedLocks;

use crate::actors::session::settle_terminal;
use crate::actors::{
    ActorContext, ActorMetrics, ActorSettings, Applied, Operation, SessionActor,
    SessionActorHandle,
};
use crate::config::{
    Config, DEFAULT_EMPTY_ROOM_GRACE_SECONDS, DEFAULT_MAX_ROOM_CAPACITY, DEFAULT_ROOM_CAPACITY,
    DEFAULT_RING_TIMEOUT_SECONDS,
};
use crate::errors::ScError;
use crate::events::EventPublisher;
use crate::media::MediaTransport;
use crate::membership::{MembershipResult, RoomMembership};
use crate::models::{
    CallSession, InitiateSession, SessionEvent, SessionEventKind, SessionStatus,
    CALL_MAX_PARTICIPANTS, MAX_END_REASON_LENGTH, MAX_ROOM_NAME_LENGTH, MIN_ROOM_CAPACITY,
};
use crate::observability::metrics as prom;
use crate::store::{SessionStore, SessionUpdate};
use chrono::Utc;
use common::types::{SessionId, UserId};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Attempts per operation when the actor went away or the store reported a
/// concurrent write.
const MAX_DISPATCH_ATTEMPTS: u32 = 4;

/// Reason recorded when the media path could not be established.
pub const REASON_MEDIA_FAILED: &str = "media-establish-failed";

/// Reason recorded when a `failed` report carries none.
pub const DEFAULT_FAILURE_REASON: &str = "signaling-error";

/// Reason recorded when the initiator's membership could not be stored.
const REASON_ADMISSION_FAILED: &str = "initiator-admission-failed";

/// Coordinator tuning, usually derived from [`Config`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Capacity of rooms created without `max_participants`.
    pub default_room_capacity: u32,
    /// Ceiling applied to requested room capacities.
    pub max_room_capacity: u32,
    /// Ring watchdog; `None` leaves missed-call detection to an external caller.
    pub ring_timeout: Option<Duration>,
    /// Delay before an empty room is ended.
    pub empty_room_grace: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            default_room_capacity: DEFAULT_ROOM_CAPACITY,
            max_room_capacity: DEFAULT_MAX_ROOM_CAPACITY,
            ring_timeout: Some(Duration::from_secs(DEFAULT_RING_TIMEOUT_SECONDS)),
            empty_room_grace: Duration::from_secs(DEFAULT_EMPTY_ROOM_GRACE_SECONDS),
        }
    }
}

impl From<&Config> for CoordinatorSettings {
    fn from(config: &Config) -> Self {
        Self {
            default_room_capacity: config.default_room_capacity,
            max_room_capacity: config.max_room_capacity,
            ring_timeout: config.ring_timeout(),
            empty_room_grace: config.empty_room_grace(),
        }
    }
}

/// Where an operation for a session goes.
enum Route {
    Live(SessionActorHandle),
    Terminal(CallSession),
}

/// Entry point for every signaling operation.
///
/// Cheap to clone; clones share the registry and collaborators.
#[derive(Clone)]
pub struct SignalingCoordinator {
    ctx: ActorContext,
    settings: CoordinatorSettings,
    registry: Arc<Mutex<HashMap<SessionId, SessionActorHandle>>>,
    initiate_locks: Arc<KeyedLocks>,
    /// Root token; every session actor runs under a child.
    cancel_token: CancellationToken,
}

impl SignalingCoordinator {
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        publisher: Arc<dyn EventPublisher>,
        media: Arc<dyn MediaTransport>,
        settings: CoordinatorSettings,
        cancel_token: CancellationToken,
    ) -> Self {
        let ctx = ActorContext {
            store,
            publisher,
            media,
            metrics: ActorMetrics::new(),
            settings: ActorSettings {
                ring_timeout: settings.ring_timeout,
                empty_room_grace: settings.empty_room_grace,
            },
        };

        Self {
            ctx,
            settings,
            registry: Arc::new(Mutex::new(HashMap::new())),
            initiate_locks: Arc::new(KeyedLocks::new()),
            cancel_token,
        }
    }

    /// Shared actor metrics.
    #[must_use]
    pub fn metrics(&self) -> Arc<ActorMetrics> {
        Arc::clone(&self.ctx.metrics)
    }

    /// Backing store, for readiness checks.
    #[must_use]
    pub fn store(&self) -> Arc<dyn SessionStore> {
        Arc::clone(&self.ctx.store)
    }

    /// Create a call or room in `Pending` and admit the initiator.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` for malformed input
    /// - `AlreadyInCall` when the pair already has a non-terminal call
    /// - `RoomNameTaken` when a non-terminal room holds the name
    /// - `Store` on persistence failure
    #[instrument(skip_all, name = "sc.coordinator.initiate", fields(initiator = %request.initiator_id))]
    pub async fn initiate(&self, request: InitiateSession) -> Result<CallSession, ScError> {
        observe("initiate", self.initiate_session(request)).await
    }

    /// Recipient's client acknowledged the incoming call.
    #[instrument(skip_all, name = "sc.coordinator.ring", fields(session_id = %id))]
    pub async fn ring(&self, id: SessionId, user_id: &UserId) -> Result<CallSession, ScError> {
        observe(
            "ring",
            self.run(
                id,
                Operation::Ring {
                    user_id: user_id.clone(),
                },
            ),
        )
        .await
    }

    /// Recipient answers; the call becomes `Active` and media is set up.
    #[instrument(skip_all, name = "sc.coordinator.accept", fields(session_id = %id))]
    pub async fn accept(&self, id: SessionId, user_id: &UserId) -> Result<CallSession, ScError> {
        observe(
            "accept",
            self.run(
                id,
                Operation::Accept {
                    user_id: user_id.clone(),
                },
            ),
        )
        .await
    }

    /// Recipient declines.
    #[instrument(skip_all, name = "sc.coordinator.reject", fields(session_id = %id))]
    pub async fn reject(
        &self,
        id: SessionId,
        user_id: &UserId,
        reason: Option<String>,
    ) -> Result<CallSession, ScError> {
        observe("reject", async {
            let reason = normalize_reason(reason)?;
            self.run(
                id,
                Operation::Reject {
                    user_id: user_id.clone(),
                    reason,
                },
            )
            .await
        })
        .await
    }

    /// Enter a room. Joining twice returns the session unchanged.
    #[instrument(skip_all, name = "sc.coordinator.join", fields(session_id = %id))]
    pub async fn join(&self, id: SessionId, user_id: &UserId) -> Result<CallSession, ScError> {
        observe(
            "join",
            self.run(
                id,
                Operation::Join {
                    user_id: user_id.clone(),
                },
            ),
        )
        .await
    }

    /// Leave a call or room. Leaving twice is a no-op.
    #[instrument(skip_all, name = "sc.coordinator.leave", fields(session_id = %id))]
    pub async fn leave(&self, id: SessionId, user_id: &UserId) -> Result<CallSession, ScError> {
        observe(
            "leave",
            self.run(
                id,
                Operation::Leave {
                    user_id: user_id.clone(),
                },
            ),
        )
        .await
    }

    /// Hang up a call or close a room.
    #[instrument(skip_all, name = "sc.coordinator.end", fields(session_id = %id))]
    pub async fn end(
        &self,
        id: SessionId,
        user_id: &UserId,
        reason: Option<String>,
    ) -> Result<CallSession, ScError> {
        observe("end", async {
            let reason = normalize_reason(reason)?;
            self.run(
                id,
                Operation::End {
                    user_id: user_id.clone(),
                    reason,
                },
            )
            .await
        })
        .await
    }

    /// Nobody answered in time.
    ///
    /// Losing a race against `accept` or `end` yields `InvalidTransition`,
    /// meaning the session was already resolved.
    #[instrument(skip_all, name = "sc.coordinator.mark_missed", fields(session_id = %id))]
    pub async fn mark_missed(&self, id: SessionId) -> Result<CallSession, ScError> {
        observe(
            "mark_missed",
            self.run_system(id, Operation::MarkMissed),
        )
        .await
    }

    /// Irrecoverable signaling or transport error.
    #[instrument(skip_all, name = "sc.coordinator.mark_failed", fields(session_id = %id))]
    pub async fn mark_failed(
        &self,
        id: SessionId,
        reason: Option<String>,
    ) -> Result<CallSession, ScError> {
        observe("mark_failed", async {
            let reason =
                normalize_reason(reason)?.unwrap_or_else(|| DEFAULT_FAILURE_REASON.to_string());
            self.run_system(id, Operation::MarkFailed { reason }).await
        })
        .await
    }

    /// Current state of a session.
    pub async fn get(&self, id: SessionId) -> Result<CallSession, ScError> {
        observe("get", self.ctx.store.get(id)).await
    }

    /// Non-terminal call between `a` and `b`, in either direction.
    pub async fn find_active_between(
        &self,
        a: &UserId,
        b: &UserId,
    ) -> Result<Option<CallSession>, ScError> {
        observe("find_active_between", self.ctx.store.find_active_between(a, b)).await
    }

    /// Open members of a session in join order.
    pub async fn members(&self, id: SessionId) -> Result<Vec<UserId>, ScError> {
        observe("members", async {
            match self.resolve(id).await? {
                Route::Terminal(_) => Ok(Vec::new()),
                Route::Live(handle) => match handle.members().await {
                    Err(ScError::ActorUnavailable) => self.stored_members(id).await,
                    other => other,
                },
            }
        })
        .await
    }

    /// Number of session actors currently registered.
    pub async fn live_sessions(&self) -> usize {
        self.registry.lock().await.len()
    }

    /// Stop every session actor.
    pub fn shutdown(&self) {
        info!(target: "sc.coordinator", "Coordinator shutting down");
        self.cancel_token.cancel();
    }

    async fn initiate_session(&self, request: InitiateSession) -> Result<CallSession, ScError> {
        let session = self.build_session(request)?;

        let lock_key = session
            .pair_key()
            .map(|key| format!("pair:{key}"))
            .or_else(|| session.room_key().map(|key| format!("room:{key}")));
        match lock_key {
            Some(key) => {
                self.initiate_locks
                    .run(key, self.create_session(&session))
                    .await?;
            }
            None => self.create_session(&session).await?,
        }

        let mut membership = RoomMembership::new(session.id, session.max_participants);
        if let MembershipResult::Admitted(participant) = membership.join(&session.initiator_id) {
            if let Err(e) = self
                .ctx
                .store
                .add_participant(&participant, session.max_participants)
                .await
            {
                self.abandon(&session).await;
                return Err(e);
            }
        }
        self.ctx.publisher.publish(SessionEvent::membership(
            session.id,
            SessionEventKind::ParticipantJoined,
            session.status,
            session.initiator_id.clone(),
        ));

        self.register(session.clone(), membership).await;

        info!(
            target: "sc.coordinator",
            session_id = %session.id,
            is_live_stream = session.is_live_stream,
            max_participants = session.max_participants,
            "Session initiated"
        );
        Ok(session)
    }

    /// Check for a live session on the same pair or name, then insert.
    async fn create_session(&self, session: &CallSession) -> Result<(), ScError> {
        if let (false, Some(recipient)) = (session.is_room(), &session.recipient_id) {
            if self
                .ctx
                .store
                .find_active_between(&session.initiator_id, recipient)
                .await?
                .is_some()
            {
                return Err(ScError::AlreadyInCall);
            }
        }
        if let (true, Some(name)) = (session.is_room(), session.room_name.as_deref()) {
            if self.ctx.store.find_active_room(name).await?.is_some() {
                return Err(ScError::RoomNameTaken(name.to_string()));
            }
        }

        self.ctx.store.create(session).await?;
        Ok(())
    }

    /// Fail a freshly created session whose setup did not complete.
    async fn abandon(&self, session: &CallSession) {
        let update = SessionUpdate::status(SessionStatus::Failed)
            .with_ended(Utc::now(), REASON_ADMISSION_FAILED);
        if let Err(e) = self
            .ctx
            .store
            .update(session.id, session.version, session.status, update)
            .await
        {
            error!(
                target: "sc.coordinator",
                session_id = %session.id,
                error = %e,
                "Failed to release abandoned session"
            );
        }
    }

    fn build_session(&self, request: InitiateSession) -> Result<CallSession, ScError> {
        let InitiateSession {
            initiator_id,
            recipient_id,
            is_live_stream,
            max_participants,
            room_name,
        } = request;

        if initiator_id.as_str().trim().is_empty() {
            return Err(ScError::InvalidRequest(
                "initiator_id is required".to_string(),
            ));
        }
        let recipient_id = recipient_id.filter(|r| !r.as_str().trim().is_empty());
        let room_name = room_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        if room_name
            .as_ref()
            .is_some_and(|name| name.chars().count() > MAX_ROOM_NAME_LENGTH)
        {
            return Err(ScError::InvalidRequest(format!(
                "room_name must be at most {MAX_ROOM_NAME_LENGTH} characters"
            )));
        }

        if !is_live_stream {
            let Some(recipient_id) = recipient_id else {
                return Err(ScError::InvalidRequest(
                    "recipient_id is required for a call".to_string(),
                ));
            };
            if recipient_id == initiator_id {
                return Err(ScError::InvalidRequest(
                    "cannot call yourself".to_string(),
                ));
            }
            if room_name.is_some() {
                return Err(ScError::InvalidRequest(
                    "room_name is only valid for live streams".to_string(),
                ));
            }
            if max_participants.is_some_and(|max| max != CALL_MAX_PARTICIPANTS) {
                return Err(ScError::InvalidRequest(format!(
                    "a call has exactly {CALL_MAX_PARTICIPANTS} participants"
                )));
            }
            return Ok(CallSession::new_pending(
                initiator_id,
                Some(recipient_id),
                false,
                CALL_MAX_PARTICIPANTS,
                None,
            ));
        }

        if recipient_id.is_none() && room_name.is_none() {
            return Err(ScError::InvalidRequest(
                "room_name is required for a live stream".to_string(),
            ));
        }
        let requested = max_participants.unwrap_or(self.settings.default_room_capacity);
        if requested < MIN_ROOM_CAPACITY {
            return Err(ScError::InvalidRequest(format!(
                "max_participants must be at least {MIN_ROOM_CAPACITY}"
            )));
        }
        let capacity = requested.min(self.settings.max_room_capacity);
        if capacity < requested {
            debug!(
                target: "sc.coordinator",
                requested,
                capacity,
                "Room capacity capped"
            );
        }

        Ok(CallSession::new_pending(
            initiator_id,
            recipient_id,
            true,
            capacity,
            room_name,
        ))
    }

    /// Apply a user operation, then drive the media transport.
    async fn run(&self, id: SessionId, operation: Operation) -> Result<CallSession, ScError> {
        let applied = self.dispatch(id, operation).await?;

        if applied.became_active() {
            if let Err(e) = self.ctx.media.establish(&applied.session).await {
                warn!(
                    target: "sc.coordinator",
                    session_id = %id,
                    error = %e,
                    "Media establish failed, failing session"
                );
                return match self
                    .run_system(
                        id,
                        Operation::MarkFailed {
                            reason: REASON_MEDIA_FAILED.to_string(),
                        },
                    )
                    .await
                {
                    Err(ScError::InvalidTransition { .. }) => self.ctx.store.get(id).await,
                    other => other,
                };
            }
        }

        if applied.needs_teardown() {
            self.teardown(&applied.session).await;
        }
        Ok(applied.session)
    }

    /// Apply a system operation; only ever tears media down.
    async fn run_system(&self, id: SessionId, operation: Operation) -> Result<CallSession, ScError> {
        let name = operation.name();
        let applied = match self.dispatch(id, operation).await {
            Ok(applied) => applied,
            Err(e @ ScError::InvalidTransition { .. }) => {
                debug!(
                    target: "sc.coordinator",
                    session_id = %id,
                    operation = name,
                    error = %e,
                    "System transition lost race, session already resolved"
                );
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        if applied.needs_teardown() {
            self.teardown(&applied.session).await;
        }
        Ok(applied.session)
    }

    async fn teardown(&self, session: &CallSession) {
        if let Err(e) = self.ctx.media.teardown(session).await {
            warn!(
                target: "sc.coordinator",
                session_id = %session.id,
                error = %e,
                "Media teardown failed"
            );
        }
    }

    /// Route `operation` to the session's actor.
    ///
    /// Retries when the actor exited before answering or the store saw a
    /// concurrent write; the actor has refreshed its cache by then.
    async fn dispatch(&self, id: SessionId, operation: Operation) -> Result<Applied, ScError> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let result = match self.resolve(id).await? {
                Route::Terminal(session) => {
                    settle_terminal(&session, &operation).map(|session| Applied {
                        previous_status: session.status,
                        session,
                    })
                }
                Route::Live(handle) => {
                    let result = handle.apply(operation.clone()).await;
                    if matches!(result, Err(ScError::ActorUnavailable)) {
                        self.evict(&handle).await;
                    }
                    result
                }
            };

            match result {
                Err(e @ (ScError::ActorUnavailable | ScError::Conflict(_)))
                    if attempt < MAX_DISPATCH_ATTEMPTS && !self.cancel_token.is_cancelled() =>
                {
                    debug!(
                        target: "sc.coordinator",
                        session_id = %id,
                        operation = operation.name(),
                        attempt,
                        error = %e,
                        "Retrying operation"
                    );
                }
                other => return other,
            }
        }
    }

    /// Find the live actor for `id`, spawning it from the store if needed.
    async fn resolve(&self, id: SessionId) -> Result<Route, ScError> {
        if let Some(handle) = self.lookup(id).await {
            return Ok(Route::Live(handle));
        }
        if self.cancel_token.is_cancelled() {
            return Err(ScError::ActorUnavailable);
        }

        let session = self.ctx.store.get(id).await?;
        if session.is_terminal() {
            return Ok(Route::Terminal(session));
        }
        let records = self.ctx.store.participants(id).await?;
        let membership = RoomMembership::from_records(id, session.max_participants, records);

        Ok(Route::Live(self.register(session, membership).await))
    }

    async fn lookup(&self, id: SessionId) -> Option<SessionActorHandle> {
        self.registry
            .lock()
            .await
            .get(&id)
            .filter(|handle| !handle.is_closed())
            .cloned()
    }

    /// Spawn and register an actor unless a live one already exists.
    async fn register(
        &self,
        session: CallSession,
        membership: RoomMembership,
    ) -> SessionActorHandle {
        let id = session.id;
        let mut registry = self.registry.lock().await;
        if let Some(existing) = registry.get(&id).filter(|handle| !handle.is_closed()) {
            return existing.clone();
        }

        let (handle, task_handle) = SessionActor::spawn(
            session,
            membership,
            self.cancel_token.child_token(),
            self.ctx.clone(),
        );
        registry.insert(id, handle.clone());
        drop(registry);

        debug!(target: "sc.coordinator", session_id = %id, "Session actor spawned");
        self.supervise(handle.clone(), task_handle);
        handle
    }

    async fn evict(&self, handle: &SessionActorHandle) {
        let id = handle.session_id();
        let mut registry = self.registry.lock().await;
        if registry
            .get(&id)
            .is_some_and(|current| current.same_actor(handle))
        {
            registry.remove(&id);
        }
    }

    /// Watch an actor task; deregister it on exit and report panics.
    fn supervise(&self, handle: SessionActorHandle, task_handle: JoinHandle<()>) {
        let registry = Arc::clone(&self.registry);
        let metrics = Arc::clone(&self.ctx.metrics);

        tokio::spawn(async move {
            let id = handle.session_id();
            match task_handle.await {
                Ok(()) => {
                    debug!(target: "sc.coordinator", session_id = %id, "Session actor exited");
                }
                Err(join_error) => {
                    if join_error.is_panic() {
                        error!(
                            target: "sc.coordinator",
                            session_id = %id,
                            error = ?join_error,
                            "Session actor panicked"
                        );
                        metrics.record_panic();
                        metrics.session_stopped();
                    }
                }
            }

            let mut registry = registry.lock().await;
            if registry
                .get(&id)
                .is_some_and(|current| current.same_actor(&handle))
            {
                registry.remove(&id);
            }
        });
    }

    async fn stored_members(&self, id: SessionId) -> Result<Vec<UserId>, ScError> {
        let mut open: Vec<_> = self
            .ctx
            .store
            .participants(id)
            .await?
            .into_iter()
            .filter(|p| p.is_open())
            .collect();
        open.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));
        Ok(open.into_iter().map(|p| p.user_id).collect())
    }
}

/// Trim a free-text reason; blank becomes `None`.
fn normalize_reason(reason: Option<String>) -> Result<Option<String>, ScError> {
    let reason = reason
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    if reason
        .as_ref()
        .is_some_and(|r| r.chars().count() > MAX_END_REASON_LENGTH)
    {
        return Err(ScError::InvalidRequest(format!(
            "reason must be at most {MAX_END_REASON_LENGTH} characters"
        )));
    }
    Ok(reason)
}

/// Record duration and outcome of one operation.
async fn observe<T, F>(operation: &'static str, fut: F) -> Result<T, ScError>
where
    F: Future<Output = Result<T, ScError>>,
{
    let start = Instant::now();
    let result = fut.await;
    match &result {
        Ok(_) => prom::record_operation(operation, "success", start.elapsed()),
        Err(e) => {
            prom::record_operation(operation, "error", start.elapsed());
            prom::record_error(operation, e.error_code());
        }
    }
    result
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::events::BroadcastPublisher;
    use crate::media::NoopMediaTransport;
    use crate::store::InMemorySessionStore;

    fn coordinator(settings: CoordinatorSettings) -> SignalingCoordinator {
        SignalingCoordinator::new(
            Arc::new(InMemorySessionStore::new()),
            Arc::new(BroadcastPublisher::new(16)),
            Arc::new(NoopMediaTransport),
            settings,
            CancellationToken::new(),
        )
    }

    fn settings() -> CoordinatorSettings {
        CoordinatorSettings {
            default_room_capacity: 10,
            max_room_capacity: 20,
            ring_timeout: None,
            empty_room_grace: Duration::ZERO,
        }
    }

    #[test]
    fn test_call_requires_distinct_recipient() {
        let c = coordinator(settings());

        let mut missing = InitiateSession::call("alice", "bob");
        missing.recipient_id = None;
        assert!(matches!(
            c.build_session(missing),
            Err(ScError::InvalidRequest(_))
        ));
        assert!(matches!(
            c.build_session(InitiateSession::call("alice", "alice")),
            Err(ScError::InvalidRequest(_))
        ));

        let session = c.build_session(InitiateSession::call("alice", "bob")).unwrap();
        assert_eq!(session.max_participants, CALL_MAX_PARTICIPANTS);
        assert_eq!(session.status, SessionStatus::Pending);
    }

    #[test]
    fn test_call_rejects_room_fields() {
        let c = coordinator(settings());

        let mut named = InitiateSession::call("alice", "bob");
        named.room_name = Some("lobby".to_string());
        assert!(matches!(
            c.build_session(named),
            Err(ScError::InvalidRequest(_))
        ));

        let mut sized = InitiateSession::call("alice", "bob");
        sized.max_participants = Some(5);
        assert!(matches!(
            c.build_session(sized),
            Err(ScError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_room_capacity_defaults_and_ceiling() {
        let c = coordinator(settings());

        let default = c
            .build_session(InitiateSession::room("host", "  Stage  ", None))
            .unwrap();
        assert_eq!(default.max_participants, 10);
        assert_eq!(default.room_name.as_deref(), Some("Stage"));

        let capped = c
            .build_session(InitiateSession::room("host", "big", Some(500)))
            .unwrap();
        assert_eq!(capped.max_participants, 20);

        assert!(matches!(
            c.build_session(InitiateSession::room("host", "tiny", Some(1))),
            Err(ScError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_room_name_validation() {
        let c = coordinator(settings());

        assert!(matches!(
            c.build_session(InitiateSession::room("host", "   ", None)),
            Err(ScError::InvalidRequest(_))
        ));
        let long = "x".repeat(MAX_ROOM_NAME_LENGTH + 1);
        assert!(matches!(
            c.build_session(InitiateSession::room("host", long, None)),
            Err(ScError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_normalize_reason() {
        assert_eq!(normalize_reason(None).unwrap(), None);
        assert_eq!(normalize_reason(Some("  ".into())).unwrap(), None);
        assert_eq!(
            normalize_reason(Some(" busy ".into())).unwrap().as_deref(),
            Some("busy")
        );
        assert!(normalize_reason(Some("r".repeat(MAX_END_REASON_LENGTH + 1))).is_err());
    }

    #[test]
    fn test_settings_from_config() {
        let vars = HashMap::from([
            ("SC_STORE_BACKEND".to_string(), "memory".to_string()),
            ("SC_RING_TIMEOUT_SECONDS".to_string(), "0".to_string()),
            ("SC_EMPTY_ROOM_GRACE_SECONDS".to_string(), "30".to_string()),
        ]);
        let config = Config::from_vars(&vars).unwrap();
        let settings = CoordinatorSettings::from(&config);

        assert_eq!(settings.ring_timeout, None);
        assert_eq!(settings.empty_room_grace, Duration::from_secs(30));
        assert_eq!(settings.default_room_capacity, DEFAULT_ROOM_CAPACITY);
    }

    #[tokio::test]
    async fn test_initiate_spawns_actor_and_admits_initiator() {
        let c = coordinator(settings());
        let session = c
            .initiate(InitiateSession::room("host", "stage", Some(4)))
            .await
            .unwrap();

        assert_eq!(c.live_sessions().await, 1);
        assert_eq!(
            c.members(session.id).await.unwrap(),
            vec![UserId::from("host")]
        );
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_found() {
        let c = coordinator(settings());
        let err = c
            .accept(SessionId::new(), &"bob".into())
            .await
            .unwrap_err();
        assert!(matches!(err, ScError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_shutdown_stops_actors() {
        let c = coordinator(settings());
        let session = c
            .initiate(InitiateSession::call("alice", "bob"))
            .await
            .unwrap();

        c.shutdown();
        let err = c.accept(session.id, &"bob".into()).await.unwrap_err();
        assert!(matches!(err, ScError::ActorUnavailable));
    }
}
