//! `SessionActor` - per-session actor that owns one call or room.
//!
//! Each `SessionActor`:
//! - Owns the cached `CallSession` and its `RoomMembership`
//! - Applies every status change through the state machine followed by a
//!   conditional store write, then publishes the event
//! - Runs the ring watchdog for calls and the empty-room grace timer for rooms
//! - Closes its mailbox once the session is terminal, answers whatever was
//!   already queued, and exits
//!
//! The mailbox is the session's critical section: requests for one session
//! apply one at a time in arrival order, while different sessions proceed
//! in parallel.

use super::messages::{Applied, Operation, SessionMessage};
use super::metrics::{ActorMetrics, MailboxMonitor};
use crate::errors::ScError;
use crate::events::EventPublisher;
use crate::media::MediaTransport;
use crate::membership::{LeaveOutcome, MembershipResult, RoomMembership};
use crate::models::{
    CallSession, Participant, SessionEvent, SessionEventKind, SessionStatus, DEFAULT_END_REASON,
};
use crate::observability::metrics as prom;
use crate::state_machine::{self, Transition};
use crate::store::{SessionStore, SessionUpdate};
use chrono::{DateTime, Utc};
use common::types::{SessionId, UserId};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default channel buffer size for session actor mailboxes.
const SESSION_CHANNEL_BUFFER: usize = 256;

/// Delay before a timer-driven transition that failed is tried again.
const TIMER_RETRY_DELAY: Duration = Duration::from_secs(1);

/// End reason of a call nobody answered.
pub const REASON_TIMEOUT: &str = "timeout";
/// End reason of a call one party left.
pub const REASON_PARTICIPANT_LEFT: &str = "participant-left";
/// End reason of a room reclaimed after its last member left.
pub const REASON_EMPTY_ROOM: &str = "empty-room";
/// End reason of a declined call without an explicit reason.
pub const REASON_REJECTED: &str = "rejected";

/// Timer settings shared by every session actor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorSettings {
    /// Ring watchdog; `None` disables it.
    pub ring_timeout: Option<Duration>,
    /// How long an empty room lingers before it is ended.
    pub empty_room_grace: Duration,
}

/// Collaborators a session actor works with.
#[derive(Clone)]
pub struct ActorContext {
    pub store: Arc<dyn SessionStore>,
    pub publisher: Arc<dyn EventPublisher>,
    pub media: Arc<dyn MediaTransport>,
    pub metrics: Arc<ActorMetrics>,
    pub settings: ActorSettings,
}

/// Handle to a `SessionActor`.
#[derive(Clone, Debug)]
pub struct SessionActorHandle {
    sender: mpsc::Sender<SessionMessage>,
    cancel_token: CancellationToken,
    session_id: SessionId,
    mailbox: Arc<MailboxMonitor>,
}

impl SessionActorHandle {
    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Apply `operation` inside the session's critical section.
    ///
    /// # Errors
    ///
    /// `ActorUnavailable` when the actor stopped before answering; any
    /// other error comes from the operation itself.
    pub async fn apply(&self, operation: Operation) -> Result<Applied, ScError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::Apply {
            operation,
            respond_to: tx,
        })
        .await?;

        rx.await.map_err(|_| ScError::ActorUnavailable)?
    }

    /// Get the actor's cached session.
    pub async fn get_session(&self) -> Result<CallSession, ScError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::GetSession { respond_to: tx })
            .await?;

        rx.await.map_err(|_| ScError::ActorUnavailable)
    }

    /// Get open members in join order.
    pub async fn members(&self) -> Result<Vec<UserId>, ScError> {
        let (tx, rx) = oneshot::channel();
        self.send(SessionMessage::GetMembers { respond_to: tx })
            .await?;

        rx.await.map_err(|_| ScError::ActorUnavailable)
    }

    /// Cancel the session actor.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Whether the actor no longer accepts messages.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Whether both handles address the same actor instance.
    #[must_use]
    pub fn same_actor(&self, other: &Self) -> bool {
        self.sender.same_channel(&other.sender)
    }

    async fn send(&self, message: SessionMessage) -> Result<(), ScError> {
        self.mailbox.record_enqueue();
        self.sender.send(message).await.map_err(|_| {
            self.mailbox.record_unsent();
            debug!(
                target: "sc.actor.session",
                session_id = %self.session_id,
                "Session actor mailbox closed"
            );
            ScError::ActorUnavailable
        })
    }
}

/// The `SessionActor` implementation.
pub struct SessionActor {
    session: CallSession,
    membership: RoomMembership,
    receiver: mpsc::Receiver<SessionMessage>,
    /// Cancellation token (child of the coordinator's token).
    cancel_token: CancellationToken,
    ctx: ActorContext,
    ring_deadline: Option<Instant>,
    reclaim_deadline: Option<Instant>,
    /// Set once the session is terminal and the mailbox is closed.
    closing: bool,
    mailbox: Arc<MailboxMonitor>,
}

impl SessionActor {
    /// Spawn an actor for a non-terminal session.
    ///
    /// `membership` must already reflect the persisted open participants.
    /// Returns a handle and the task join handle.
    pub fn spawn(
        session: CallSession,
        membership: RoomMembership,
        cancel_token: CancellationToken,
        ctx: ActorContext,
    ) -> (SessionActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(SESSION_CHANNEL_BUFFER);
        let mailbox = Arc::new(MailboxMonitor::new(session.id.to_string()));
        let session_id = session.id;

        let now = Instant::now();
        let ring_deadline = ring_deadline(&session, ctx.settings.ring_timeout, now);
        let reclaim_deadline = (session.is_room() && !session.is_terminal() && membership.is_empty())
            .then(|| now + ctx.settings.empty_room_grace);

        let actor = Self {
            session,
            membership,
            receiver,
            cancel_token: cancel_token.clone(),
            ctx,
            ring_deadline,
            reclaim_deadline,
            closing: false,
            mailbox: Arc::clone(&mailbox),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = SessionActorHandle {
            sender,
            cancel_token,
            session_id,
            mailbox,
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "sc.actor.session", fields(session_id = %self.session.id))]
    async fn run(mut self) {
        info!(
            target: "sc.actor.session",
            session_id = %self.session.id,
            status = %self.session.status,
            members = self.membership.count(),
            "SessionActor started"
        );
        self.ctx.metrics.session_started();

        loop {
            if self.session.is_terminal() && !self.closing {
                self.begin_closing();
            }

            let deadline = next_deadline(self.ring_deadline, self.reclaim_deadline);

            tokio::select! {
                biased;

                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "sc.actor.session",
                        session_id = %self.session.id,
                        "SessionActor received cancellation signal"
                    );
                    break;
                }

                () = sleep_until(deadline) => {
                    self.on_deadline().await;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.handle_message(message).await;
                            self.mailbox.record_dequeue();
                        }
                        None => {
                            debug!(
                                target: "sc.actor.session",
                                session_id = %self.session.id,
                                "SessionActor mailbox drained, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        self.ctx.metrics.session_stopped();
        info!(
            target: "sc.actor.session",
            session_id = %self.session.id,
            status = %self.session.status,
            messages_processed = self.mailbox.messages_processed(),
            "SessionActor stopped"
        );
    }

    /// Stop accepting new requests; queued ones are still answered.
    fn begin_closing(&mut self) {
        self.closing = true;
        self.ring_deadline = None;
        self.reclaim_deadline = None;
        self.receiver.close();
        debug!(
            target: "sc.actor.session",
            session_id = %self.session.id,
            status = %self.session.status,
            "Session terminal, mailbox closed"
        );
    }

    async fn handle_message(&mut self, message: SessionMessage) {
        match message {
            SessionMessage::Apply {
                operation,
                respond_to,
            } => {
                let result = self.apply(operation).await;
                let _ = respond_to.send(result);
            }

            SessionMessage::GetSession { respond_to } => {
                let _ = respond_to.send(self.session.clone());
            }

            SessionMessage::GetMembers { respond_to } => {
                let _ = respond_to.send(self.membership.members());
            }
        }
    }

    async fn apply(&mut self, operation: Operation) -> Result<Applied, ScError> {
        let previous_status = self.session.status;

        if self.session.is_terminal() {
            return settle_terminal(&self.session, &operation).map(|session| Applied {
                session,
                previous_status,
            });
        }

        authorize(&self.session, &operation)?;

        match &operation {
            Operation::Ring { user_id } => {
                self.transition(Transition::Ring, Some(user_id), None).await?;
            }
            Operation::Accept { user_id } => self.accept(user_id).await?,
            Operation::Reject { user_id, reason } => {
                self.reject(user_id, reason.as_deref()).await?;
            }
            Operation::Join { user_id } => self.join(user_id).await?,
            Operation::Leave { user_id } => self.leave(user_id).await?,
            Operation::End { user_id, reason } => {
                let reason = reason.as_deref().unwrap_or(DEFAULT_END_REASON);
                self.transition(Transition::End, Some(user_id), Some(reason))
                    .await?;
            }
            Operation::MarkMissed => {
                self.transition(Transition::Miss, None, Some(REASON_TIMEOUT))
                    .await?;
            }
            Operation::MarkFailed { reason } => {
                self.transition(Transition::Fail, None, Some(reason.as_str()))
                    .await?;
            }
        }

        Ok(Applied {
            session: self.session.clone(),
            previous_status,
        })
    }

    /// Accept a call. A `Pending` call is rung first.
    async fn accept(&mut self, user_id: &UserId) -> Result<(), ScError> {
        if self.session.status == SessionStatus::Pending {
            self.transition(Transition::Ring, Some(user_id), None)
                .await?;
        }
        state_machine::apply(
            self.session.status,
            Transition::Accept,
            self.session.is_live_stream,
        )?;

        let admitted = self.admit(user_id).await?;
        if let Err(e) = self
            .transition(Transition::Accept, Some(user_id), None)
            .await
        {
            if let Some(participant) = &admitted {
                self.undo_admit(participant).await;
            }
            return Err(e);
        }

        if let Some(participant) = admitted {
            self.publish_membership(SessionEventKind::ParticipantJoined, participant.user_id);
        }
        Ok(())
    }

    /// Decline a call. A `Pending` call is rung first.
    async fn reject(&mut self, user_id: &UserId, reason: Option<&str>) -> Result<(), ScError> {
        if self.session.status == SessionStatus::Pending {
            self.transition(Transition::Ring, Some(user_id), None)
                .await?;
        }
        self.transition(
            Transition::Reject,
            Some(user_id),
            Some(reason.unwrap_or(REASON_REJECTED)),
        )
        .await
    }

    /// Admit a member into a room; the first admission activates it.
    async fn join(&mut self, user_id: &UserId) -> Result<(), ScError> {
        let admitted = self.admit(user_id).await?;

        if self.session.status == SessionStatus::Pending {
            if let Err(e) = self
                .transition(Transition::Activate, Some(user_id), None)
                .await
            {
                if let Some(participant) = &admitted {
                    self.undo_admit(participant).await;
                }
                return Err(e);
            }
        }

        if let Some(participant) = admitted {
            self.reclaim_deadline = None;
            self.publish_membership(SessionEventKind::ParticipantJoined, participant.user_id);
        }
        Ok(())
    }

    /// Close a membership. A call ends with its first departure; a room
    /// left empty is reclaimed after the grace period.
    async fn leave(&mut self, user_id: &UserId) -> Result<(), ScError> {
        if !self.session.is_room() {
            if !self.membership.contains(user_id) {
                return Ok(());
            }
            // Ending closes every open record, the leaver's included. A
            // conflict leaves the leaver open so the retry still ends the call.
            self.transition(Transition::End, Some(user_id), Some(REASON_PARTICIPANT_LEFT))
                .await?;
            self.publish_membership(SessionEventKind::ParticipantLeft, user_id.clone());
            return Ok(());
        }

        let now = Utc::now();
        let LeaveOutcome::Left {
            participant,
            remaining,
        } = self.membership.leave(user_id, now)
        else {
            return Ok(());
        };

        if let Err(e) = self
            .ctx
            .store
            .close_participant(self.session.id, user_id, now)
            .await
        {
            self.membership.revert_leave(participant);
            return Err(e);
        }
        self.publish_membership(SessionEventKind::ParticipantLeft, user_id.clone());

        if remaining == 0 {
            let grace = self.ctx.settings.empty_room_grace;
            if grace.is_zero() {
                if let Err(e) = self.end_empty_room().await {
                    warn!(
                        target: "sc.actor.session",
                        session_id = %self.session.id,
                        error = %e,
                        "Empty room reclamation failed, retrying"
                    );
                    self.retry_reclaim();
                }
            } else {
                debug!(
                    target: "sc.actor.session",
                    session_id = %self.session.id,
                    grace_seconds = grace.as_secs(),
                    "Room empty, reclamation scheduled"
                );
                self.reclaim_deadline = Some(Instant::now() + grace);
            }
        }
        Ok(())
    }

    /// Reserve a slot for `user_id`. Returns the new participant, or `None`
    /// when the user already held one.
    ///
    /// The store has the final say on capacity: other instances may have
    /// admitted or released members since this cache was loaded.
    async fn admit(&mut self, user_id: &UserId) -> Result<Option<Participant>, ScError> {
        let mut result = self.membership.join(user_id);
        if matches!(result, MembershipResult::RoomFull { .. }) {
            self.reload_members().await;
            result = self.membership.join(user_id);
        }

        match result {
            MembershipResult::Admitted(participant) => {
                let capacity = self.membership.capacity();
                match self.ctx.store.add_participant(&participant, capacity).await {
                    Ok(()) => Ok(Some(participant)),
                    Err(ScError::RoomFull { capacity }) => {
                        self.membership.revert_join(user_id);
                        self.reload_members().await;
                        Err(self.reject_full(capacity))
                    }
                    Err(ScError::Conflict(message)) => {
                        self.membership.revert_join(user_id);
                        self.refresh().await;
                        Err(ScError::Conflict(message))
                    }
                    Err(e) => {
                        self.membership.revert_join(user_id);
                        Err(e)
                    }
                }
            }
            MembershipResult::AlreadyMember(_) => Ok(None),
            MembershipResult::RoomFull { capacity } => Err(self.reject_full(capacity)),
        }
    }

    fn reject_full(&self, capacity: u32) -> ScError {
        prom::record_room_full();
        debug!(
            target: "sc.actor.session",
            session_id = %self.session.id,
            capacity,
            "Join rejected, room full"
        );
        ScError::RoomFull { capacity }
    }

    /// Rebuild the membership cache from the stored records.
    async fn reload_members(&mut self) {
        let id = self.session.id;
        match self.ctx.store.participants(id).await {
            Ok(records) => {
                self.membership =
                    RoomMembership::from_records(id, self.membership.capacity(), records);
            }
            Err(e) => {
                warn!(
                    target: "sc.actor.session",
                    session_id = %id,
                    error = %e,
                    "Failed to reload participants"
                );
            }
        }
    }

    async fn undo_admit(&mut self, participant: &Participant) {
        self.membership.revert_join(&participant.user_id);
        if let Err(e) = self
            .ctx
            .store
            .close_participant(self.session.id, &participant.user_id, Utc::now())
            .await
        {
            warn!(
                target: "sc.actor.session",
                session_id = %self.session.id,
                user_id = %participant.user_id,
                error = %e,
                "Failed to close participant record after aborted admission"
            );
        }
    }

    /// Validate, persist and publish one status change.
    ///
    /// A `Conflict` from the store refreshes the cached session before it is
    /// returned, so a retry sees the current state.
    async fn transition(
        &mut self,
        transition: Transition,
        actor: Option<&UserId>,
        reason: Option<&str>,
    ) -> Result<(), ScError> {
        let from = self.session.status;
        let to = state_machine::apply(from, transition, self.session.is_live_stream)?;

        let now = Utc::now();
        let mut update = SessionUpdate::status(to);
        if to == SessionStatus::Active && self.session.started_at.is_none() {
            update = update.with_started_at(now);
        }
        if to.is_terminal() {
            update = update.with_ended(now, reason.unwrap_or(DEFAULT_END_REASON));
        }

        match self
            .ctx
            .store
            .update(self.session.id, self.session.version, from, update)
            .await
        {
            Ok(updated) => {
                self.session = updated;
                prom::record_transition(from, to);
                self.ctx.publisher.publish(SessionEvent::status_changed(
                    self.session.id,
                    from,
                    to,
                    actor.cloned(),
                ));
                debug!(
                    target: "sc.actor.session",
                    session_id = %self.session.id,
                    from = %from,
                    to = %to,
                    version = self.session.version,
                    "Session transitioned"
                );
                if to.is_terminal() {
                    self.close_open_members(now).await;
                }
                Ok(())
            }
            Err(ScError::Conflict(message)) => {
                self.refresh().await;
                Err(ScError::Conflict(message))
            }
            Err(e) => Err(e),
        }
    }

    /// Reload the session and its members after another writer got ahead.
    async fn refresh(&mut self) {
        let id = self.session.id;
        let session = match self.ctx.store.get(id).await {
            Ok(session) => session,
            Err(e) => {
                warn!(
                    target: "sc.actor.session",
                    session_id = %id,
                    error = %e,
                    "Failed to refresh session after conflict"
                );
                return;
            }
        };

        let capacity = session.max_participants;
        self.membership = if session.is_terminal() {
            RoomMembership::new(id, capacity)
        } else {
            match self.ctx.store.participants(id).await {
                Ok(records) => RoomMembership::from_records(id, capacity, records),
                Err(e) => {
                    warn!(
                        target: "sc.actor.session",
                        session_id = %id,
                        error = %e,
                        "Failed to refresh participants after conflict"
                    );
                    self.membership.clone()
                }
            }
        };
        debug!(
            target: "sc.actor.session",
            session_id = %id,
            status = %session.status,
            version = session.version,
            "Session cache refreshed"
        );
        self.session = session;
    }

    /// Close every open membership of a session that just ended.
    async fn close_open_members(&mut self, at: DateTime<Utc>) {
        for user_id in self.membership.members() {
            self.membership.leave(&user_id, at);
            if let Err(e) = self
                .ctx
                .store
                .close_participant(self.session.id, &user_id, at)
                .await
            {
                warn!(
                    target: "sc.actor.session",
                    session_id = %self.session.id,
                    user_id = %user_id,
                    error = %e,
                    "Failed to close participant record"
                );
            }
        }
    }

    fn publish_membership(&self, kind: SessionEventKind, user_id: UserId) {
        self.ctx.publisher.publish(SessionEvent::membership(
            self.session.id,
            kind,
            self.session.status,
            user_id,
        ));
    }

    async fn on_deadline(&mut self) {
        let now = Instant::now();

        if self.ring_deadline.is_some_and(|d| d <= now) {
            self.ring_deadline = None;
            self.ring_timeout_elapsed().await;
        }

        if self.reclaim_deadline.is_some_and(|d| d <= now) {
            self.reclaim_deadline = None;
            self.reclaim_grace_elapsed().await;
        }
    }

    async fn ring_timeout_elapsed(&mut self) {
        if !is_unanswered_call(&self.session) {
            return;
        }

        match self
            .transition(Transition::Miss, None, Some(REASON_TIMEOUT))
            .await
        {
            Ok(()) => {
                info!(
                    target: "sc.actor.session",
                    session_id = %self.session.id,
                    "Call missed, no answer before timeout"
                );
            }
            Err(e) => {
                warn!(
                    target: "sc.actor.session",
                    session_id = %self.session.id,
                    error = %e,
                    "Ring timeout could not be applied"
                );
                if is_unanswered_call(&self.session) {
                    self.ring_deadline = Some(Instant::now() + TIMER_RETRY_DELAY);
                }
            }
        }
    }

    async fn reclaim_grace_elapsed(&mut self) {
        if !self.membership.is_empty() {
            return;
        }

        let previous_status = self.session.status;
        match self.end_empty_room().await {
            Ok(()) => {
                // Nobody is waiting on this transition, so media is released here.
                let applied = Applied {
                    session: self.session.clone(),
                    previous_status,
                };
                if applied.needs_teardown() {
                    let media = Arc::clone(&self.ctx.media);
                    tokio::spawn(async move {
                        if let Err(e) = media.teardown(&applied.session).await {
                            warn!(
                                target: "sc.actor.session",
                                session_id = %applied.session.id,
                                error = %e,
                                "Media teardown failed"
                            );
                        }
                    });
                }
            }
            Err(e) => {
                warn!(
                    target: "sc.actor.session",
                    session_id = %self.session.id,
                    error = %e,
                    "Empty room reclamation failed, retrying"
                );
                self.retry_reclaim();
            }
        }
    }

    async fn end_empty_room(&mut self) -> Result<(), ScError> {
        if !self.session.is_room() || self.session.is_terminal() {
            return Ok(());
        }
        self.transition(Transition::End, None, Some(REASON_EMPTY_ROOM))
            .await?;
        info!(
            target: "sc.actor.session",
            session_id = %self.session.id,
            "Empty room reclaimed"
        );
        Ok(())
    }

    fn retry_reclaim(&mut self) {
        if self.session.is_room() && !self.session.is_terminal() && self.membership.is_empty() {
            self.reclaim_deadline = Some(Instant::now() + TIMER_RETRY_DELAY);
        }
    }
}

/// Check that the caller may issue `operation` against `session`.
///
/// # Errors
///
/// - `Unauthorized` when the caller lacks the role the operation needs
/// - `InvalidTransition` for call-only operations on rooms and the reverse
pub(crate) fn authorize(session: &CallSession, operation: &Operation) -> Result<(), ScError> {
    match operation {
        Operation::Ring { user_id }
        | Operation::Accept { user_id }
        | Operation::Reject { user_id, .. } => {
            if session.is_room() {
                if let Some(transition) = operation.transition() {
                    return Err(ScError::InvalidTransition {
                        from: session.status,
                        transition,
                    });
                }
            }
            if !session.is_recipient(user_id) {
                return Err(ScError::Unauthorized(
                    "only the recipient can answer this call".to_string(),
                ));
            }
        }
        Operation::Join { .. } => {
            if !session.is_room() {
                return Err(ScError::InvalidTransition {
                    from: session.status,
                    transition: Transition::Activate,
                });
            }
        }
        Operation::End { user_id, .. } => {
            let allowed = if session.is_room() {
                &session.initiator_id == user_id
            } else {
                session.is_party(user_id)
            };
            if !allowed {
                return Err(ScError::Unauthorized(
                    "not allowed to end this session".to_string(),
                ));
            }
        }
        Operation::Leave { .. } | Operation::MarkMissed | Operation::MarkFailed { .. } => {}
    }
    Ok(())
}

/// Answer an operation against a terminal session.
///
/// Leaving is a no-op; everything else is an invalid transition.
pub(crate) fn settle_terminal(
    session: &CallSession,
    operation: &Operation,
) -> Result<CallSession, ScError> {
    authorize(session, operation)?;
    match operation.transition() {
        None => Ok(session.clone()),
        Some(transition) => Err(ScError::InvalidTransition {
            from: session.status,
            transition,
        }),
    }
}

fn is_unanswered_call(session: &CallSession) -> bool {
    !session.is_room()
        && matches!(
            session.status,
            SessionStatus::Pending | SessionStatus::Ringing
        )
}

/// Watchdog deadline for an unanswered call, counted from its creation.
fn ring_deadline(
    session: &CallSession,
    timeout: Option<Duration>,
    now: Instant,
) -> Option<Instant> {
    if !is_unanswered_call(session) {
        return None;
    }
    let timeout = timeout?;
    let elapsed = (Utc::now() - session.created_at)
        .to_std()
        .unwrap_or_default();
    Some(now + timeout.saturating_sub(elapsed))
}

fn next_deadline(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending::<()>().await,
    }
}
