//! Message types for session actor communication.
//!
//! Requests reach a `SessionActor` through its `tokio::sync::mpsc` mailbox;
//! replies come back over `tokio::sync::oneshot`.

use crate::errors::ScError;
use crate::models::{CallSession, SessionStatus};
use crate::state_machine::Transition;
use common::types::UserId;
use tokio::sync::oneshot;

/// A request to change a session, with the authenticated user behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Ring { user_id: UserId },
    Accept { user_id: UserId },
    Reject { user_id: UserId, reason: Option<String> },
    Join { user_id: UserId },
    Leave { user_id: UserId },
    End { user_id: UserId, reason: Option<String> },
    /// System-triggered: no answer before the timeout.
    MarkMissed,
    /// System-triggered: irrecoverable signaling or transport error.
    MarkFailed { reason: String },
}

impl Operation {
    /// Operation name for metric labels and logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Operation::Ring { .. } => "ring",
            Operation::Accept { .. } => "accept",
            Operation::Reject { .. } => "reject",
            Operation::Join { .. } => "join",
            Operation::Leave { .. } => "leave",
            Operation::End { .. } => "end",
            Operation::MarkMissed => "mark_missed",
            Operation::MarkFailed { .. } => "mark_failed",
        }
    }

    /// The state machine input this request ultimately applies.
    ///
    /// `Join` maps to `Activate`, the only transition a join can cause.
    /// `Leave` never transitions by itself.
    #[must_use]
    pub const fn transition(&self) -> Option<Transition> {
        match self {
            Operation::Ring { .. } => Some(Transition::Ring),
            Operation::Accept { .. } => Some(Transition::Accept),
            Operation::Reject { .. } => Some(Transition::Reject),
            Operation::Join { .. } => Some(Transition::Activate),
            Operation::Leave { .. } => None,
            Operation::End { .. } => Some(Transition::End),
            Operation::MarkMissed => Some(Transition::Miss),
            Operation::MarkFailed { .. } => Some(Transition::Fail),
        }
    }
}

/// Result of an applied operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Applied {
    /// Session after the operation.
    pub session: CallSession,
    /// Status before the operation; equal to `session.status` when nothing moved.
    pub previous_status: SessionStatus,
}

impl Applied {
    /// Whether this operation moved the session into `Active`.
    #[must_use]
    pub fn became_active(&self) -> bool {
        self.session.status == SessionStatus::Active
            && self.previous_status != SessionStatus::Active
    }

    /// Whether this operation ended or failed a live session.
    #[must_use]
    pub fn needs_teardown(&self) -> bool {
        matches!(
            self.session.status,
            SessionStatus::Ended | SessionStatus::Failed
        ) && !self.previous_status.is_terminal()
    }
}

/// Messages sent to a `SessionActor`.
#[derive(Debug)]
pub enum SessionMessage {
    /// Apply a state-changing operation.
    Apply {
        operation: Operation,
        respond_to: oneshot::Sender<Result<Applied, ScError>>,
    },

    /// Read the actor's cached session.
    GetSession {
        respond_to: oneshot::Sender<CallSession>,
    },

    /// Open members in join order.
    GetMembers {
        respond_to: oneshot::Sender<Vec<UserId>>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applied(from: SessionStatus, to: SessionStatus) -> Applied {
        let mut session = CallSession::new_pending("a".into(), Some("b".into()), false, 2, None);
        session.status = to;
        Applied {
            session,
            previous_status: from,
        }
    }

    #[test]
    fn test_media_triggers() {
        assert!(applied(SessionStatus::Ringing, SessionStatus::Active).became_active());
        assert!(!applied(SessionStatus::Active, SessionStatus::Active).became_active());

        assert!(applied(SessionStatus::Active, SessionStatus::Ended).needs_teardown());
        assert!(applied(SessionStatus::Pending, SessionStatus::Failed).needs_teardown());
        assert!(!applied(SessionStatus::Ringing, SessionStatus::Missed).needs_teardown());
        assert!(!applied(SessionStatus::Ended, SessionStatus::Ended).needs_teardown());
    }

    #[test]
    fn test_operation_metadata() {
        let join = Operation::Join {
            user_id: "alice".into(),
        };
        assert_eq!(join.name(), "join");
        assert_eq!(join.transition(), Some(Transition::Activate));
        assert_eq!(Operation::MarkMissed.transition(), Some(Transition::Miss));
        assert_eq!(
            Operation::Leave {
                user_id: "bob".into()
            }
            .transition(),
            None
        );
    }
}
