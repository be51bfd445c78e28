//! Session event fan-out.
//!
//! Session actors hand every applied change to an [`EventPublisher`] in the
//! order they applied it. Publishing never blocks the actor: delivery to
//! clients is the notification collaborator's job.

use crate::models::SessionEvent;
use tokio::sync::broadcast;
use tracing::trace;

/// Sink for session events.
pub trait EventPublisher: Send + Sync {
    /// Hand off one event. Must return without waiting on consumers.
    fn publish(&self, event: SessionEvent);
}

/// Publisher over a `tokio::sync::broadcast` channel.
///
/// Subscribers that fall more than the buffer behind observe
/// `RecvError::Lagged` and skip ahead; the actor is never slowed down.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<SessionEvent>,
}

impl BroadcastPublisher {
    #[must_use]
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer.max(1));
        Self { sender }
    }

    /// Receive every event published after this call.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: SessionEvent) {
        // Err only means nobody is subscribed.
        if self.sender.send(event).is_err() {
            trace!(target: "sc.events", "No event subscribers");
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::models::{SessionEventKind, SessionStatus};
    use common::types::SessionId;

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let publisher = BroadcastPublisher::new(8);
        let mut rx = publisher.subscribe();
        let id = SessionId::new();

        publisher.publish(SessionEvent::status_changed(
            id,
            SessionStatus::Pending,
            SessionStatus::Ringing,
            Some("bob".into()),
        ));
        publisher.publish(SessionEvent::status_changed(
            id,
            SessionStatus::Ringing,
            SessionStatus::Active,
            Some("bob".into()),
        ));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.to_status, SessionStatus::Ringing);
        assert_eq!(second.to_status, SessionStatus::Active);
        assert_eq!(second.kind, SessionEventKind::StatusChanged);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let publisher = BroadcastPublisher::new(1);
        publisher.publish(SessionEvent::membership(
            SessionId::new(),
            SessionEventKind::ParticipantJoined,
            SessionStatus::Active,
            "alice".into(),
        ));
    }
}
