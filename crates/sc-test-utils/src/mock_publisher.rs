//! Recording event publisher.
//!
//! Keeps every published [`SessionEvent`] so tests can assert on ordering
//! and on "exactly one" guarantees.

use common::types::SessionId;
use sc_service::events::EventPublisher;
use sc_service::models::{SessionEvent, SessionEventKind, SessionStatus};
use std::sync::Mutex;

/// Event publisher that stores events in publish order.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingPublisher {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events, in publish order.
    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events of one session, in publish order.
    pub fn events_for(&self, id: SessionId) -> Vec<SessionEvent> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.session_id == id)
            .cloned()
            .collect()
    }

    /// Target statuses of the session's `StatusChanged` events.
    pub fn status_changes(&self, id: SessionId) -> Vec<SessionStatus> {
        self.events_for(id)
            .into_iter()
            .filter(|e| e.kind == SessionEventKind::StatusChanged)
            .map(|e| e.to_status)
            .collect()
    }

    /// Number of events of `kind` for the session.
    pub fn count(&self, id: SessionId, kind: SessionEventKind) -> usize {
        self.events_for(id)
            .iter()
            .filter(|e| e.kind == kind)
            .count()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, event: SessionEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_by_session_and_kind() {
        let publisher = RecordingPublisher::new();
        let a = SessionId::new();
        let b = SessionId::new();

        publisher.publish(SessionEvent::status_changed(
            a,
            SessionStatus::Pending,
            SessionStatus::Ringing,
            Some("alice".into()),
        ));
        publisher.publish(SessionEvent::membership(
            a,
            SessionEventKind::ParticipantJoined,
            SessionStatus::Ringing,
            "bob".into(),
        ));
        publisher.publish(SessionEvent::status_changed(
            b,
            SessionStatus::Pending,
            SessionStatus::Active,
            None,
        ));

        assert_eq!(publisher.events().len(), 3);
        assert_eq!(publisher.status_changes(a), vec![SessionStatus::Ringing]);
        assert_eq!(publisher.count(a, SessionEventKind::ParticipantJoined), 1);
        assert_eq!(publisher.count(b, SessionEventKind::ParticipantJoined), 0);

        publisher.clear();
        assert!(publisher.events().is_empty());
    }
}
