//! Room membership tracking.
//!
//! One [`RoomMembership`] per live session, owned by that session's actor.
//! It is therefore only mutated inside the session's critical section and
//! needs no locking of its own.

use crate::models::Participant;
use chrono::{DateTime, Utc};
use common::types::{SessionId, UserId};
use std::collections::HashMap;

/// Outcome of a [`RoomMembership::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MembershipResult {
    /// New open membership.
    Admitted(Participant),
    /// The user already held an open membership; nothing changed.
    AlreadyMember(Participant),
    /// Count is at capacity.
    RoomFull { capacity: u32 },
}

/// Outcome of a [`RoomMembership::leave`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// Membership closed; `remaining` open members are left.
    Left {
        participant: Participant,
        remaining: usize,
    },
    /// The user was not a member; nothing changed.
    NotMember,
}

/// Open participants of one session, bounded by its capacity.
#[derive(Debug, Clone)]
pub struct RoomMembership {
    session_id: SessionId,
    capacity: u32,
    members: HashMap<UserId, Participant>,
}

impl RoomMembership {
    #[must_use]
    pub fn new(session_id: SessionId, capacity: u32) -> Self {
        Self {
            session_id,
            capacity,
            members: HashMap::new(),
        }
    }

    /// Rebuild from persisted records; closed records are skipped.
    ///
    /// Records beyond capacity are dropped in join order.
    #[must_use]
    pub fn from_records(session_id: SessionId, capacity: u32, records: Vec<Participant>) -> Self {
        let mut open: Vec<Participant> = records
            .into_iter()
            .filter(|p| p.session_id == session_id && p.is_open())
            .collect();
        open.sort_by(|a, b| a.joined_at.cmp(&b.joined_at));

        let mut membership = Self::new(session_id, capacity);
        for participant in open {
            if membership.is_full() {
                break;
            }
            membership
                .members
                .entry(participant.user_id.clone())
                .or_insert(participant);
        }
        membership
    }

    /// Admit `user_id` if there is room.
    pub fn join(&mut self, user_id: &UserId) -> MembershipResult {
        if let Some(existing) = self.members.get(user_id) {
            return MembershipResult::AlreadyMember(existing.clone());
        }
        if self.is_full() {
            return MembershipResult::RoomFull {
                capacity: self.capacity,
            };
        }
        let participant = Participant::open(self.session_id, user_id.clone());
        self.members.insert(user_id.clone(), participant.clone());
        MembershipResult::Admitted(participant)
    }

    /// Close `user_id`'s membership. Leaving twice is a no-op.
    pub fn leave(&mut self, user_id: &UserId, at: DateTime<Utc>) -> LeaveOutcome {
        match self.members.remove(user_id) {
            Some(mut participant) => {
                participant.left_at = Some(at);
                LeaveOutcome::Left {
                    participant,
                    remaining: self.members.len(),
                }
            }
            None => LeaveOutcome::NotMember,
        }
    }

    /// Undo an admission whose persistence failed.
    pub(crate) fn revert_join(&mut self, user_id: &UserId) {
        self.members.remove(user_id);
    }

    /// Undo a leave whose persistence failed.
    pub(crate) fn revert_leave(&mut self, mut participant: Participant) {
        participant.left_at = None;
        self.members
            .insert(participant.user_id.clone(), participant);
    }

    #[must_use]
    pub fn count(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[must_use]
    pub fn contains(&self, user_id: &UserId) -> bool {
        self.members.contains_key(user_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Open members in join order.
    #[must_use]
    pub fn members(&self) -> Vec<UserId> {
        let mut open: Vec<&Participant> = self.members.values().collect();
        open.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        open.into_iter().map(|p| p.user_id.clone()).collect()
    }

    fn is_full(&self) -> bool {
        u32::try_from(self.members.len()).map_or(true, |count| count >= self.capacity)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_join_until_full() {
        let mut room = RoomMembership::new(SessionId::new(), 2);

        assert!(matches!(
            room.join(&"alice".into()),
            MembershipResult::Admitted(_)
        ));
        assert!(matches!(
            room.join(&"bob".into()),
            MembershipResult::Admitted(_)
        ));
        assert_eq!(
            room.join(&"carol".into()),
            MembershipResult::RoomFull { capacity: 2 }
        );
        assert_eq!(room.count(), 2);
        assert!(!room.contains(&"carol".into()));
    }

    #[test]
    fn test_repeated_join_is_idempotent() {
        let mut room = RoomMembership::new(SessionId::new(), 2);
        let MembershipResult::Admitted(first) = room.join(&"alice".into()) else {
            unreachable!("first join must be admitted");
        };

        assert_eq!(
            room.join(&"alice".into()),
            MembershipResult::AlreadyMember(first)
        );
        assert_eq!(room.count(), 1);
    }

    #[test]
    fn test_member_rejoins_full_room_as_existing_member() {
        let mut room = RoomMembership::new(SessionId::new(), 1);
        room.join(&"alice".into());
        assert!(matches!(
            room.join(&"alice".into()),
            MembershipResult::AlreadyMember(_)
        ));
    }

    #[test]
    fn test_leave_is_idempotent() {
        let mut room = RoomMembership::new(SessionId::new(), 3);
        room.join(&"alice".into());
        room.join(&"bob".into());

        let now = Utc::now();
        match room.leave(&"alice".into(), now) {
            LeaveOutcome::Left {
                participant,
                remaining,
            } => {
                assert_eq!(participant.left_at, Some(now));
                assert_eq!(remaining, 1);
            }
            LeaveOutcome::NotMember => unreachable!("alice was a member"),
        }
        assert_eq!(room.leave(&"alice".into(), now), LeaveOutcome::NotMember);
        assert_eq!(room.leave(&"nobody".into(), now), LeaveOutcome::NotMember);
        assert_eq!(room.count(), 1);
    }

    #[test]
    fn test_leave_frees_a_slot() {
        let mut room = RoomMembership::new(SessionId::new(), 1);
        room.join(&"alice".into());
        room.leave(&"alice".into(), Utc::now());
        assert!(room.is_empty());
        assert!(matches!(
            room.join(&"bob".into()),
            MembershipResult::Admitted(_)
        ));
    }

    #[test]
    fn test_rebuild_skips_closed_records() {
        let id = SessionId::new();
        let mut closed = Participant::open(id, "bob".into());
        closed.left_at = Some(Utc::now());
        let mut early = Participant::open(id, "alice".into());
        early.joined_at = Utc::now() - Duration::seconds(5);

        let room = RoomMembership::from_records(
            id,
            5,
            vec![closed, Participant::open(id, "carol".into()), early],
        );

        assert_eq!(
            room.members(),
            vec![UserId::from("alice"), UserId::from("carol")]
        );
    }

    #[test]
    fn test_revert_restores_previous_state() {
        let mut room = RoomMembership::new(SessionId::new(), 2);
        room.join(&"alice".into());
        room.revert_join(&"alice".into());
        assert!(room.is_empty());

        room.join(&"bob".into());
        let LeaveOutcome::Left { participant, .. } = room.leave(&"bob".into(), Utc::now()) else {
            unreachable!("bob was a member");
        };
        room.revert_leave(participant);
        assert!(room.contains(&"bob".into()));
    }
}
