//! Actor model for session signaling.
//!
//! One `SessionActor` per live call or room. Its mailbox serializes every
//! change to that session; different sessions run independently.
//!
//! ```text
//! SignalingCoordinator (registry, routing)
//! └── SessionActor (one per live session)
//!     ├── CallSession cache + RoomMembership
//!     ├── ring watchdog (calls)
//!     └── empty-room grace timer (rooms)
//! ```
//!
//! # Cancellation
//!
//! Each actor runs under a child of the coordinator's root
//! `CancellationToken`; cancelling the root stops every actor. An actor also
//! stops by itself once its session is terminal, after answering the
//! requests that were already queued.

pub mod messages;
pub mod metrics;
pub mod session;

pub use messages::{Applied, Operation, SessionMessage};
pub use metrics::{ActorMetrics, MailboxLevel, MailboxMonitor};
pub use session::{ActorContext, ActorSettings, SessionActor, SessionActorHandle};
