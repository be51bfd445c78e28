//! Actor metrics and mailbox monitoring.
//!
//! Provides mailbox depth monitoring with fixed thresholds:
//!
//! | Actor Type | Normal | Warning | Critical |
//! |------------|--------|---------|----------|
//! | Session    | < 32   | 32-128  | > 128    |
//!
//! A session mailbox only ever holds requests for one call or room, so the
//! thresholds sit well below the channel buffer.

use crate::observability::metrics as prom;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Mailbox depth thresholds for session actors.
pub const SESSION_MAILBOX_NORMAL: usize = 32;
pub const SESSION_MAILBOX_WARNING: usize = 128;

const ACTOR_TYPE: &str = "session";

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    /// At or below normal threshold.
    Normal,
    /// Between normal and warning thresholds.
    Warning,
    /// Above warning threshold.
    Critical,
}

impl MailboxLevel {
    #[must_use]
    pub const fn for_depth(depth: usize) -> Self {
        if depth > SESSION_MAILBOX_WARNING {
            MailboxLevel::Critical
        } else if depth > SESSION_MAILBOX_NORMAL {
            MailboxLevel::Warning
        } else {
            MailboxLevel::Normal
        }
    }
}

/// Mailbox monitor shared by a session actor and its handles.
///
/// Handles count a message in when they send it; the actor counts it out
/// once processed.
#[derive(Debug)]
pub struct MailboxMonitor {
    /// Session identifier for log context.
    actor_id: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(actor_id: impl Into<String>) -> Self {
        Self {
            actor_id: actor_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
        }
    }

    /// Record a message being added to the mailbox.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_depth.fetch_max(new_depth, Ordering::Relaxed);
        prom::set_actor_mailbox_depth(ACTOR_TYPE, new_depth);

        match MailboxLevel::for_depth(new_depth) {
            MailboxLevel::Critical => {
                warn!(
                    target: "sc.actor.mailbox",
                    actor_id = %self.actor_id,
                    depth = new_depth,
                    threshold = SESSION_MAILBOX_WARNING,
                    "Mailbox depth critical"
                );
            }
            MailboxLevel::Warning if new_depth == SESSION_MAILBOX_NORMAL + 1 => {
                // Log once when crossing the normal threshold
                debug!(
                    target: "sc.actor.mailbox",
                    actor_id = %self.actor_id,
                    depth = new_depth,
                    "Mailbox depth elevated"
                );
            }
            _ => {}
        }
    }

    /// Record a message leaving the mailbox without being processed.
    pub fn record_unsent(&self) {
        let _ = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| d.checked_sub(1));
    }

    /// Record a message being removed from the mailbox (processed).
    pub fn record_dequeue(&self) {
        let _ = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| d.checked_sub(1));
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        prom::set_actor_mailbox_depth(ACTOR_TYPE, self.current_depth());
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        MailboxLevel::for_depth(self.current_depth())
    }
}

/// Aggregated metrics for the session actor system.
#[derive(Debug, Default)]
pub struct ActorMetrics {
    live_sessions: AtomicUsize,
    actor_panics: AtomicU64,
}

impl ActorMetrics {
    /// Create a new shared metrics instance.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn session_started(&self) {
        let live = self.live_sessions.fetch_add(1, Ordering::Relaxed) + 1;
        prom::set_sessions_live(live);
    }

    pub fn session_stopped(&self) {
        let _ = self
            .live_sessions
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
        prom::set_sessions_live(self.live_sessions());
    }

    pub fn record_panic(&self) {
        self.actor_panics.fetch_add(1, Ordering::Relaxed);
        prom::record_actor_panic(ACTOR_TYPE);
    }

    #[must_use]
    pub fn live_sessions(&self) -> usize {
        self.live_sessions.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn actor_panics(&self) -> u64 {
        self.actor_panics.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_levels() {
        assert_eq!(MailboxLevel::for_depth(0), MailboxLevel::Normal);
        assert_eq!(
            MailboxLevel::for_depth(SESSION_MAILBOX_NORMAL),
            MailboxLevel::Normal
        );
        assert_eq!(
            MailboxLevel::for_depth(SESSION_MAILBOX_NORMAL + 1),
            MailboxLevel::Warning
        );
        assert_eq!(
            MailboxLevel::for_depth(SESSION_MAILBOX_WARNING + 1),
            MailboxLevel::Critical
        );
    }

    #[test]
    fn test_mailbox_depth_tracking() {
        let monitor = MailboxMonitor::new("session-1");

        monitor.record_enqueue();
        monitor.record_enqueue();
        monitor.record_enqueue();
        assert_eq!(monitor.current_depth(), 3);
        assert_eq!(monitor.peak_depth(), 3);

        monitor.record_dequeue();
        monitor.record_unsent();
        assert_eq!(monitor.current_depth(), 1);
        assert_eq!(monitor.peak_depth(), 3);
        assert_eq!(monitor.messages_processed(), 1);
    }

    #[test]
    fn test_depth_never_underflows() {
        let monitor = MailboxMonitor::new("session-1");
        monitor.record_dequeue();
        monitor.record_unsent();
        assert_eq!(monitor.current_depth(), 0);
    }

    #[test]
    fn test_actor_metrics_counts() {
        let metrics = ActorMetrics::new();
        metrics.session_started();
        metrics.session_started();
        metrics.session_stopped();
        metrics.record_panic();

        assert_eq!(metrics.live_sessions(), 1);
        assert_eq!(metrics.actor_panics(), 1);

        metrics.session_stopped();
        metrics.session_stopped();
        assert_eq!(metrics.live_sessions(), 0);
    }
}
