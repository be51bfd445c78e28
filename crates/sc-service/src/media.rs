//! Media transport collaborator.
//!
//! Packet routing, codecs and NAT traversal live outside this service. The
//! coordinator only tells the transport when a session's media path should
//! exist: `establish` once the session is `Active`, `teardown` once it ends
//! or fails. Both are called after the session actor has replied, never
//! inside the critical section.

use crate::models::CallSession;
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Failure reported by the media transport.
#[derive(Debug, Error)]
#[error("media transport error: {0}")]
pub struct MediaError(pub String);

/// Media path lifecycle hooks.
#[async_trait]
pub trait MediaTransport: Send + Sync {
    /// Set up the media path for an `Active` session.
    ///
    /// # Errors
    ///
    /// An error makes the coordinator mark the session `Failed`.
    async fn establish(&self, session: &CallSession) -> Result<(), MediaError>;

    /// Release the media path of an `Ended` or `Failed` session.
    async fn teardown(&self, session: &CallSession) -> Result<(), MediaError>;
}

/// Transport used when no media provider is wired in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMediaTransport;

#[async_trait]
impl MediaTransport for NoopMediaTransport {
    async fn establish(&self, session: &CallSession) -> Result<(), MediaError> {
        debug!(target: "sc.media", session_id = %session.id, "Media establish (noop)");
        Ok(())
    }

    async fn teardown(&self, session: &CallSession) -> Result<(), MediaError> {
        debug!(target: "sc.media", session_id = %session.id, "Media teardown (noop)");
        Ok(())
    }
}
