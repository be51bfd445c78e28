//! Mock media transport.
//!
//! Records every `establish`/`teardown` call and can be configured to fail
//! establishment.
//!
//! # Example
//!
//! ```rust,ignore
//! use sc_test_utils::MockMediaTransport;
//!
//! let media = MockMediaTransport::builder().fail_establish().build();
//! ```

use async_trait::async_trait;
use common::types::SessionId;
use sc_service::media::{MediaError, MediaTransport};
use sc_service::models::CallSession;
use std::sync::Mutex;

/// Media transport for tests.
#[derive(Debug, Default)]
pub struct MockMediaTransport {
    fail_establish: bool,
    fail_teardown: bool,
    established: Mutex<Vec<SessionId>>,
    torn_down: Mutex<Vec<SessionId>>,
}

impl MockMediaTransport {
    /// Create a new MockMediaTransport builder.
    #[must_use]
    pub fn builder() -> MockMediaTransportBuilder {
        MockMediaTransportBuilder::default()
    }

    /// Transport where every call succeeds.
    #[must_use]
    pub fn accepting() -> Self {
        Self::default()
    }

    /// Sessions passed to `establish`, in call order.
    pub fn established(&self) -> Vec<SessionId> {
        self.established.lock().unwrap().clone()
    }

    /// Sessions passed to `teardown`, in call order.
    pub fn torn_down(&self) -> Vec<SessionId> {
        self.torn_down.lock().unwrap().clone()
    }

    /// Number of `teardown` calls for one session.
    pub fn teardown_count(&self, id: SessionId) -> usize {
        self.torn_down
            .lock()
            .unwrap()
            .iter()
            .filter(|s| **s == id)
            .count()
    }
}

#[async_trait]
impl MediaTransport for MockMediaTransport {
    async fn establish(&self, session: &CallSession) -> Result<(), MediaError> {
        self.established.lock().unwrap().push(session.id);
        if self.fail_establish {
            return Err(MediaError("no media route available".to_string()));
        }
        Ok(())
    }

    async fn teardown(&self, session: &CallSession) -> Result<(), MediaError> {
        self.torn_down.lock().unwrap().push(session.id);
        if self.fail_teardown {
            return Err(MediaError("media handler unreachable".to_string()));
        }
        Ok(())
    }
}

/// Builder for MockMediaTransport configuration.
#[derive(Debug, Default)]
pub struct MockMediaTransportBuilder {
    fail_establish: bool,
    fail_teardown: bool,
}

impl MockMediaTransportBuilder {
    /// Make every `establish` call fail.
    #[must_use]
    pub fn fail_establish(mut self) -> Self {
        self.fail_establish = true;
        self
    }

    /// Make every `teardown` call fail.
    #[must_use]
    pub fn fail_teardown(mut self) -> Self {
        self.fail_teardown = true;
        self
    }

    /// Build the MockMediaTransport.
    #[must_use]
    pub fn build(self) -> MockMediaTransport {
        MockMediaTransport {
            fail_establish: self.fail_establish,
            fail_teardown: self.fail_teardown,
            ..MockMediaTransport::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call() -> CallSession {
        CallSession::new_pending("alice".into(), Some("bob".into()), false, 2, None)
    }

    #[tokio::test]
    async fn test_records_calls() {
        let media = MockMediaTransport::accepting();
        let session = call();

        media.establish(&session).await.unwrap();
        media.teardown(&session).await.unwrap();
        media.teardown(&session).await.unwrap();

        assert_eq!(media.established(), vec![session.id]);
        assert_eq!(media.teardown_count(session.id), 2);
    }

    #[tokio::test]
    async fn test_failing_establish_still_records() {
        let media = MockMediaTransport::builder().fail_establish().build();
        let session = call();

        assert!(media.establish(&session).await.is_err());
        assert_eq!(media.established().len(), 1);
        assert!(media.teardown(&session).await.is_ok());
    }
}
