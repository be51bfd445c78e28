//! Test fixtures: a wired-up coordinator and config helpers.

use sc_service::config::Config;
use sc_service::coordinator::{CoordinatorSettings, SignalingCoordinator};
use sc_service::events::EventPublisher;
use sc_service::media::MediaTransport;
use sc_service::store::SessionStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::flaky_store::FlakyStore;
use crate::mock_media::MockMediaTransport;
use crate::mock_publisher::RecordingPublisher;

/// Coordinator over a [`FlakyStore`], a [`RecordingPublisher`] and a
/// [`MockMediaTransport`], with handles to all three for assertions.
pub struct Harness {
    pub coordinator: SignalingCoordinator,
    pub store: Arc<FlakyStore>,
    pub publisher: Arc<RecordingPublisher>,
    pub media: Arc<MockMediaTransport>,
    pub cancel_token: CancellationToken,
}

impl Harness {
    /// Harness with default settings and a media transport that succeeds.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> HarnessBuilder {
        HarnessBuilder::default()
    }

    /// Another coordinator over the same store, standing in for a second
    /// service instance. Events go to the same publisher.
    pub fn second_instance(&self) -> SignalingCoordinator {
        SignalingCoordinator::new(
            Arc::clone(&self.store) as Arc<dyn SessionStore>,
            Arc::clone(&self.publisher) as Arc<dyn EventPublisher>,
            Arc::clone(&self.media) as Arc<dyn MediaTransport>,
            CoordinatorSettings::default(),
            self.cancel_token.child_token(),
        )
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Builder for [`Harness`].
#[derive(Default)]
pub struct HarnessBuilder {
    settings: CoordinatorSettings,
    media: Option<MockMediaTransport>,
}

impl HarnessBuilder {
    /// Ring watchdog deadline; `None` disables it.
    #[must_use]
    pub fn ring_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.settings.ring_timeout = timeout;
        self
    }

    #[must_use]
    pub fn empty_room_grace(mut self, grace: Duration) -> Self {
        self.settings.empty_room_grace = grace;
        self
    }

    #[must_use]
    pub fn room_capacity(mut self, default: u32, max: u32) -> Self {
        self.settings.default_room_capacity = default;
        self.settings.max_room_capacity = max;
        self
    }

    #[must_use]
    pub fn media(mut self, media: MockMediaTransport) -> Self {
        self.media = Some(media);
        self
    }

    pub fn build(self) -> Harness {
        let store = Arc::new(FlakyStore::in_memory());
        let publisher = Arc::new(RecordingPublisher::new());
        let media = Arc::new(self.media.unwrap_or_default());
        let cancel_token = CancellationToken::new();

        let coordinator = SignalingCoordinator::new(
            Arc::clone(&store) as Arc<dyn SessionStore>,
            Arc::clone(&publisher) as Arc<dyn EventPublisher>,
            Arc::clone(&media) as Arc<dyn MediaTransport>,
            self.settings,
            cancel_token.child_token(),
        );

        Harness {
            coordinator,
            store,
            publisher,
            media,
            cancel_token,
        }
    }
}

/// Config backed by the in-memory store, with `overrides` applied.
pub fn test_config(overrides: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = HashMap::from([(
        "SC_STORE_BACKEND".to_string(),
        "memory".to_string(),
    )]);
    for (key, value) in overrides {
        vars.insert((*key).to_string(), (*value).to_string());
    }
    Config::from_vars(&vars).expect("test config should be valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sc_service::models::InitiateSession;

    #[tokio::test]
    async fn test_harness_wires_collaborators() {
        let h = Harness::new();
        let call = h
            .coordinator
            .initiate(InitiateSession::call("alice", "bob"))
            .await
            .unwrap();

        assert_eq!(h.store.get(call.id).await.unwrap().id, call.id);
        assert!(!h.publisher.events_for(call.id).is_empty());
    }

    #[test]
    fn test_config_overrides() {
        let config = test_config(&[("SC_RING_TIMEOUT_SECONDS", "5")]);
        assert_eq!(config.ring_timeout(), Some(Duration::from_secs(5)));
    }
}
