//! # SC Test Utilities
//!
//! Mocks and fixtures for exercising the Signaling Controller without
//! Redis or a media provider.
//!
//! ## Modules
//!
//! - `mock_media` - Media transport that records calls and can fail
//! - `mock_publisher` - Event publisher that keeps every event
//! - `flaky_store` - Store wrapper that injects conflicts and outages
//! - `fixtures` - Coordinator harness and config helpers
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sc_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let h = Harness::new();
//!     let call = h.coordinator.initiate(InitiateSession::call("alice", "bob")).await.unwrap();
//!     h.coordinator.accept(call.id, &"bob".into()).await.unwrap();
//!
//!     assert_eq!(h.media.established(), vec![call.id]);
//! }
//! ```

pub mod fixtures;
pub mod flaky_store;
pub mod mock_media;
pub mod mock_publisher;

pub use fixtures::*;
pub use flaky_store::*;
pub use mock_media::*;
pub use mock_publisher::*;
