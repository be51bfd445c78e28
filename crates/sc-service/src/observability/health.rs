//! Liveness and readiness state for the Signaling Controller.
//!
//! - `live`: true once the process has started
//! - `ready`: true once the store is connected and the listener is bound;
//!   cleared again when shutdown begins
//!
//! The `/ready` handler additionally pings the session store on every probe.

use std::sync::atomic::{AtomicBool, Ordering};

/// Health state for Kubernetes probes.
#[derive(Debug)]
pub struct HealthState {
    live: AtomicBool,
    ready: AtomicBool,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Live immediately, ready only after startup completes.
    #[must_use]
    pub fn new() -> Self {
        Self {
            live: AtomicBool::new(true),
            ready: AtomicBool::new(false),
        }
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Cleared when graceful shutdown begins so probes drain traffic.
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_health_state_default() {
        let state = HealthState::new();
        assert!(state.is_live(), "Should be live by default");
        assert!(!state.is_ready(), "Should not be ready by default");
    }

    #[test]
    fn test_health_state_transitions() {
        let state = HealthState::new();

        state.set_ready();
        assert!(state.is_ready());

        state.set_not_ready();
        assert!(!state.is_ready());
    }

    #[test]
    fn test_health_state_thread_safety() {
        let state = Arc::new(HealthState::new());

        let state_clone = Arc::clone(&state);
        std::thread::spawn(move || state_clone.set_ready())
            .join()
            .expect("Thread should complete");

        assert!(state.is_ready());
    }
}
