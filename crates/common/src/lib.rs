//! Common utilities and types shared across signaling components.

#![warn(clippy::pedantic)]

/// Module for identifier newtypes (sessions, users)
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;
