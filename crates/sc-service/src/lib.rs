//! Signaling Controller library.
//!
//! Owns the lifecycle of call and live-stream sessions: who may ring,
//! accept, join or end a session, how many people a room admits, and which
//! status change wins when requests race. Media transport and client
//! notification delivery are collaborators behind traits.
//!
//! - [`coordinator`] - public operations, one entry point per request
//! - [`actors`] - one actor per live session, the serialization point
//! - [`state_machine`] - the pure transition table
//! - [`membership`] - room capacity and join/leave bookkeeping
//! - [`store`] - durable session state (Redis or in-memory)
//! - [`routes`] / [`handlers`] - the HTTP adapter

pub mod actors;
pub mod config;
pub mod coordinator;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod media;
pub mod membership;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod state_machine;
pub mod store;
