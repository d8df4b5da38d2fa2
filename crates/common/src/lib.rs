//! Shared types for the event-sourcing core.
//!
//! This crate holds the identifier newtypes and the explicit request
//! context that every layer of the system passes by value instead of
//! reading from process-wide state.

pub mod context;
pub mod types;

pub use context::RequestContext;
pub use types::EventId;
