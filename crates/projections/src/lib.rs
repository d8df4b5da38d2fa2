//! Read-model projections and event replay.
//!
//! Projections subscribe to the event dispatcher and maintain queryable
//! read models. The [`ReplayEngine`] rebuilds them from the persisted
//! log, skipping events that are already materialized.

pub mod error;
pub mod projection;
pub mod read_model;
pub mod replay;

pub use error::{ProjectionError, Result};
pub use projection::Projection;
pub use read_model::{InMemoryReadModel, ReadModelRow};
pub use replay::{ReplayEngine, ReplayOutcome};
