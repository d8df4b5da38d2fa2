//! Ordered, per-aggregate append-only event persistence.
//!
//! The store validates and commits event batches atomically, guards
//! writers with optimistic sequence checks, and broadcasts every
//! committed event to projection subscribers through the
//! [`EventDispatcher`].

pub mod dispatcher;
pub mod error;
pub mod event;
pub mod memory;
pub mod postgres;
pub mod store;

pub use common::EventId;
pub use dispatcher::{EventDispatcher, EventSubscriber};
pub use error::{EventStoreError, Result};
pub use event::{
    EVENT_TYPE_CREATE, EVENT_TYPE_DELETE, EVENT_TYPE_UPDATE, Event, EventMeta, create_event,
    delete_event, update_event,
};
pub use memory::InMemoryEventStore;
pub use postgres::PostgresEventStore;
pub use store::{AggregateSource, EventStore, EventStream};
