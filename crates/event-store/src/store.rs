use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::RequestContext;
use futures_core::Stream;

use crate::error::Result;
use crate::event::Event;

/// A stream of events in commit order.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event>> + Send>>;

/// The store's view of an aggregate: its pending uncommitted events.
///
/// Implemented by the domain layer's aggregate root. The store reads
/// the uncommitted batch, commits it atomically, and clears the list
/// only after a successful write.
pub trait AggregateSource: Send {
    /// Events recorded since the last successful persist.
    fn uncommitted_events(&self) -> &[Event];

    /// Marks all uncommitted events as persisted.
    fn clear_uncommitted(&mut self);
}

/// Ordered, per-aggregate append-only persistence.
///
/// Implementations must be thread-safe. The store does not lock per
/// aggregate: callers serialize writers for one root themselves, via
/// the optimistic sequence check carried on the request context.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Persists an aggregate's uncommitted events as one atomic batch.
    ///
    /// Missing attribution metadata (user, module, group, schema name)
    /// is filled from the context before validation. If any event fails
    /// validation the batch is rolled back to a savepoint taken before
    /// the first write and the first validation error is returned.
    ///
    /// On success the aggregate's uncommitted list is cleared and each
    /// committed event is broadcast through the event dispatcher;
    /// subscriber errors are logged, never surfaced to the caller.
    ///
    /// Returns the committed events.
    async fn persist(
        &self,
        ctx: &RequestContext,
        aggregate: &mut dyn AggregateSource,
    ) -> Result<Vec<Event>>;

    /// Returns all events for a root aggregate, ascending by sequence.
    async fn get_by_aggregate(&self, root_id: &str) -> Result<Vec<Event>>;

    /// Returns the events a specific entity contributed to a root's
    /// stream, ascending by sequence.
    async fn get_by_entity_and_aggregate(
        &self,
        entity_id: &str,
        entity_type: &str,
        root_id: &str,
    ) -> Result<Vec<Event>>;

    /// Returns a root's events with `start <= sequence_no <= end`,
    /// ascending by sequence.
    async fn get_by_aggregate_and_sequence_range(
        &self,
        root_id: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<Event>>;

    /// Returns the highest committed sequence number for a root, or 0
    /// when the root has no events.
    async fn get_aggregate_sequence_number(&self, root_id: &str) -> Result<i64>;

    /// Streams the full log ordered by commit time, optionally limited
    /// to events created at or after `since`.
    async fn stream_all(&self, since: Option<DateTime<Utc>>) -> Result<EventStream>;

    /// Idempotently ensures the backing storage schema exists.
    async fn migrate(&self, ctx: &RequestContext) -> Result<()>;

    /// Deletes specific event records.
    ///
    /// Administrative/compensating use only; never part of the normal
    /// write path.
    async fn remove(&self, events: &[Event]) -> Result<()>;
}

/// Fills attribution metadata the caller left blank from context defaults.
pub(crate) fn fill_meta_defaults(ctx: &RequestContext, event: &mut Event) {
    if event.meta.user.is_empty() {
        event.meta.user = ctx.user_id.clone();
    }
    if event.meta.module.is_empty() {
        event.meta.module = ctx.module_id.clone();
    }
    if event.meta.group.is_empty() {
        event.meta.group = ctx.group.clone();
    }
    if event.meta.schema_name.is_empty() {
        event.meta.schema_name = event.meta.entity_type.clone();
    }
}
