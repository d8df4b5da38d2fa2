use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::RequestContext;
use tokio::sync::RwLock;

use crate::dispatcher::EventDispatcher;
use crate::error::{EventStoreError, Result};
use crate::event::Event;
use crate::store::{AggregateSource, EventStore, EventStream, fill_meta_defaults};

/// In-memory event store for tests and single-process use.
///
/// Mirrors the PostgreSQL implementation's contract: validated atomic
/// batches, optimistic sequence checks, ordered reads, and fan-out
/// through the shared event dispatcher after commit.
#[derive(Clone, Default)]
pub struct InMemoryEventStore {
    events: Arc<RwLock<Vec<Event>>>,
    dispatcher: Arc<EventDispatcher>,
}

impl InMemoryEventStore {
    /// Creates an empty store with its own dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty store broadcasting through the given dispatcher.
    pub fn with_dispatcher(dispatcher: Arc<EventDispatcher>) -> Self {
        Self {
            events: Arc::new(RwLock::new(Vec::new())),
            dispatcher,
        }
    }

    /// The dispatcher persisted events are broadcast through.
    pub fn dispatcher(&self) -> &Arc<EventDispatcher> {
        &self.dispatcher
    }

    /// Returns the total number of committed events.
    pub async fn event_count(&self) -> usize {
        self.events.read().await.len()
    }

    /// Removes all committed events.
    pub async fn clear(&self) {
        self.events.write().await.clear();
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn persist(
        &self,
        ctx: &RequestContext,
        aggregate: &mut dyn AggregateSource,
    ) -> Result<Vec<Event>> {
        if ctx.is_cancelled() {
            return Err(EventStoreError::Cancelled);
        }

        if aggregate.uncommitted_events().is_empty() {
            return Ok(Vec::new());
        }

        // Stage the batch: nothing is visible until every event passes
        // validation, matching the savepoint rollback of the SQL store.
        let mut staged: Vec<Event> = Vec::with_capacity(aggregate.uncommitted_events().len());
        for event in aggregate.uncommitted_events() {
            let mut event = event.clone();
            fill_meta_defaults(ctx, &mut event);
            event.validate()?;
            staged.push(event);
        }

        let root_id = staged[0].meta.root_id.clone();

        {
            let mut store = self.events.write().await;

            let actual = store
                .iter()
                .filter(|e| e.meta.root_id == root_id)
                .map(|e| e.meta.sequence_no)
                .max()
                .unwrap_or(0);

            if let Some(expected) = ctx.expected_sequence_no
                && expected != actual
            {
                return Err(EventStoreError::StaleSequence {
                    root_id,
                    expected,
                    actual,
                });
            }

            // Simulates the unique (root_id, sequence_no) constraint.
            if staged.iter().any(|e| e.meta.sequence_no <= actual) {
                return Err(EventStoreError::StaleSequence {
                    root_id,
                    expected: ctx.expected_sequence_no.unwrap_or(actual),
                    actual,
                });
            }

            store.extend(staged.iter().cloned());
        }

        aggregate.clear_uncommitted();
        metrics::counter!("event_store_events_persisted").increment(staged.len() as u64);

        for event in &staged {
            let errors = self.dispatcher.dispatch(event).await;
            if !errors.is_empty() {
                tracing::error!(
                    event_id = %event.id,
                    error_count = errors.len(),
                    "subscriber errors during event fan-out"
                );
            }
        }

        Ok(staged)
    }

    async fn get_by_aggregate(&self, root_id: &str) -> Result<Vec<Event>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| e.meta.root_id == root_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.meta.sequence_no);
        Ok(events)
    }

    async fn get_by_entity_and_aggregate(
        &self,
        entity_id: &str,
        entity_type: &str,
        root_id: &str,
    ) -> Result<Vec<Event>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| {
                e.meta.entity_id == entity_id
                    && e.meta.entity_type == entity_type
                    && e.meta.root_id == root_id
            })
            .cloned()
            .collect();
        events.sort_by_key(|e| e.meta.sequence_no);
        Ok(events)
    }

    async fn get_by_aggregate_and_sequence_range(
        &self,
        root_id: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<Event>> {
        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| {
                e.meta.root_id == root_id
                    && e.meta.sequence_no >= start
                    && e.meta.sequence_no <= end
            })
            .cloned()
            .collect();
        events.sort_by_key(|e| e.meta.sequence_no);
        Ok(events)
    }

    async fn get_aggregate_sequence_number(&self, root_id: &str) -> Result<i64> {
        let store = self.events.read().await;
        Ok(store
            .iter()
            .filter(|e| e.meta.root_id == root_id)
            .map(|e| e.meta.sequence_no)
            .max()
            .unwrap_or(0))
    }

    async fn stream_all(&self, since: Option<DateTime<Utc>>) -> Result<EventStream> {
        use futures_util::stream;

        let store = self.events.read().await;
        let mut events: Vec<_> = store
            .iter()
            .filter(|e| since.is_none_or(|s| e.meta.created >= s))
            .cloned()
            .collect();
        events.sort_by(|a, b| a.meta.created.cmp(&b.meta.created).then(a.id.cmp(&b.id)));

        Ok(Box::pin(stream::iter(events.into_iter().map(Ok))))
    }

    async fn migrate(&self, _ctx: &RequestContext) -> Result<()> {
        Ok(())
    }

    async fn remove(&self, events: &[Event]) -> Result<()> {
        let ids: HashSet<_> = events.iter().map(|e| e.id).collect();
        self.events.write().await.retain(|e| !ids.contains(&e.id));
        Ok(())
    }
}
