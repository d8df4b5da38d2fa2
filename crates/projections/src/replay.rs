//! Rebuilds read models by replaying the event log through the dispatcher.
//!
//! Replay is idempotent: an event whose sequence number is already
//! materialized for its entity is counted as skipped, not re-applied
//! and not treated as a failure.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::RequestContext;
use event_store::{EventDispatcher, EventStore};
use futures_util::StreamExt;

use crate::error::{ProjectionError, Result};
use crate::projection::Projection;

/// Summary of a replay run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayOutcome {
    /// Events read from the log.
    pub total: u64,
    /// Events applied to the read model.
    pub successful: u64,
    /// Events already materialized at an equal or higher sequence number.
    pub skipped: u64,
}

/// Streams persisted events through an [`EventDispatcher`] to rebuild
/// the read models registered on it.
pub struct ReplayEngine {
    store: Arc<dyn EventStore>,
    dispatcher: Arc<EventDispatcher>,
    read_model: Arc<dyn Projection>,
}

impl ReplayEngine {
    pub fn new(
        store: Arc<dyn EventStore>,
        dispatcher: Arc<EventDispatcher>,
        read_model: Arc<dyn Projection>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            read_model,
        }
    }

    /// Prepares read-model storage for the given entity types.
    pub async fn migrate(&self, entity_types: &[String]) -> Result<()> {
        self.read_model.migrate(entity_types).await
    }

    /// Replays every event at or after `since` (the whole log when `None`).
    ///
    /// Events whose sequence number is already reflected in the read model
    /// are skipped. Subscriber errors surface as a hard failure because a
    /// partially rebuilt read model is worse than none.
    pub async fn replay_events(
        &self,
        ctx: &RequestContext,
        since: Option<DateTime<Utc>>,
    ) -> Result<ReplayOutcome> {
        let mut outcome = ReplayOutcome::default();
        let mut stream = self.store.stream_all(since).await?;

        while let Some(next) = stream.next().await {
            if ctx.is_cancelled() {
                return Err(ProjectionError::Cancelled);
            }
            let event = next?;
            outcome.total += 1;

            let materialized = self
                .read_model
                .last_sequence(&event.meta.schema_name, &event.meta.entity_id)
                .await;
            if materialized.is_some_and(|seq| seq >= event.meta.sequence_no) {
                outcome.skipped += 1;
                continue;
            }

            let errors = self.dispatcher.dispatch(&event).await;
            if let Some(err) = errors.into_iter().next() {
                tracing::error!(
                    event_id = %event.id,
                    entity_id = %event.meta.entity_id,
                    error = %err,
                    "replay aborted on subscriber failure"
                );
                return Err(ProjectionError::Projection(err.to_string()));
            }
            outcome.successful += 1;
            metrics::counter!("projection_events_replayed").increment(1);
        }

        tracing::info!(
            total = outcome.total,
            successful = outcome.successful,
            skipped = outcome.skipped,
            "replay complete"
        );
        Ok(outcome)
    }
}
