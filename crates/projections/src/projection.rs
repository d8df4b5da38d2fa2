//! Core projection trait.

use async_trait::async_trait;
use event_store::EventSubscriber;

use crate::Result;

/// A rebuildable read model fed by the event dispatcher.
///
/// Projections are derived state, never the source of truth: they can
/// be destroyed and rebuilt from the log at any time. Incremental
/// updates arrive through the [`EventSubscriber`] side of the trait;
/// the replay engine drives rebuilds through the same path.
#[async_trait]
pub trait Projection: EventSubscriber {
    /// Idempotently ensures read-model storage exists for each entity
    /// type.
    async fn migrate(&self, entity_types: &[String]) -> Result<()>;

    /// The sequence number of the materialized row for an entity, if
    /// one exists.
    ///
    /// The replay engine consults this to skip events that are already
    /// materialized instead of overwriting them.
    async fn last_sequence(&self, schema_name: &str, entity_id: &str) -> Option<i64>;

    /// Destroys all materialized state so a replay can rebuild it.
    async fn reset(&self) -> Result<()>;
}
