//! Generic in-memory read model keyed by schema name.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use event_store::{
    EVENT_TYPE_CREATE, EVENT_TYPE_DELETE, EVENT_TYPE_UPDATE, Event, EventStoreError,
    EventSubscriber,
};
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::Result;
use crate::projection::Projection;

/// One materialized row of a read model.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReadModelRow {
    /// Sequence number of the last event applied to this row.
    pub sequence_no: i64,

    /// The row's denormalized field values.
    pub data: Map<String, Value>,
}

/// In-memory read model holding one table per schema name.
///
/// Rows are keyed by entity id and track the sequence number of the
/// last event applied, which is what makes replay idempotent: an
/// already-materialized row is skipped, never overwritten.
#[derive(Clone, Default)]
pub struct InMemoryReadModel {
    tables: Arc<RwLock<HashMap<String, HashMap<String, ReadModelRow>>>>,
}

impl InMemoryReadModel {
    /// Creates an empty read model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the materialized row for an entity.
    pub async fn get(&self, schema_name: &str, entity_id: &str) -> Option<ReadModelRow> {
        self.tables
            .read()
            .await
            .get(schema_name)?
            .get(entity_id)
            .cloned()
    }

    /// Number of rows materialized for a schema.
    pub async fn count(&self, schema_name: &str) -> usize {
        self.tables
            .read()
            .await
            .get(schema_name)
            .map(|t| t.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl EventSubscriber for InMemoryReadModel {
    fn name(&self) -> &str {
        "InMemoryReadModel"
    }

    async fn handle(&self, event: &Event) -> std::result::Result<(), EventStoreError> {
        let mut tables = self.tables.write().await;
        let table = tables.entry(event.meta.schema_name.clone()).or_default();

        match event.event_type.as_str() {
            EVENT_TYPE_CREATE => {
                let data = match &event.payload {
                    Value::Object(fields) => fields.clone(),
                    _ => Map::new(),
                };
                table.insert(
                    event.meta.entity_id.clone(),
                    ReadModelRow {
                        sequence_no: event.meta.sequence_no,
                        data,
                    },
                );
            }
            EVENT_TYPE_UPDATE => {
                let row = table.entry(event.meta.entity_id.clone()).or_default();
                if let Value::Object(fields) = &event.payload {
                    for (key, value) in fields {
                        row.data.insert(key.clone(), value.clone());
                    }
                }
                row.sequence_no = event.meta.sequence_no;
            }
            EVENT_TYPE_DELETE => {
                table.remove(&event.meta.entity_id);
            }
            _ => {}
        }

        Ok(())
    }
}

#[async_trait]
impl Projection for InMemoryReadModel {
    async fn migrate(&self, entity_types: &[String]) -> Result<()> {
        let mut tables = self.tables.write().await;
        for entity_type in entity_types {
            tables.entry(entity_type.clone()).or_default();
        }
        Ok(())
    }

    async fn last_sequence(&self, schema_name: &str, entity_id: &str) -> Option<i64> {
        self.get(schema_name, entity_id).await.map(|r| r.sequence_no)
    }

    async fn reset(&self) -> Result<()> {
        self.tables.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use event_store::{create_event, delete_event, update_event};

    fn stamped(mut event: Event, sequence_no: i64) -> Event {
        event.meta.sequence_no = sequence_no;
        event.meta.root_id = event.meta.entity_id.clone();
        event
    }

    #[tokio::test]
    async fn create_materializes_a_row() {
        let model = InMemoryReadModel::new();
        let event = stamped(
            create_event("blog-1", "Blog", serde_json::json!({"title": "first"})),
            1,
        );

        model.handle(&event).await.unwrap();

        let row = model.get("Blog", "blog-1").await.unwrap();
        assert_eq!(row.sequence_no, 1);
        assert_eq!(row.data.get("title"), Some(&serde_json::json!("first")));
    }

    #[tokio::test]
    async fn update_merges_and_advances_sequence() {
        let model = InMemoryReadModel::new();
        model
            .handle(&stamped(
                create_event(
                    "blog-1",
                    "Blog",
                    serde_json::json!({"title": "first", "url": "u"}),
                ),
                1,
            ))
            .await
            .unwrap();
        model
            .handle(&stamped(
                update_event("blog-1", "Blog", serde_json::json!({"title": "second"})),
                2,
            ))
            .await
            .unwrap();

        let row = model.get("Blog", "blog-1").await.unwrap();
        assert_eq!(row.sequence_no, 2);
        assert_eq!(row.data.get("title"), Some(&serde_json::json!("second")));
        assert_eq!(row.data.get("url"), Some(&serde_json::json!("u")));
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let model = InMemoryReadModel::new();
        model
            .handle(&stamped(
                create_event("blog-1", "Blog", serde_json::json!({"title": "t"})),
                1,
            ))
            .await
            .unwrap();
        model
            .handle(&stamped(delete_event("blog-1", "Blog"), 2))
            .await
            .unwrap();

        assert!(model.get("Blog", "blog-1").await.is_none());
        assert_eq!(model.count("Blog").await, 0);
    }

    #[tokio::test]
    async fn migrate_creates_empty_tables() {
        let model = InMemoryReadModel::new();
        model
            .migrate(&["Blog".to_string(), "Post".to_string()])
            .await
            .unwrap();

        assert_eq!(model.count("Blog").await, 0);
        assert_eq!(model.count("Post").await, 0);
    }

    #[tokio::test]
    async fn reset_destroys_all_state() {
        let model = InMemoryReadModel::new();
        model
            .handle(&stamped(
                create_event("blog-1", "Blog", serde_json::json!({"title": "t"})),
                1,
            ))
            .await
            .unwrap();

        model.reset().await.unwrap();
        assert!(model.get("Blog", "blog-1").await.is_none());
    }
}
