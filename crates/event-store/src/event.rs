use chrono::{DateTime, Utc};
use common::EventId;
use serde::{Deserialize, Serialize};

use crate::error::{EventStoreError, Result};

/// Well-known event type recorded when an entity is first established.
pub const EVENT_TYPE_CREATE: &str = "create";

/// Well-known event type recorded when an entity's fields change.
pub const EVENT_TYPE_UPDATE: &str = "update";

/// Well-known event type recorded when an entity is removed.
pub const EVENT_TYPE_DELETE: &str = "delete";

/// Stream-position and attribution metadata carried by every event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    /// The concrete entity the event belongs to.
    pub entity_id: String,

    /// The entity kind (e.g. "Blog", "Post").
    pub entity_type: String,

    /// The aggregate root the entity belongs to.
    ///
    /// Equals `entity_id` for aggregate roots themselves.
    pub root_id: String,

    /// Position within the root aggregate's stream, starting at 1.
    pub sequence_no: i64,

    /// The user the change is attributed to.
    pub user: String,

    /// The application module that issued the change.
    pub module: String,

    /// Logical grouping for the change.
    pub group: String,

    /// The read-model table this event ultimately affects.
    pub schema_name: String,

    /// When the event was created.
    pub created: DateTime<Utc>,
}

/// One committed fact: an immutable record of a single state change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Globally unique, time-ordered identifier.
    pub id: EventId,

    /// String tag describing the change ("create", "update", "delete",
    /// or domain-specific).
    pub event_type: String,

    /// The serialized change data.
    pub payload: serde_json::Value,

    /// Schema version of the payload, not of the aggregate.
    pub version: u32,

    /// Stream-position and attribution metadata.
    pub meta: EventMeta,
}

impl Event {
    /// Creates a new event with a fresh ID and the current timestamp.
    ///
    /// Stream-position fields (`root_id`, `sequence_no`) are stamped by
    /// the aggregate when the event is recorded as a change.
    pub fn new(
        event_type: impl Into<String>,
        entity_id: impl Into<String>,
        entity_type: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        let entity_type = entity_type.into();
        Self {
            id: EventId::new(),
            event_type: event_type.into(),
            payload,
            version: 1,
            meta: EventMeta {
                entity_id: entity_id.into(),
                schema_name: entity_type.clone(),
                entity_type,
                created: Utc::now(),
                ..EventMeta::default()
            },
        }
    }

    /// Checks the commit preconditions for this event.
    ///
    /// An event is committable only when its identity fields are all
    /// present: `id`, `event_type`, `meta.entity_id`, `meta.entity_type`
    /// and a non-zero payload `version`. Returns the first violation
    /// found.
    pub fn validate(&self) -> Result<()> {
        let field = if self.id.is_nil() {
            Some("id")
        } else if self.event_type.is_empty() {
            Some("type")
        } else if self.meta.entity_id.is_empty() {
            Some("meta.entity_id")
        } else if self.meta.entity_type.is_empty() {
            Some("meta.entity_type")
        } else if self.version == 0 {
            Some("version")
        } else {
            None
        };

        match field {
            Some(field) => Err(EventStoreError::InvalidEvent {
                event_id: self.id.to_string(),
                field,
            }),
            None => Ok(()),
        }
    }

    /// Returns whether the event passes its commit preconditions.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}

/// Builds a "create" event for a new entity.
pub fn create_event(
    entity_id: impl Into<String>,
    entity_type: impl Into<String>,
    payload: serde_json::Value,
) -> Event {
    Event::new(EVENT_TYPE_CREATE, entity_id, entity_type, payload)
}

/// Builds an "update" event carrying changed fields.
pub fn update_event(
    entity_id: impl Into<String>,
    entity_type: impl Into<String>,
    payload: serde_json::Value,
) -> Event {
    Event::new(EVENT_TYPE_UPDATE, entity_id, entity_type, payload)
}

/// Builds a "delete" event for an entity.
pub fn delete_event(entity_id: impl Into<String>, entity_type: impl Into<String>) -> Event {
    Event::new(EVENT_TYPE_DELETE, entity_id, entity_type, serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_event_is_valid() {
        let event = create_event("blog-1", "Blog", serde_json::json!({"title": "hello"}));
        assert!(event.is_valid());
        assert_eq!(event.event_type, "create");
        assert_eq!(event.meta.entity_id, "blog-1");
        assert_eq!(event.meta.schema_name, "Blog");
        assert_eq!(event.version, 1);
    }

    #[test]
    fn validate_reports_first_missing_field() {
        let mut event = create_event("blog-1", "Blog", serde_json::json!({}));
        event.event_type = String::new();
        event.meta.entity_id = String::new();

        match event.validate() {
            Err(EventStoreError::InvalidEvent { field, .. }) => assert_eq!(field, "type"),
            other => panic!("expected InvalidEvent, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_nil_id() {
        let mut event = create_event("blog-1", "Blog", serde_json::json!({}));
        event.id = common::EventId::nil();

        match event.validate() {
            Err(EventStoreError::InvalidEvent { field, .. }) => assert_eq!(field, "id"),
            other => panic!("expected InvalidEvent, got {other:?}"),
        }
    }

    #[test]
    fn validate_rejects_zero_version() {
        let mut event = update_event("blog-1", "Blog", serde_json::json!({}));
        event.version = 0;

        match event.validate() {
            Err(EventStoreError::InvalidEvent { field, .. }) => assert_eq!(field, "version"),
            other => panic!("expected InvalidEvent, got {other:?}"),
        }
    }

    #[test]
    fn invalid_event_message_reads_for_numeric_fields() {
        let mut event = update_event("blog-1", "Blog", serde_json::json!({}));
        event.version = 0;

        let err = event.validate().unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("invalid event {}: version is missing or zero", event.id)
        );
    }

    #[test]
    fn event_round_trips_through_json() {
        let event = update_event("blog-1", "Blog", serde_json::json!({"title": "new"}));
        let json = serde_json::to_string(&event).unwrap();
        let back: Event = serde_json::from_str(&json).unwrap();
        assert_eq!(event, back);
    }
}
