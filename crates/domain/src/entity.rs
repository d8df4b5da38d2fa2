//! Schema-driven entity state, rebuilt by applying events in order.

use event_store::{AggregateSource, EVENT_TYPE_CREATE, EVENT_TYPE_UPDATE, Event};
use serde_json::{Map, Value};

use crate::aggregate::AggregateRoot;
use crate::error::DomainError;
use crate::schema::EntitySchema;

/// An entity whose fields are populated from JSON-like event payloads.
///
/// The shape of the fields comes from the schema layer; the core treats
/// them as an opaque property map. State is rebuilt by replaying the
/// entity's event history: a "create" payload establishes the fields
/// wholesale, an "update" payload merges onto them, and unknown event
/// types advance the stream position without touching state.
#[derive(Debug, Clone)]
pub struct Entity {
    root: AggregateRoot,
    entity_id: String,
    entity_type: String,
    properties: Map<String, Value>,
}

impl Entity {
    /// Creates an empty entity that is its own aggregate root.
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        let entity_id = entity_id.into();
        Self {
            root: AggregateRoot::new(entity_id.clone()),
            entity_id,
            entity_type: entity_type.into(),
            properties: Map::new(),
        }
    }

    /// Hydrates an entity by replaying its prior event history in
    /// sequence order.
    pub fn from_events(entity_type: impl Into<String>, events: &[Event]) -> Self {
        let entity_id = events
            .first()
            .map(|e| e.meta.entity_id.clone())
            .unwrap_or_default();
        let mut entity = Self::new(entity_type, entity_id);
        entity.apply_events(events);
        entity
    }

    /// The entity's identifier.
    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// The entity kind.
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// The latest committed-or-recorded sequence number.
    pub fn sequence_no(&self) -> i64 {
        self.root.sequence_no()
    }

    /// The current value of a field, if set.
    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    /// All current field values.
    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// Records a new uncommitted event and applies it to state.
    pub fn record(&mut self, event: Event) {
        let stamped = self.root.new_change(event);
        self.apply(&stamped);
    }

    /// Applies one event to the entity's state.
    ///
    /// Never fails: events are committed facts. Unknown event types
    /// only advance the stream position.
    pub fn apply(&mut self, event: &Event) {
        match event.event_type.as_str() {
            EVENT_TYPE_CREATE => {
                if let Value::Object(fields) = &event.payload {
                    self.properties = fields.clone();
                }
                if self.entity_id.is_empty() {
                    self.entity_id = event.meta.entity_id.clone();
                }
            }
            EVENT_TYPE_UPDATE => {
                if let Value::Object(fields) = &event.payload {
                    for (key, value) in fields {
                        self.properties.insert(key.clone(), value.clone());
                    }
                }
            }
            _ => {}
        }
        self.root.observe_sequence(event.meta.sequence_no);
    }

    /// Applies a sequence of events in order.
    pub fn apply_events(&mut self, events: &[Event]) {
        for event in events {
            self.apply(event);
        }
    }

    /// Checks the entity against its schema's required fields.
    ///
    /// Returns one structured error per violation; an empty list means
    /// the entity is valid. This never prevents an event from being
    /// recorded. Handlers gate commands on it before persisting.
    pub fn validity_errors(&self, schema: &dyn EntitySchema) -> Vec<DomainError> {
        let mut errors = Vec::new();
        for field in schema.required_fields() {
            let violation = match self.properties.get(field) {
                None => true,
                Some(Value::Null) => !schema.is_nullable(field),
                Some(_) => false,
            };
            if violation {
                errors.push(DomainError::MissingRequiredField {
                    entity_type: self.entity_type.clone(),
                    entity_id: self.entity_id.clone(),
                    field: field.clone(),
                });
            }
        }
        errors
    }

    /// Returns whether the entity satisfies its schema.
    pub fn is_valid(&self, schema: &dyn EntitySchema) -> bool {
        self.validity_errors(schema).is_empty()
    }
}

impl AggregateSource for Entity {
    fn uncommitted_events(&self) -> &[Event] {
        self.root.uncommitted_events()
    }

    fn clear_uncommitted(&mut self) {
        self.root.clear_uncommitted();
    }
}
