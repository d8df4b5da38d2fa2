//! Opaque schema contract supplied by the schema-layer collaborator.

use std::collections::HashSet;

/// What the core needs to know about an entity type's shape.
///
/// The schema layer owns field types, formats, and storage mapping; the
/// core only asks which fields are required and whether a required
/// field may hold an explicit null.
pub trait EntitySchema: Send + Sync {
    /// The entity kind this schema describes.
    fn entity_type(&self) -> &str;

    /// Fields that must be present on a valid entity.
    fn required_fields(&self) -> &[String];

    /// Whether a field accepts an explicit null value.
    fn is_nullable(&self, field: &str) -> bool;
}

/// Plain-data schema implementation for wiring and tests.
#[derive(Debug, Clone, Default)]
pub struct FieldSchema {
    entity_type: String,
    required: Vec<String>,
    nullable: HashSet<String>,
}

impl FieldSchema {
    /// Creates an empty schema for an entity type.
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            required: Vec::new(),
            nullable: HashSet::new(),
        }
    }

    /// Marks a field as required.
    pub fn require(mut self, field: impl Into<String>) -> Self {
        self.required.push(field.into());
        self
    }

    /// Marks a field as accepting explicit nulls.
    pub fn nullable(mut self, field: impl Into<String>) -> Self {
        self.nullable.insert(field.into());
        self
    }
}

impl EntitySchema for FieldSchema {
    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn required_fields(&self) -> &[String] {
        &self.required
    }

    fn is_nullable(&self, field: &str) -> bool {
        self.nullable.contains(field)
    }
}
