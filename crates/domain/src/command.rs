//! Commands: ephemeral requests to change state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attribution and targeting metadata carried by a command.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandMetadata {
    /// The entity the command targets.
    pub entity_id: String,

    /// The entity kind, used for handler resolution.
    pub entity_type: String,

    /// Sequence number the caller expects the entity's stream to be at.
    ///
    /// Zero means no expectation; a positive value is validated against
    /// the committed head before any event is recorded.
    pub sequence_no: i64,

    /// Schema version of the payload.
    pub version: u32,

    /// The user issuing the command.
    pub user_id: String,

    /// The account the command is issued under.
    pub account_id: String,

    /// When the command was issued.
    pub created: DateTime<Utc>,
}

/// A request to change state.
///
/// Commands are never persisted; only the events they cause are.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    /// The kind of change requested ("create", "update", "delete", or
    /// domain-specific).
    pub command_type: String,

    /// The requested change data.
    pub payload: serde_json::Value,

    /// Attribution and targeting metadata.
    pub metadata: CommandMetadata,
}

impl Command {
    /// Creates a command of an arbitrary type.
    pub fn new(
        command_type: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            command_type: command_type.into(),
            payload,
            metadata: CommandMetadata {
                entity_id: entity_id.into(),
                entity_type: entity_type.into(),
                version: 1,
                created: Utc::now(),
                ..CommandMetadata::default()
            },
        }
    }

    /// Creates a "create" command for a new entity.
    pub fn create(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::new("create", entity_type, entity_id, payload)
    }

    /// Creates an "update" command carrying changed fields.
    pub fn update(
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self::new("update", entity_type, entity_id, payload)
    }

    /// Creates a "delete" command for an entity.
    pub fn delete(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self::new("delete", entity_type, entity_id, serde_json::Value::Null)
    }

    /// Sets the expected sequence number for optimistic concurrency,
    /// e.g. parsed from an `entityID.sequenceNo` ETag-like token.
    pub fn expect_sequence(mut self, sequence_no: i64) -> Self {
        self.metadata.sequence_no = sequence_no;
        self
    }

    /// Sets the issuing user.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.metadata.user_id = user_id.into();
        self
    }

    /// Sets the issuing account.
    pub fn with_account(mut self, account_id: impl Into<String>) -> Self {
        self.metadata.account_id = account_id.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_command_carries_target_and_payload() {
        let command = Command::create("Blog", "blog-1", serde_json::json!({"title": "hi"}))
            .with_user("u-1")
            .expect_sequence(3);

        assert_eq!(command.command_type, "create");
        assert_eq!(command.metadata.entity_type, "Blog");
        assert_eq!(command.metadata.entity_id, "blog-1");
        assert_eq!(command.metadata.user_id, "u-1");
        assert_eq!(command.metadata.sequence_no, 3);
        assert_eq!(command.payload, serde_json::json!({"title": "hi"}));
    }

    #[test]
    fn delete_command_has_null_payload() {
        let command = Command::delete("Blog", "blog-1");
        assert_eq!(command.command_type, "delete");
        assert!(command.payload.is_null());
    }
}
