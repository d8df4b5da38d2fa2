//! Default handlers for the built-in create/update/delete commands.
//!
//! These cover schema-driven entities end to end: load or create the
//! entity, gate the command on schema validity and the caller's
//! optimistic sequence expectation, record the event, persist.


use common::RequestContext;
use event_store::{create_event, delete_event, update_event};

use crate::command::Command;
use crate::dispatcher::{CommandDispatcher, CommandHandler, Container, handler_fn};
use crate::entity::Entity;
use crate::error::DomainError;

/// Registers the built-in handlers for any entity type.
pub async fn register_defaults(dispatcher: &CommandDispatcher) {
    dispatcher.add_subscriber("create", "", create_handler()).await;
    dispatcher.add_subscriber("update", "", update_handler()).await;
    dispatcher.add_subscriber("delete", "", delete_handler()).await;
}

/// Handles a "create" command: a fresh entity established from the
/// command payload.
pub fn create_handler() -> CommandHandler {
    handler_fn(|container, ctx, command| async move {
        let entity_type = command.metadata.entity_type.clone();
        let entity_id = command.metadata.entity_id.clone();

        let mut entity = Entity::new(&entity_type, &entity_id);
        entity.record(create_event(
            &entity_id,
            &entity_type,
            command.payload.clone(),
        ));

        gate_on_schema(&container, &entity)?;
        persist(&container, &ctx, &command, &mut entity).await
    })
}

/// Handles an "update" command: merge the payload onto the entity's
/// current state.
pub fn update_handler() -> CommandHandler {
    handler_fn(|container, ctx, command| async move {
        let mut entity = load_existing(&container, &command).await?;
        check_sequence(&command, &entity)?;

        entity.record(update_event(
            &command.metadata.entity_id,
            &command.metadata.entity_type,
            command.payload.clone(),
        ));

        gate_on_schema(&container, &entity)?;
        persist(&container, &ctx, &command, &mut entity).await
    })
}

/// Handles a "delete" command: record the removal in the log.
pub fn delete_handler() -> CommandHandler {
    handler_fn(|container, ctx, command| async move {
        let mut entity = load_existing(&container, &command).await?;
        check_sequence(&command, &entity)?;

        entity.record(delete_event(
            &command.metadata.entity_id,
            &command.metadata.entity_type,
        ));

        persist(&container, &ctx, &command, &mut entity).await
    })
}

async fn load_existing(container: &Container, command: &Command) -> Result<Entity, DomainError> {
    let events = container
        .event_store()
        .get_by_aggregate(&command.metadata.entity_id)
        .await?;

    if events.is_empty() {
        return Err(DomainError::EntityNotFound {
            entity_type: command.metadata.entity_type.clone(),
            entity_id: command.metadata.entity_id.clone(),
        });
    }

    Ok(Entity::from_events(&command.metadata.entity_type, &events))
}

/// Validates the caller's expected sequence before anything is recorded.
fn check_sequence(command: &Command, entity: &Entity) -> Result<(), DomainError> {
    let expected = command.metadata.sequence_no;
    if expected > 0 && expected != entity.sequence_no() {
        return Err(DomainError::StaleSequence {
            entity_id: command.metadata.entity_id.clone(),
            expected,
            actual: entity.sequence_no(),
        });
    }
    Ok(())
}

/// Rejects the command when the resulting entity violates its schema.
fn gate_on_schema(container: &Container, entity: &Entity) -> Result<(), DomainError> {
    if let Some(schema) = container.schema_for(entity.entity_type())
        && let Some(error) = entity.validity_errors(schema.as_ref()).into_iter().next()
    {
        return Err(error);
    }
    Ok(())
}

async fn persist(
    container: &Container,
    ctx: &RequestContext,
    command: &Command,
    entity: &mut Entity,
) -> Result<(), DomainError> {
    let ctx = if ctx.user_id.is_empty() && !command.metadata.user_id.is_empty() {
        ctx.clone().with_user(command.metadata.user_id.clone())
    } else {
        ctx.clone()
    };

    container.event_store().persist(&ctx, entity).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::schema::FieldSchema;
    use event_store::{EventStore, InMemoryEventStore};

    async fn wired() -> (CommandDispatcher, Arc<Container>, Arc<InMemoryEventStore>) {
        let store = Arc::new(InMemoryEventStore::new());
        let mut container = Container::new(store.clone());
        container.register_schema(Arc::new(FieldSchema::new("Blog").require("title")));

        let dispatcher = CommandDispatcher::new();
        register_defaults(&dispatcher).await;

        (dispatcher, Arc::new(container), store)
    }

    #[tokio::test]
    async fn create_then_update_builds_the_stream() {
        let (dispatcher, container, store) = wired().await;
        let ctx = RequestContext::new().with_user("u-1");

        let create = Command::create("Blog", "blog-1", serde_json::json!({"title": "first"}));
        let results = dispatcher
            .dispatch(Arc::clone(&container), &ctx, &create)
            .await
            .unwrap();
        assert!(results.iter().all(|r| r.is_ok()));

        let update = Command::update("Blog", "blog-1", serde_json::json!({"title": "second"}));
        let results = dispatcher
            .dispatch(Arc::clone(&container), &ctx, &update)
            .await
            .unwrap();
        assert!(results.iter().all(|r| r.is_ok()));

        let events = store.get_by_aggregate("blog-1").await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].event_type, "create");
        assert_eq!(events[0].meta.sequence_no, 1);
        assert_eq!(events[1].event_type, "update");
        assert_eq!(events[1].meta.sequence_no, 2);
    }

    #[tokio::test]
    async fn invalid_create_is_rejected_by_schema_gate() {
        let (dispatcher, container, store) = wired().await;
        let ctx = RequestContext::new();

        let create = Command::create("Blog", "blog-1", serde_json::json!({"url": "x"}));
        let results = dispatcher
            .dispatch(Arc::clone(&container), &ctx, &create)
            .await
            .unwrap();

        assert!(matches!(
            results[0],
            Err(DomainError::MissingRequiredField { ref field, .. }) if field == "title"
        ));
        assert_eq!(store.event_count().await, 0);
    }

    #[tokio::test]
    async fn update_of_missing_entity_is_not_found() {
        let (dispatcher, container, _store) = wired().await;
        let ctx = RequestContext::new();

        let update = Command::update("Blog", "ghost", serde_json::json!({"title": "x"}));
        let results = dispatcher
            .dispatch(Arc::clone(&container), &ctx, &update)
            .await
            .unwrap();

        assert!(matches!(
            results[0],
            Err(DomainError::EntityNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn stale_sequence_rejects_update_before_recording() {
        let (dispatcher, container, store) = wired().await;
        let ctx = RequestContext::new();

        let create = Command::create("Blog", "blog-1", serde_json::json!({"title": "first"}));
        dispatcher
            .dispatch(Arc::clone(&container), &ctx, &create)
            .await
            .unwrap();

        let update = Command::update("Blog", "blog-1", serde_json::json!({"title": "x"}))
            .expect_sequence(5);
        let results = dispatcher
            .dispatch(Arc::clone(&container), &ctx, &update)
            .await
            .unwrap();

        assert!(matches!(
            results[0],
            Err(DomainError::StaleSequence {
                expected: 5,
                actual: 1,
                ..
            })
        ));
        assert_eq!(store.event_count().await, 1);
    }

    #[tokio::test]
    async fn delete_appends_a_delete_event() {
        let (dispatcher, container, store) = wired().await;
        let ctx = RequestContext::new();

        let create = Command::create("Blog", "blog-1", serde_json::json!({"title": "first"}));
        dispatcher
            .dispatch(Arc::clone(&container), &ctx, &create)
            .await
            .unwrap();

        let delete = Command::delete("Blog", "blog-1").expect_sequence(1);
        let results = dispatcher
            .dispatch(Arc::clone(&container), &ctx, &delete)
            .await
            .unwrap();
        assert!(results.iter().all(|r| r.is_ok()));

        let events = store.get_by_aggregate("blog-1").await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].event_type, "delete");
        assert_eq!(events[1].meta.sequence_no, 2);
    }
}
