//! Command dispatch: routing, concurrent fan-out, failure isolation.

use std::collections::HashMap;
use std::sync::Arc;

use common::RequestContext;
use event_store::EventStore;
use futures_core::future::BoxFuture;
use tokio::sync::Mutex;

use crate::command::Command;
use crate::error::DomainError;
use crate::schema::EntitySchema;

/// The wildcard command type: its handlers see every dispatched command.
pub const WILDCARD: &str = "*";

/// Explicit collaborator container passed into every dispatch call.
///
/// Replaces any framework-wide singleton: handlers receive the store
/// and schema registry from here, never from ambient state.
pub struct Container {
    event_store: Arc<dyn EventStore>,
    schemas: HashMap<String, Arc<dyn EntitySchema>>,
}

impl Container {
    /// Creates a container around an event store.
    pub fn new(event_store: Arc<dyn EventStore>) -> Self {
        Self {
            event_store,
            schemas: HashMap::new(),
        }
    }

    /// Registers the schema for an entity type.
    pub fn register_schema(&mut self, schema: Arc<dyn EntitySchema>) {
        self.schemas
            .insert(schema.entity_type().to_string(), schema);
    }

    /// The event store handlers persist through.
    pub fn event_store(&self) -> &Arc<dyn EventStore> {
        &self.event_store
    }

    /// The schema for an entity type, if one is registered.
    pub fn schema_for(&self, entity_type: &str) -> Option<&Arc<dyn EntitySchema>> {
        self.schemas.get(entity_type)
    }
}

/// A registered command handler.
///
/// Handlers signal failure by returning an error; the dispatcher still
/// converts unexpected panics into [`DomainError::HandlerPanic`] so one
/// faulty handler cannot take down its siblings.
pub type CommandHandler = Arc<
    dyn Fn(Arc<Container>, RequestContext, Command) -> BoxFuture<'static, Result<(), DomainError>>
        + Send
        + Sync,
>;

/// Wraps an async closure as a registrable [`CommandHandler`].
pub fn handler_fn<F, Fut>(f: F) -> CommandHandler
where
    F: Fn(Arc<Container>, RequestContext, Command) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), DomainError>> + Send + 'static,
{
    Arc::new(move |container, ctx, command| Box::pin(f(container, ctx, command)))
}

type HandlerKey = (String, String);

/// Routes commands to handlers registered by `(type, entity_type)`.
///
/// Resolution is a union, not a pure fallback: the exact pair first,
/// then type-only handlers when no exact match exists, and wildcard
/// handlers always. All resolved handlers run concurrently and the
/// call joins on every one of them. One async mutex guards both the
/// registration table and the fan-out, so only one dispatch executes
/// at a time per dispatcher instance.
#[derive(Default)]
pub struct CommandDispatcher {
    handlers: Mutex<HashMap<HandlerKey, Vec<CommandHandler>>>,
}

impl CommandDispatcher {
    /// Creates a dispatcher with no registered handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a `(command type, entity type)` pair.
    ///
    /// An empty entity type registers the handler for that command type
    /// on any entity; [`WILDCARD`] as the command type registers it for
    /// every command.
    pub async fn add_subscriber(
        &self,
        command_type: impl Into<String>,
        entity_type: impl Into<String>,
        handler: CommandHandler,
    ) {
        let key = (command_type.into(), entity_type.into());
        self.handlers
            .lock()
            .await
            .entry(key)
            .or_default()
            .push(handler);
    }

    /// Dispatches one command to every matched handler concurrently.
    ///
    /// Returns each handler's result in no particular order. A command
    /// matching zero handlers yields an empty list.
    #[tracing::instrument(skip(self, container, ctx, command), fields(
        command_type = %command.command_type,
        entity_type = %command.metadata.entity_type,
    ))]
    pub async fn dispatch(
        &self,
        container: Arc<Container>,
        ctx: &RequestContext,
        command: &Command,
    ) -> Result<Vec<Result<(), DomainError>>, DomainError> {
        if ctx.is_cancelled() {
            return Err(DomainError::Cancelled);
        }

        // Held across the fan-out: dispatch calls are serialized.
        let registry = self.handlers.lock().await;
        let resolved = Self::resolve(&registry, command);
        metrics::counter!("command_dispatcher_commands_dispatched").increment(1);

        let mut handles = Vec::with_capacity(resolved.len());
        for handler in resolved {
            let container = Arc::clone(&container);
            let ctx = ctx.clone();
            let command = command.clone();
            handles.push(tokio::spawn(async move {
                handler(container, ctx, command).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let result = match handle.await {
                Ok(result) => result,
                Err(join_err) => {
                    tracing::error!(error = %join_err, "command handler panicked");
                    Err(DomainError::HandlerPanic {
                        message: join_err.to_string(),
                    })
                }
            };
            results.push(result);
        }

        Ok(results)
    }

    fn resolve(
        registry: &HashMap<HandlerKey, Vec<CommandHandler>>,
        command: &Command,
    ) -> Vec<CommandHandler> {
        let command_type = command.command_type.as_str();
        let entity_type = command.metadata.entity_type.as_str();

        let mut resolved: Vec<CommandHandler> = Vec::new();

        // Tier 1: the exact pair.
        if let Some(exact) = registry.get(&(command_type.to_string(), entity_type.to_string())) {
            resolved.extend(exact.iter().cloned());
        }

        // Tier 2: type-only handlers, but only when tier 1 was empty.
        if resolved.is_empty()
            && !entity_type.is_empty()
            && let Some(general) = registry.get(&(command_type.to_string(), String::new()))
        {
            resolved.extend(general.iter().cloned());
        }

        // Tier 3: wildcard handlers always join the set.
        if command_type != WILDCARD
            && let Some(wildcard) = registry.get(&(WILDCARD.to_string(), String::new()))
        {
            resolved.extend(wildcard.iter().cloned());
        }

        resolved
    }
}
