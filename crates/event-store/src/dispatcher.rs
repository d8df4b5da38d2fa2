//! Publish/subscribe fan-out of persisted events to projections.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::EventStoreError;
use crate::event::Event;

/// A projection update function fed by the event dispatcher.
///
/// Subscribers must tolerate being invoked concurrently with each other;
/// no execution order is guaranteed within one event's fan-out.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Returns the subscriber's name, used in error reports.
    fn name(&self) -> &str;

    /// Applies a single persisted event to the subscriber's read model.
    async fn handle(&self, event: &Event) -> std::result::Result<(), EventStoreError>;
}

/// Broadcasts each persisted event to all registered subscribers.
///
/// The dispatcher is invoked once per event, after that event's batch
/// has committed. Subscribers run concurrently; the dispatch call joins
/// on all of them before returning. Errors are collected, never raised:
/// a failing or panicking subscriber cannot affect its siblings or the
/// commit that triggered the fan-out.
#[derive(Default)]
pub struct EventDispatcher {
    subscribers: RwLock<Vec<Arc<dyn EventSubscriber>>>,
}

impl EventDispatcher {
    /// Creates a dispatcher with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a projection update function.
    pub async fn add_subscriber(&self, subscriber: Arc<dyn EventSubscriber>) {
        self.subscribers.write().await.push(subscriber);
    }

    /// Returns the number of registered subscribers.
    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Delivers one event to every subscriber concurrently.
    ///
    /// Returns the list of subscriber errors; an empty list means every
    /// subscriber applied the event cleanly.
    pub async fn dispatch(&self, event: &Event) -> Vec<EventStoreError> {
        let subscribers: Vec<Arc<dyn EventSubscriber>> =
            self.subscribers.read().await.iter().cloned().collect();

        let mut handles = Vec::with_capacity(subscribers.len());
        for subscriber in subscribers {
            let event = event.clone();
            let name = subscriber.name().to_string();
            let handle = tokio::spawn(async move { subscriber.handle(&event).await });
            handles.push((name, handle));
        }

        let mut errors = Vec::new();
        for (name, handle) in handles {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(subscriber = %name, error = %e, "subscriber failed");
                    errors.push(e);
                }
                Err(join_err) if join_err.is_panic() => {
                    tracing::error!(subscriber = %name, "subscriber panicked");
                    errors.push(EventStoreError::SubscriberPanic { subscriber: name });
                }
                Err(join_err) => {
                    errors.push(EventStoreError::Subscriber {
                        subscriber: name,
                        message: join_err.to_string(),
                    });
                }
            }
        }

        errors
    }
}
