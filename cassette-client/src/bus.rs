//! Subscriber registry and synchronous event delivery.
//!
//! Handlers are grouped by [`Topic`]. For each event, delivery runs
//! exact-kind handlers first, then wildcard handlers, then (for `CUSTOM`
//! events) handlers registered for that custom name. Each group runs in
//! registration order.
//!
//! The handler list is copied out of the lock before any handler runs, so a
//! handler may subscribe, unsubscribe, or call back into the client. Changes
//! made during a delivery take effect from the next event.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cassette_protocol::{AguiEvent, EventKind};
use parking_lot::RwLock;

use crate::diagnostic::Diagnostic;

/// Receives dispatched events.
///
/// # Example
/// ```
/// use cassette_client::{AguiEvent, EventHandler};
///
/// struct Printer;
///
/// impl EventHandler for Printer {
///     fn on_event(&self, event: &AguiEvent) {
///         if let AguiEvent::TextMessageContent { delta, .. } = event {
///             print!("{}", delta);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    fn on_event(&self, event: &AguiEvent);
}

/// Blanket implementation for closures
impl<F> EventHandler for F
where
    F: Fn(&AguiEvent) + Send + Sync,
{
    fn on_event(&self, event: &AguiEvent) {
        self(event)
    }
}

/// Receives [`Diagnostic`]s.
pub trait DiagnosticHandler: Send + Sync {
    fn on_diagnostic(&self, diagnostic: &Diagnostic);
}

impl<F> DiagnosticHandler for F
where
    F: Fn(&Diagnostic) + Send + Sync,
{
    fn on_diagnostic(&self, diagnostic: &Diagnostic) {
        self(diagnostic)
    }
}

/// Handle returned by every subscribe call, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// What a subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Topic {
    /// One event kind.
    Kind(EventKind),
    /// Every event.
    All,
    /// `CUSTOM` events with this name.
    Custom(String),
}

struct Subscription {
    id: SubscriptionId,
    topic: Topic,
    handler: Arc<dyn EventHandler>,
}

struct DiagnosticSubscription {
    id: SubscriptionId,
    handler: Arc<dyn DiagnosticHandler>,
}

/// Registry of event and diagnostic handlers.
#[derive(Default)]
pub struct EventBus {
    subscriptions: RwLock<Vec<Subscription>>,
    diagnostic_handlers: RwLock<Vec<DiagnosticSubscription>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscriptions.read().len())
            .field("diagnostic_handlers", &self.diagnostic_handlers.read().len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn allocate_id(&self) -> SubscriptionId {
        SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a handler for a topic.
    pub fn subscribe_topic(
        &self,
        topic: Topic,
        handler: impl EventHandler + 'static,
    ) -> SubscriptionId {
        let id = self.allocate_id();
        self.subscriptions.write().push(Subscription {
            id,
            topic,
            handler: Arc::new(handler),
        });
        id
    }

    /// Register a handler for a single event kind.
    pub fn subscribe(&self, kind: EventKind, handler: impl EventHandler + 'static) -> SubscriptionId {
        self.subscribe_topic(Topic::Kind(kind), handler)
    }

    /// Register a handler for every event.
    pub fn subscribe_all(&self, handler: impl EventHandler + 'static) -> SubscriptionId {
        self.subscribe_topic(Topic::All, handler)
    }

    /// Register a handler for `CUSTOM` events with the given name.
    pub fn subscribe_custom(
        &self,
        name: impl Into<String>,
        handler: impl EventHandler + 'static,
    ) -> SubscriptionId {
        self.subscribe_topic(Topic::Custom(name.into()), handler)
    }

    /// Register a handler for diagnostics.
    pub fn on_diagnostic(&self, handler: impl DiagnosticHandler + 'static) -> SubscriptionId {
        let id = self.allocate_id();
        self.diagnostic_handlers.write().push(DiagnosticSubscription {
            id,
            handler: Arc::new(handler),
        });
        id
    }

    /// Remove one registration. Returns false if the id was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        if subscriptions.len() != before {
            return true;
        }
        drop(subscriptions);

        let mut diagnostic_handlers = self.diagnostic_handlers.write();
        let before = diagnostic_handlers.len();
        diagnostic_handlers.retain(|s| s.id != id);
        diagnostic_handlers.len() != before
    }

    /// Remove every event and diagnostic handler.
    pub fn unsubscribe_all(&self) {
        self.subscriptions.write().clear();
        self.diagnostic_handlers.write().clear();
    }

    /// Number of registered event handlers.
    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.read().is_empty()
    }

    /// Deliver an event to every matching handler.
    pub fn dispatch(&self, event: &AguiEvent) {
        for handler in self.matching(event) {
            handler.on_event(event);
        }
    }

    /// Deliver a diagnostic to every diagnostic handler.
    pub fn report(&self, diagnostic: &Diagnostic) {
        let handlers: Vec<Arc<dyn DiagnosticHandler>> = self
            .diagnostic_handlers
            .read()
            .iter()
            .map(|s| s.handler.clone())
            .collect();

        for handler in handlers {
            handler.on_diagnostic(diagnostic);
        }
    }

    fn matching(&self, event: &AguiEvent) -> Vec<Arc<dyn EventHandler>> {
        let kind = event.kind();
        let custom_name = event.custom_name();
        let subscriptions = self.subscriptions.read();

        let exact = subscriptions
            .iter()
            .filter(|s| s.topic == Topic::Kind(kind));
        let wildcard = subscriptions.iter().filter(|s| s.topic == Topic::All);
        let named = subscriptions.iter().filter(|s| match (&s.topic, custom_name) {
            (Topic::Custom(topic_name), Some(name)) => topic_name == name,
            _ => false,
        });

        exact
            .chain(wildcard)
            .chain(named)
            .map(|s| s.handler.clone())
            .collect()
    }
}

#[cfg(test)]
#[path = "bus_tests.rs"]
mod tests;
