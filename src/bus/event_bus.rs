use std::sync::Arc;

use tokio::sync::broadcast;

use super::event_types::{ChangeEvent, Scope};
use super::registry::{invoke_isolated, HandlerPanic, HandlerRegistry, SubscriptionId};

const BUS_CAPACITY: usize = 256;

pub type ChangeHandler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

/// Result of one dispatch cycle.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    pub event: ChangeEvent,
    pub delivered: usize,
    pub panicked: Vec<HandlerPanic>,
}

pub struct ChangeBus {
    handlers: HandlerRegistry<(Scope, ChangeHandler)>,
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            handlers: HandlerRegistry::new(),
            tx,
        }
    }

    /// Register `handler` for events whose scope matches `scope`.
    pub fn on_change(&self, scope: impl Into<Scope>, handler: ChangeHandler) -> SubscriptionId {
        let scope = scope.into();
        let id = self.handlers.insert((scope.clone(), handler));
        tracing::debug!("change handler {id} registered for scope {scope}");
        id
    }

    pub fn off_change(&self, id: SubscriptionId) -> bool {
        self.handlers.remove(id)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }

    /// Build an event and dispatch it synchronously to every matching handler.
    pub fn emit(&self, scope: impl Into<Scope>, detail: serde_json::Value) -> DispatchReport {
        self.dispatch(ChangeEvent::new(scope.into(), detail))
    }

    /// Dispatch a pre-built event. A panicking handler is recorded and the
    /// remaining handlers still run.
    pub fn dispatch(&self, event: ChangeEvent) -> DispatchReport {
        let mut delivered = 0;
        let mut panicked = Vec::new();

        for (id, (scope, handler)) in self.handlers.snapshot() {
            if !scope.matches(&event.scope) {
                continue;
            }
            match invoke_isolated(|| handler(&event)) {
                Ok(()) => delivered += 1,
                Err(message) => {
                    tracing::error!(
                        "change handler {id} panicked on scope {}: {message}",
                        event.scope
                    );
                    panicked.push(HandlerPanic {
                        subscription: id,
                        message,
                    });
                }
            }
        }

        if self.tx.send(event.clone()).is_err() {
            tracing::trace!("no stream subscribers for change event {}", event.id);
        }

        tracing::debug!(
            "change event {} on scope {} delivered to {delivered} handler(s)",
            event.id,
            event.scope
        );

        DispatchReport {
            event,
            delivered,
            panicked,
        }
    }

    /// Receive every future event, regardless of scope.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}
