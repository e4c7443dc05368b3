use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock};

use serde::Serialize;

/// Handle returned by every registration; pass it back to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SubscriptionId(u64);

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// A handler that panicked while being invoked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerPanic {
    pub subscription: SubscriptionId,
    pub message: String,
}

/// Ordered list of registered handlers.
///
/// Callers take a [`snapshot`](Self::snapshot) and invoke handlers with no
/// lock held, so a handler may register, unregister or emit while running.
pub(crate) struct HandlerRegistry<T: Clone> {
    next_id: AtomicU64,
    entries: RwLock<Vec<(SubscriptionId, T)>>,
}

impl<T: Clone> HandlerRegistry<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            entries: RwLock::new(Vec::new()),
        }
    }

    pub fn insert(&self, entry: T) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, entry));
        id
    }

    pub fn remove(&self, id: SubscriptionId) -> bool {
        let mut guard = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let before = guard.len();
        guard.retain(|(entry_id, _)| *entry_id != id);
        guard.len() != before
    }

    pub fn snapshot(&self) -> Vec<(SubscriptionId, T)> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Run `f`, converting a panic into its message.
pub(crate) fn invoke_isolated(f: impl FnOnce()) -> Result<(), String> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| panic_message(payload.as_ref()))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "handler panicked".to_string()
}
