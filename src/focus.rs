//! Refresh callbacks for when the page comes back to the foreground.
//!
//! The host reports raw focus and visibility signals. `Blur` or `Hidden` sends
//! the page to the background; the first `Focus` or `Visible` after that
//! brings it back and fires the callbacks. Either signal alone is a regain, so
//! a host that only reports visibility still refreshes, and a tab restore that
//! reports both `Visible` and `Focus` refreshes once, not twice.

use std::sync::{Arc, Mutex, PoisonError};

use crate::bus::{invoke_isolated, HandlerPanic, HandlerRegistry, SubscriptionId};

pub type FocusHandler = Arc<dyn Fn() + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusSignal {
    Focus,
    Blur,
    Visible,
    Hidden,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForegroundState {
    Foreground,
    Background,
}

#[derive(Debug, Clone, Default)]
pub struct FocusDispatch {
    /// The signal completed a return to the foreground.
    pub regained: bool,
    pub delivered: usize,
    pub panicked: Vec<HandlerPanic>,
}

pub struct FocusTracker {
    state: Mutex<ForegroundState>,
    handlers: HandlerRegistry<FocusHandler>,
}

impl FocusTracker {
    /// Starts in the foreground; registering never fires a callback.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ForegroundState::Foreground),
            handlers: HandlerRegistry::new(),
        }
    }

    pub fn register(&self, handler: FocusHandler) -> SubscriptionId {
        self.handlers.insert(handler)
    }

    pub fn unregister(&self, id: SubscriptionId) -> bool {
        self.handlers.remove(id)
    }

    pub fn in_foreground(&self) -> bool {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state == ForegroundState::Foreground
    }

    pub fn signal(&self, signal: FocusSignal) -> FocusDispatch {
        let regained = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            let previous = *state;
            *state = match signal {
                FocusSignal::Focus | FocusSignal::Visible => ForegroundState::Foreground,
                FocusSignal::Blur | FocusSignal::Hidden => ForegroundState::Background,
            };
            previous == ForegroundState::Background && *state == ForegroundState::Foreground
        };

        if !regained {
            return FocusDispatch::default();
        }

        tracing::debug!("page regained foreground on {signal:?}");
        let mut dispatch = FocusDispatch {
            regained: true,
            ..FocusDispatch::default()
        };
        for (id, handler) in self.handlers.snapshot() {
            match invoke_isolated(|| handler()) {
                Ok(()) => dispatch.delivered += 1,
                Err(message) => {
                    tracing::error!("focus refresh {id} panicked: {message}");
                    dispatch.panicked.push(HandlerPanic {
                        subscription: id,
                        message,
                    });
                }
            }
        }
        dispatch
    }
}

impl Default for FocusTracker {
    fn default() -> Self {
        Self::new()
    }
}
