//! Change notification bus.
//!
//! Page controllers learn about mutations through this bus instead of
//! knowing about each other:
//! - `ChangeBus`: scope-filtered handler registry, dispatched synchronously
//! - A broadcast stream of every event for async consumers
//! - `HandlerRegistry`: shared by the bus and the focus tracker

mod event_bus;
mod event_types;
mod registry;

pub use event_bus::{ChangeBus, ChangeHandler, DispatchReport};
pub use event_types::{
    ChangeEvent, Scope, SCOPE_ALL, SCOPE_CHATBOT, SCOPE_DASHBOARD, SCOPE_FAQS, SCOPE_LOGS,
    SCOPE_NOTICES, SCOPE_SCRAPER, SCOPE_USERS,
};
pub use registry::{HandlerPanic, SubscriptionId};

pub(crate) use registry::{invoke_isolated, HandlerRegistry};
