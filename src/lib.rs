//! Data-freshness sync layer for the campus admin panel.
//!
//! Page controllers (notices, FAQs, users, scraper, logs, dashboard) fetch and
//! render on their own; this crate keeps them consistent without them knowing
//! about each other. It handles:
//! - Request interception: a successful same-origin mutation schedules one
//!   coalesced full reload
//! - Scoped change events after successful `post` calls
//! - Refresh on focus regain and fixed-interval polling
//!
//! # Architecture
//!
//! - `client`: `SyncClient`, the interface page controllers call
//! - `transport`: request primitive, reqwest transport, interception observer
//! - `reload`: the reload gate (`Idle -> ReloadScheduled`)
//! - `bus`: scope-filtered change notification registry
//! - `focus`: foreground-regain tracking
//! - `poller`: per-page polling timers
//! - `outcome`: success/failure decoding of response payloads
//! - `config`: origin, exempt paths and timings

pub mod bus;
pub mod client;
pub mod config;
pub mod error;
pub mod focus;
pub mod outcome;
pub mod poller;
pub mod reload;
pub mod transport;

pub use bus::{ChangeEvent, Scope, SubscriptionId};
pub use client::{
    global, install_global, FailureHook, PageWatch, PostOptions, SyncClient, SyncFailure,
};
pub use config::SyncConfig;
pub use error::{SyncError, TransportError};
pub use focus::FocusSignal;
pub use outcome::{FailureReason, Outcome};
pub use reload::{ChannelReloadSink, ReloadRequest, ReloadSink, ReloadState};

/// Install the fmt subscriber, filtered by `RUST_LOG`.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("campus_sync=debug,info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
