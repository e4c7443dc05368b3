//! Coalesced full reload after a successful mutation.
//!
//! The gate is a two-state machine, `Idle -> ReloadScheduled`. The first
//! qualifying mutation wins a single compare-and-swap and schedules the
//! reload; every later one is dropped until [`ReloadGate::reset`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadState {
    Idle,
    ReloadScheduled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadRequest {
    /// URL of the mutation that triggered the reload.
    pub trigger: String,
    pub requested_at: String,
}

/// Whatever performs the reload on the host side.
pub trait ReloadSink: Send + Sync {
    fn reload(&self, request: ReloadRequest);
}

/// Delivers reload requests on an unbounded channel.
pub struct ChannelReloadSink {
    tx: mpsc::UnboundedSender<ReloadRequest>,
}

impl ChannelReloadSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReloadRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ReloadSink for ChannelReloadSink {
    fn reload(&self, request: ReloadRequest) {
        if let Err(e) = self.tx.send(request) {
            tracing::warn!("reload request dropped, receiver closed: {e}");
        }
    }
}

pub struct ReloadGate {
    pending: AtomicBool,
    delay: Duration,
    sink: Arc<dyn ReloadSink>,
}

impl ReloadGate {
    pub fn new(sink: Arc<dyn ReloadSink>, delay: Duration) -> Self {
        Self {
            pending: AtomicBool::new(false),
            delay,
            sink,
        }
    }

    pub fn state(&self) -> ReloadState {
        if self.pending.load(Ordering::Acquire) {
            ReloadState::ReloadScheduled
        } else {
            ReloadState::Idle
        }
    }

    /// Schedule a deferred reload unless one is already pending.
    ///
    /// Returns `true` only for the call that moved the gate out of `Idle`.
    pub fn try_schedule(&self, trigger: &str) -> bool {
        if self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("reload already scheduled, coalescing mutation to {trigger}");
            return false;
        }

        let request = ReloadRequest {
            trigger: trigger.to_string(),
            requested_at: Utc::now().to_rfc3339(),
        };
        tracing::info!("scheduling reload after mutation to {trigger}");

        let sink = self.sink.clone();
        let delay = self.delay;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if delay.is_zero() {
                        tokio::task::yield_now().await;
                    } else {
                        tokio::time::sleep(delay).await;
                    }
                    sink.reload(request);
                });
            }
            // No runtime to defer onto; reload inline.
            Err(_) => sink.reload(request),
        }
        true
    }

    /// Return to `Idle`. Stands in for the page load that clears the flag.
    pub fn reset(&self) {
        self.pending.store(false, Ordering::Release);
    }
}
