use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::bus::invoke_isolated;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

pub struct PagePoller;

impl PagePoller {
    /// Spawn a task that calls `refresh` every `period`, starting one period
    /// from now. Missed ticks are skipped rather than bursted.
    ///
    /// Returns `None` when called outside a tokio runtime.
    pub fn spawn(
        label: impl Into<String>,
        period: Duration,
        refresh: Arc<dyn Fn() + Send + Sync>,
    ) -> Option<PollHandle> {
        let runtime = tokio::runtime::Handle::try_current().ok()?;
        let label = label.into();
        let handle = runtime.spawn(async move {
            let mut interval = time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                tracing::trace!("polling {label}");
                if let Err(message) = invoke_isolated(|| refresh()) {
                    tracing::warn!("poll refresh for {label} panicked: {message}");
                }
            }
        });
        Some(PollHandle { handle })
    }
}

/// Aborts the poll task when stopped or dropped.
pub struct PollHandle {
    handle: JoinHandle<()>,
}

impl PollHandle {
    pub fn stop(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
