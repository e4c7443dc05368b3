//! Common test utilities for sync client integration tests.

#![allow(dead_code)]

pub mod mock_transport;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use campus_sync::{ChannelReloadSink, ReloadRequest, SyncClient, SyncConfig, SyncFailure};
use tokio::sync::mpsc;

pub use mock_transport::MockTransport;

pub const ORIGIN: &str = "http://campus.local:5000";

pub struct Harness {
    pub client: SyncClient,
    pub transport: MockTransport,
    pub reloads: mpsc::UnboundedReceiver<ReloadRequest>,
    pub failures: Arc<Mutex<Vec<SyncFailure>>>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(SyncConfig::with_origin(ORIGIN))
    }

    pub fn with_config(config: SyncConfig) -> Self {
        let transport = MockTransport::new();
        let (sink, reloads) = ChannelReloadSink::new();
        let client = SyncClient::with_transport(&config, transport.clone().boxed(), Arc::new(sink))
            .expect("valid test config");

        let failures = Arc::new(Mutex::new(Vec::new()));
        let recorded = failures.clone();
        client.set_failure_hook(Arc::new(move |failure: &SyncFailure| {
            recorded.lock().unwrap().push(failure.clone());
        }));

        Self {
            client,
            transport,
            reloads,
            failures,
        }
    }

    /// Count reloads delivered once pending tasks have had a chance to run.
    pub async fn drain_reloads(&mut self) -> usize {
        tokio::time::sleep(Duration::from_millis(20)).await;
        let mut count = 0;
        while self.reloads.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    pub fn failures(&self) -> Vec<SyncFailure> {
        self.failures.lock().unwrap().clone()
    }
}
