//! The sync client page controllers talk to.
//!
//! `SyncClient` ties the pieces together: every request goes through the
//! observing transport, successful `post` calls emit a scoped change event,
//! and focus regain and polling feed the same refresh callbacks. Failures
//! are absorbed here, logged, and forwarded to an optional [`FailureHook`].

use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::broadcast;

use crate::bus::{ChangeBus, ChangeEvent, DispatchReport, HandlerPanic, Scope, SubscriptionId};
use crate::config::SyncConfig;
use crate::error::{SyncError, TransportError};
use crate::focus::{FocusSignal, FocusTracker};
use crate::outcome::{decode_payload, parse_body, FailureReason, Outcome};
use crate::poller::{PagePoller, PollHandle};
use crate::reload::{ReloadGate, ReloadSink, ReloadState};
use crate::transport::{
    ExemptPaths, HttpRequest, HttpResponse, HttpTransport, Transport, TransportObserver,
};

/// A failure the client absorbed instead of returning to a caller.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncFailure {
    Request {
        method: String,
        url: String,
        error: String,
    },
    ChangeHandler {
        scope: Scope,
        panic: HandlerPanic,
    },
    FocusHandler {
        panic: HandlerPanic,
    },
}

pub type FailureHook = Arc<dyn Fn(&SyncFailure) + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct PostOptions {
    /// Scope of the emitted change event; wildcard when unset.
    pub scope: Option<Scope>,
}

impl PostOptions {
    pub fn scoped(scope: impl Into<Scope>) -> Self {
        Self {
            scope: Some(scope.into()),
        }
    }
}

struct SyncInner {
    transport: TransportObserver,
    bus: ChangeBus,
    focus: FocusTracker,
    poll_interval: Duration,
    failure_hook: RwLock<Option<FailureHook>>,
}

#[derive(Clone)]
pub struct SyncClient {
    inner: Arc<SyncInner>,
}

impl SyncClient {
    /// Build a client backed by reqwest.
    pub fn from_config(config: &SyncConfig, sink: Arc<dyn ReloadSink>) -> Result<Self, SyncError> {
        config.validate()?;
        let http = HttpTransport::from_config(config)?;
        Self::with_transport(config, Arc::new(http), sink)
    }

    /// Build a client around any transport; it is wrapped in the observer.
    pub fn with_transport(
        config: &SyncConfig,
        transport: Arc<dyn Transport>,
        sink: Arc<dyn ReloadSink>,
    ) -> Result<Self, SyncError> {
        config.validate()?;
        let origin = config.origin_url()?;
        let gate = Arc::new(ReloadGate::new(sink, config.reload_delay()));
        let observer = TransportObserver::new(
            transport,
            origin,
            ExemptPaths::new(&config.exempt_paths),
            gate,
        );

        tracing::info!(
            "sync client ready for {} (exempt: {:?}, poll every {}s)",
            config.origin,
            config.exempt_paths,
            config.poll_interval_secs
        );

        Ok(Self {
            inner: Arc::new(SyncInner {
                transport: observer,
                bus: ChangeBus::new(),
                focus: FocusTracker::new(),
                poll_interval: config.poll_interval(),
                failure_hook: RwLock::new(None),
            }),
        })
    }

    pub fn set_failure_hook(&self, hook: FailureHook) {
        *self
            .inner
            .failure_hook
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(hook);
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Raw request through the observer. Mutations still schedule the
    /// reload, but no change event is emitted.
    pub async fn fetch(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.inner.transport.send(request).await
    }

    /// Read-only request returning the parsed body.
    ///
    /// A JSON body is returned whatever the status so callers can branch on
    /// its flags; a non-JSON body is an error.
    pub async fn get(&self, url: &str) -> Result<Value, SyncError> {
        let response = match self.fetch(HttpRequest::get(url)).await {
            Ok(response) => response,
            Err(e) => {
                self.report_request_failure("GET", url, &e.to_string());
                return Err(e.into());
            }
        };

        match response.json() {
            Ok(payload) => Ok(payload),
            Err(_) if !response.is_success() => {
                self.report_request_failure("GET", url, &format!("status {}", response.status));
                Err(SyncError::Http {
                    status: response.status,
                    body: response.body,
                })
            }
            Err(e) => {
                self.report_request_failure("GET", url, &e.to_string());
                Err(SyncError::InvalidResponse(format!("{url}: {e}")))
            }
        }
    }

    /// Mutating request with a JSON body. Never fails: transport errors come
    /// back as `Outcome::Failure(FailureReason::Transport)`.
    pub async fn post(&self, url: &str, body: Value, options: PostOptions) -> Outcome {
        // A missing body goes out as an empty object.
        let body = if body.is_null() { json!({}) } else { body };
        let response = match self.fetch(HttpRequest::post_json(url, body.clone())).await {
            Ok(response) => response,
            Err(e) => {
                self.report_request_failure("POST", url, &e.to_string());
                return Outcome::Failure(FailureReason::Transport(e.to_string()));
            }
        };

        let payload = parse_body(response.status, &response.body);
        let outcome = decode_payload(response.status, payload);

        if outcome.is_success() {
            let scope = options.scope.unwrap_or_default();
            self.emit_change(scope, json!({ "url": url, "body": body }));
        } else {
            tracing::debug!(
                "POST {url} not applied: {}",
                outcome.failure_message().unwrap_or_default()
            );
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Change events
    // -----------------------------------------------------------------------

    pub fn emit_change(&self, scope: impl Into<Scope>, detail: Value) -> ChangeEvent {
        let DispatchReport { event, panicked, .. } = self.inner.bus.emit(scope, detail);
        for panic in panicked {
            self.report(SyncFailure::ChangeHandler {
                scope: event.scope.clone(),
                panic,
            });
        }
        event
    }

    pub fn on_change<F>(&self, scope: impl Into<Scope>, handler: F) -> SubscriptionId
    where
        F: Fn(&ChangeEvent) + Send + Sync + 'static,
    {
        self.inner.bus.on_change(scope, Arc::new(handler))
    }

    pub fn off_change(&self, id: SubscriptionId) -> bool {
        self.inner.bus.off_change(id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.inner.bus.subscribe()
    }

    // -----------------------------------------------------------------------
    // Focus refresh
    // -----------------------------------------------------------------------

    pub fn refresh_on_focus<F>(&self, refresh: F) -> SubscriptionId
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.focus.register(Arc::new(refresh))
    }

    pub fn off_focus(&self, id: SubscriptionId) -> bool {
        self.inner.focus.unregister(id)
    }

    /// Feed a host focus/visibility signal. Returns true when it brought the
    /// page back to the foreground.
    pub fn focus_signal(&self, signal: FocusSignal) -> bool {
        let dispatch = self.inner.focus.signal(signal);
        for panic in dispatch.panicked {
            self.report(SyncFailure::FocusHandler { panic });
        }
        dispatch.regained
    }

    // -----------------------------------------------------------------------
    // Page convention
    // -----------------------------------------------------------------------

    /// Wire a page's refresh the way every controller does: on matching
    /// change events, on focus regain, and on the poll interval. Outside a
    /// tokio runtime the poll timer is skipped and the other two still apply.
    pub fn watch_page<F>(&self, scope: impl Into<Scope>, refresh: F) -> PageWatch
    where
        F: Fn() + Send + Sync + 'static,
    {
        let scope = scope.into();
        let refresh: Arc<dyn Fn() + Send + Sync> = Arc::new(refresh);

        let on_change = refresh.clone();
        let change_id = self.on_change(scope.clone(), move |_event| on_change());
        let on_focus = refresh.clone();
        let focus_id = self.refresh_on_focus(move || on_focus());
        let poller = PagePoller::spawn(scope.to_string(), self.inner.poll_interval, refresh);
        if poller.is_none() {
            tracing::warn!("no tokio runtime; {scope} page will not poll");
        }

        PageWatch {
            client: self.clone(),
            change_id,
            focus_id,
            _poller: poller,
        }
    }

    // -----------------------------------------------------------------------
    // Reload state
    // -----------------------------------------------------------------------

    pub fn reload_state(&self) -> ReloadState {
        self.inner.transport.gate().state()
    }

    /// Clear a pending reload, as a fresh page load would.
    pub fn reset(&self) {
        self.inner.transport.gate().reset();
    }

    fn report_request_failure(&self, method: &str, url: &str, error: &str) {
        tracing::warn!("{method} {url} failed: {error}");
        self.report(SyncFailure::Request {
            method: method.to_string(),
            url: url.to_string(),
            error: error.to_string(),
        });
    }

    fn report(&self, failure: SyncFailure) {
        let hook = self
            .inner
            .failure_hook
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(hook) = hook {
            if let Err(message) = crate::bus::invoke_isolated(|| hook(&failure)) {
                tracing::error!("failure hook panicked: {message}");
            }
        }
    }
}

/// Registrations made by [`SyncClient::watch_page`]; released on drop.
pub struct PageWatch {
    client: SyncClient,
    change_id: SubscriptionId,
    focus_id: SubscriptionId,
    _poller: Option<PollHandle>,
}

impl Drop for PageWatch {
    fn drop(&mut self) {
        self.client.off_change(self.change_id);
        self.client.off_focus(self.focus_id);
    }
}

// ---------------------------------------------------------------------------
// Process-wide instance
// ---------------------------------------------------------------------------

static GLOBAL: OnceLock<SyncClient> = OnceLock::new();

/// Install the process-wide client. Only the first call succeeds.
pub fn install_global(client: SyncClient) -> Result<&'static SyncClient, SyncError> {
    GLOBAL
        .set(client)
        .map_err(|_| SyncError::Config("sync client already installed".to_string()))?;
    GLOBAL
        .get()
        .ok_or_else(|| SyncError::Config("sync client missing after install".to_string()))
}

pub fn global() -> Option<&'static SyncClient> {
    GLOBAL.get()
}
