use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;

use super::{is_mutating, HttpRequest, HttpResponse, Method, Transport};
use crate::error::TransportError;
use crate::reload::ReloadGate;

/// Path substrings whose mutations never trigger a reload.
#[derive(Debug, Clone)]
pub struct ExemptPaths(Vec<String>);

impl ExemptPaths {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self(
            patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_ascii_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        )
    }

    /// Case-insensitive match against the path of `url`, resolved on `origin`.
    /// A URL that cannot be parsed is never exempt.
    pub fn is_exempt(&self, url: &str, origin: &Url) -> bool {
        let Ok(resolved) = origin.join(url) else {
            return false;
        };
        let path = resolved.path().to_ascii_lowercase();
        self.0.iter().any(|pattern| path.contains(pattern.as_str()))
    }
}

/// An empty or unparseable URL counts as same-origin.
pub fn is_same_origin(url: &str, origin: &Url) -> bool {
    if url.trim().is_empty() {
        return true;
    }
    match origin.join(url) {
        Ok(resolved) => resolved.origin() == origin.origin(),
        Err(_) => true,
    }
}

/// Wraps a transport and schedules one reload per burst of successful,
/// same-origin, non-exempt mutations.
pub struct TransportObserver {
    inner: Arc<dyn Transport>,
    origin: Url,
    exempt: ExemptPaths,
    gate: Arc<ReloadGate>,
}

impl TransportObserver {
    pub fn new(
        inner: Arc<dyn Transport>,
        origin: Url,
        exempt: ExemptPaths,
        gate: Arc<ReloadGate>,
    ) -> Self {
        Self {
            inner,
            origin,
            exempt,
            gate,
        }
    }

    pub fn gate(&self) -> &Arc<ReloadGate> {
        &self.gate
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Whether a successful response to this call would schedule a reload.
    pub fn triggers_reload(&self, method: &Method, url: &str) -> bool {
        is_mutating(method)
            && is_same_origin(url, &self.origin)
            && !self.exempt.is_exempt(url, &self.origin)
    }
}

#[async_trait]
impl Transport for TransportObserver {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = request.method.clone();
        let url = request.url.clone();

        let response = self.inner.send(request).await?;

        if response.is_success() && self.triggers_reload(&method, &url) {
            self.gate.try_schedule(&url);
        } else if is_mutating(&method) {
            tracing::debug!(
                "mutation {method} {url} -> {} does not trigger reload",
                response.status
            );
        }
        Ok(response)
    }
}
