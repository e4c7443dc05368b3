//! Scripted transport for sync client integration tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use campus_sync::transport::{HttpRequest, HttpResponse, Transport};
use campus_sync::TransportError;

#[derive(Clone)]
enum Reply {
    Respond { status: u16, body: String },
    Fail(String),
}

/// Replies by exact URL, records every request, and can delay replies so
/// several calls are in flight at once.
#[derive(Clone, Default)]
pub struct MockTransport {
    replies: Arc<Mutex<HashMap<String, Reply>>>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    delay: Arc<Mutex<Option<Duration>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn respond_json(&self, url: &str, status: u16, body: serde_json::Value) {
        self.respond_raw(url, status, &body.to_string()).await;
    }

    pub async fn respond_raw(&self, url: &str, status: u16, body: &str) {
        self.replies.lock().await.insert(
            url.to_string(),
            Reply::Respond {
                status,
                body: body.to_string(),
            },
        );
    }

    pub async fn fail(&self, url: &str, message: impl Into<String>) {
        self.replies
            .lock()
            .await
            .insert(url.to_string(), Reply::Fail(message.into()));
    }

    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.lock().await = Some(delay);
    }

    pub async fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().await.clone()
    }

    pub fn boxed(self) -> Arc<dyn Transport> {
        Arc::new(self)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let reply = self.replies.lock().await.get(&request.url).cloned();
        self.requests.lock().await.push(request);

        let delay = *self.delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Some(Reply::Respond { status, body }) => Ok(HttpResponse { status, body }),
            Some(Reply::Fail(message)) => Err(TransportError::Connection(message)),
            None => Ok(HttpResponse {
                status: 404,
                body: String::new(),
            }),
        }
    }
}
