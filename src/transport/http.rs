use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Url;

use super::{HttpRequest, HttpResponse, Transport};
use crate::config::SyncConfig;
use crate::error::TransportError;

/// Sends requests with reqwest, resolving relative URLs against `origin`.
pub struct HttpTransport {
    client: reqwest::Client,
    origin: Url,
}

impl HttpTransport {
    pub fn new(origin: &str, timeout: Option<Duration>) -> Result<Self, TransportError> {
        let origin = Url::parse(origin)
            .map_err(|e| TransportError::InvalidUrl(format!("{origin}: {e}")))?;

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| TransportError::Request(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, origin })
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self, TransportError> {
        Self::new(&config.origin, config.request_timeout())
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    fn resolve(&self, url: &str) -> Result<Url, TransportError> {
        self.origin
            .join(url)
            .map_err(|e| TransportError::InvalidUrl(format!("{url}: {e}")))
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self.resolve(&request.url)?;
        tracing::debug!("{} {}", request.method, url);

        let mut builder = self.client.request(request.method.clone(), url);
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportError::Request(format!("invalid header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportError::Request(format!("invalid header value: {e}")))?;
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        tracing::debug!("{} {} -> {status}", request.method, request.url);
        Ok(HttpResponse { status, body })
    }
}
