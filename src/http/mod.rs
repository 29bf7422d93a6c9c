//! Minimal HTTP seam.
//!
//! Everything above this module talks to the network through [`HttpClient`],
//! which issues exactly one request and hands back status and body without
//! interpreting them. The default implementation is backed by `reqwest`.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
pub use reqwest::Method;
use tracing::trace;

use crate::config::HttpConfig;
use crate::types::error::CosError;

/// A single outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: Bytes::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Value of the first header with the given name (case-insensitive).
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A received response, whatever its status.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Convert a non-2xx response into a [`CosError::Transport`].
    pub fn error_for_status(self) -> Result<Bytes, CosError> {
        if self.is_success() {
            return Ok(self.body);
        }
        Err(CosError::Transport {
            status: Some(self.status),
            body: self.body_text(),
            reason: self.reason,
        })
    }
}

#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Send one request. Non-2xx statuses are returned, not raised; only
    /// failures to obtain a response at all are errors.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// `reqwest`-backed [`HttpClient`].
#[derive(Debug, Clone)]
pub struct ReqwestHttpClient {
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            // each call stands alone, a broken pooled connection must not
            // surface as a different call's failure
            .pool_max_idle_per_host(0)
            .danger_accept_invalid_certs(config.accept_invalid_certs);
        if let Some(ms) = config.connect_timeout_milliseconds {
            builder = builder.connect_timeout(Duration::from_millis(ms));
        }
        if let Some(ms) = config.request_timeout_milliseconds {
            builder = builder.timeout(Duration::from_millis(ms));
        }

        let client = builder
            .build()
            .context("reqwest::ClientBuilder::build() failed.")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        trace!(method = %request.method, url = %request.url, "sending HTTP request.");

        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .header(reqwest::header::CONNECTION, "close");
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.body(request.body).send().await.map_err(|e| {
            CosError::Transport {
                status: None,
                reason: e.to_string(),
                body: String::new(),
            }
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| CosError::Transport {
            status: Some(status.as_u16()),
            reason: format!("error reading response body: {e}"),
            body: String::new(),
        })?;

        Ok(HttpResponse {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
            body,
        })
    }
}
