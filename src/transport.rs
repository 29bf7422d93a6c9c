//! Authenticated single-request transport.

use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use tracing::debug;

use crate::auth::{TokenManager, redact};
use crate::http::{HttpClient, HttpRequest, Method};

pub const SERVICE_INSTANCE_HEADER: &str = "ibm-service-instance-id";

/// Whether a call is tied to the service instance rather than to a bucket.
///
/// Instance-scoped calls (bucket listing, bucket creation, copy) carry the
/// service-instance identity header in addition to the bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Bucket,
    Instance,
}

/// Issues one authenticated request per call.
#[derive(Clone)]
pub struct Transport {
    http: Arc<dyn HttpClient>,
    token_manager: Arc<TokenManager>,
    service_instance_id: String,
}

impl Transport {
    pub fn new(
        http: Arc<dyn HttpClient>,
        token_manager: Arc<TokenManager>,
        service_instance_id: &str,
    ) -> Self {
        Self {
            http,
            token_manager,
            service_instance_id: service_instance_id.to_string(),
        }
    }

    pub fn http(&self) -> Arc<dyn HttpClient> {
        self.http.clone()
    }

    pub fn token_manager(&self) -> &Arc<TokenManager> {
        &self.token_manager
    }

    /// Send `method url` with a valid bearer token and return the body.
    ///
    /// Any non-2xx status is an error carrying the status line and body.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        body: Bytes,
        headers: &[(&str, String)],
        scope: Scope,
    ) -> Result<Bytes> {
        let token = self.token_manager.ensure_valid_token().await?;

        let mut request = HttpRequest::new(method, url)
            .header("Authorization", format!("Bearer {token}"))
            .body(body);
        if scope == Scope::Instance {
            request = request.header(SERVICE_INSTANCE_HEADER, self.service_instance_id.as_str());
        }
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }

        debug!(
            method = %request.method,
            url = %request.url,
            token = %redact(&token),
            service_instance_id = ?(scope == Scope::Instance).then(|| redact(&self.service_instance_id)),
            body_len = request.body.len(),
            "sending COS request."
        );

        let response = self.http.execute(request).await?;
        let status = response.status;
        let body = response.error_for_status().inspect_err(|e| {
            debug!(url = url, status = status, error = %e, "COS request failed.");
        })?;

        Ok(body)
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("token_manager", &self.token_manager)
            .field("service_instance_id", &redact(&self.service_instance_id))
            .finish()
    }
}
