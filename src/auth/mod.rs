//! IAM bearer-token lifecycle.
//!
//! [`TokenManager`] exchanges the API key for a bearer token on first use and
//! again whenever the held token is about to expire. The fast path only reads
//! the current token. Refreshes are serialized behind an async mutex and
//! re-check staleness once the mutex is held, so callers queued behind an
//! in-flight exchange reuse its result instead of issuing their own.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::http::{HttpClient, HttpRequest, Method};
use crate::types::ApiKey;
use crate::types::error::CosError;

const GRANT_TYPE_API_KEY: &str = "urn:ibm:params:oauth:grant-type:apikey";
const RESPONSE_TYPE_CLOUD_IAM: &str = "cloud_iam";

/// A bearer token and the instant it stops being accepted.
#[derive(Clone, PartialEq)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// The "no token yet" state: empty and already expired.
    pub fn empty() -> Self {
        Self {
            token: String::new(),
            expires_at: DateTime::<Utc>::MIN_UTC,
        }
    }

    /// True if the token is non-empty and stays valid beyond `now + lookahead`.
    pub fn is_fresh(&self, now: DateTime<Utc>, lookahead: Duration) -> bool {
        if self.token.is_empty() {
            return false;
        }
        let lookahead = chrono::Duration::from_std(lookahead).unwrap_or(chrono::Duration::MAX);
        match now.checked_add_signed(lookahead) {
            Some(deadline) => deadline < self.expires_at,
            None => false,
        }
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &redact(&self.token))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Keep a short prefix of a secret for log correlation.
pub(crate) fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(8).collect();
    if prefix.is_empty() {
        String::new()
    } else {
        format!("{prefix}...")
    }
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expiration: Option<i64>,
    #[serde(default, rename = "errorMessage", alias = "error_message")]
    error_message: Option<String>,
}

/// Owns the bearer token of one client.
pub struct TokenManager {
    api_key: ApiKey,
    iam_endpoint: String,
    refresh_lookahead: Duration,
    http: Arc<dyn HttpClient>,
    current: RwLock<AccessToken>,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(
        api_key: ApiKey,
        iam_endpoint: &str,
        refresh_lookahead: Duration,
        http: Arc<dyn HttpClient>,
    ) -> Self {
        Self {
            api_key,
            iam_endpoint: iam_endpoint.to_string(),
            refresh_lookahead,
            http,
            current: RwLock::new(AccessToken::empty()),
            refresh_lock: Mutex::new(()),
        }
    }

    /// Return a token that is valid for at least the refresh lookahead,
    /// exchanging the API key first if the held one is missing or stale.
    ///
    /// On exchange failure the previous token is kept and the error is
    /// returned to this caller only.
    pub async fn ensure_valid_token(&self) -> Result<String> {
        if let Some(token) = self.fresh_token() {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;

        // another caller may have refreshed while we waited
        if let Some(token) = self.fresh_token() {
            debug!("token refreshed by a concurrent caller.");
            return Ok(token);
        }

        let refreshed = self.exchange().await?;
        let token = refreshed.token.clone();
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = refreshed;
        Ok(token)
    }

    /// Snapshot of the held token.
    pub fn current(&self) -> AccessToken {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the held token, e.g. with one obtained out of band.
    pub fn set_token(&self, token: AccessToken) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    fn fresh_token(&self) -> Option<String> {
        let current = self.current.read().unwrap_or_else(|e| e.into_inner());
        current
            .is_fresh(Utc::now(), self.refresh_lookahead)
            .then(|| current.token.clone())
    }

    async fn exchange(&self) -> Result<AccessToken> {
        info!(iam_endpoint = %self.iam_endpoint, "refreshing COS token.");

        let form = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("apikey", self.api_key.expose())
            .append_pair("response_type", RESPONSE_TYPE_CLOUD_IAM)
            .append_pair("grant_type", GRANT_TYPE_API_KEY)
            .finish();

        let request = HttpRequest::new(Method::POST, &self.iam_endpoint)
            .header("Accept", "application/json")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(form);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| CosError::AuthExchangeFailed(format!("error getting IAM token: {e:#}")))?;

        let body = response.body_text();
        let parsed: TokenExchangeResponse = serde_json::from_slice(&response.body).map_err(|e| {
            CosError::AuthExchangeFailed(format!(
                "error parsing response ({} {}): {e}: {body}",
                response.status, response.reason
            ))
        })?;

        if let Some(message) = parsed.error_message.filter(|m| !m.is_empty()) {
            return Err(CosError::AuthExchangeFailed(message).into());
        }
        if !response.is_success() {
            return Err(CosError::AuthExchangeFailed(format!(
                "{} {}: {body}",
                response.status, response.reason
            ))
            .into());
        }

        let token = parsed
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CosError::AuthExchangeFailed("response has no access_token".to_string()))?;
        let expires_at = parsed
            .expiration
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
            .ok_or_else(|| CosError::AuthExchangeFailed("response has no valid expiration".to_string()))?;

        debug!(
            token = %redact(&token),
            expires_at = %expires_at,
            "COS token refreshed."
        );

        Ok(AccessToken { token, expires_at })
    }
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager")
            .field("iam_endpoint", &self.iam_endpoint)
            .field("refresh_lookahead", &self.refresh_lookahead)
            .field("current", &self.current())
            .finish()
    }
}

#[cfg(test)]
mod tests;
