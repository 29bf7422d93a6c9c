//! Shared test utilities for the cosclient library crate.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

use crate::config::Config;
use crate::http::{HttpClient, HttpRequest, HttpResponse};

pub(crate) const TEST_IAM_ENDPOINT: &str = "https://iam.test/identity/token";
pub(crate) const TEST_ENDPOINTS_URL: &str = "https://control.test/v2/endpoints";
pub(crate) const TEST_GLOBAL_SERVICE_URL: &str = "https://s3.us.test";

/// Initialise a dummy tracing subscriber for tests.
///
/// Uses `try_init` so that only the first call in a process actually
/// installs the subscriber; subsequent calls are silently ignored.
pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// A [`Config`] pointing at the scripted test hosts.
pub(crate) fn make_test_config() -> Config {
    let mut config = Config::new("test-api-key", "test-instance-id");
    config.iam_endpoint = TEST_IAM_ENDPOINT.to_string();
    config.endpoints_url = TEST_ENDPOINTS_URL.to_string();
    config.global_service_url = TEST_GLOBAL_SERVICE_URL.to_string();
    config
}

pub(crate) fn response(status: u16, body: impl Into<Bytes>) -> HttpResponse {
    let reason = match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "",
    };
    HttpResponse {
        status,
        reason: reason.to_string(),
        body: body.into(),
    }
}

pub(crate) fn iam_token_body(token: &str, expires_in_secs: i64) -> String {
    let expiration = chrono::Utc::now().timestamp() + expires_in_secs;
    format!(
        r#"{{"access_token":"{token}","refresh_token":"not_supported","token_type":"Bearer","expires_in":{expires_in_secs},"expiration":{expiration},"scope":"ibm openid"}}"#
    )
}

pub(crate) const TOPOLOGY_JSON: &str = r#"{
  "identity-endpoints": {
    "iam-token": "iam.cloud.ibm.com",
    "iam-policy": "iampap.cloud.ibm.com"
  },
  "service-endpoints": {
    "cross-region": {
      "us": {
        "public": {
          "us-geo": "s3.us.cloud-object-storage.appdomain.cloud",
          "Dallas": "s3.dal.us.cloud-object-storage.appdomain.cloud"
        },
        "private": {
          "us-geo": "s3.private.us.cloud-object-storage.appdomain.cloud"
        }
      },
      "eu": {
        "public": {
          "eu-geo": "s3.eu.cloud-object-storage.appdomain.cloud"
        }
      }
    },
    "regional": {
      "us-south": {
        "public": {
          "us-south": "s3.us-south.cloud-object-storage.appdomain.cloud"
        },
        "private": {
          "us-south": "s3.private.us-south.cloud-object-storage.appdomain.cloud"
        }
      },
      "eu-de": {
        "public": {
          "eu-de": "s3.eu-de.cloud-object-storage.appdomain.cloud"
        }
      },
      "eu-gb": {
        "private": {
          "eu-gb": "s3.private.eu-gb.cloud-object-storage.appdomain.cloud"
        }
      }
    },
    "single-site": {
      "ams03": {
        "public": {
          "ams03": "s3.ams03.cloud-object-storage.appdomain.cloud"
        }
      },
      "hkg02": {
        "public": {
          "hkg02": "s3.hkg02.cloud-object-storage.appdomain.cloud"
        }
      }
    }
  }
}"#;

type Handler = dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync;

/// An [`HttpClient`] that answers from a closure and records every request.
#[derive(Clone)]
pub(crate) struct ScriptedHttpClient {
    handler: Arc<Handler>,
    requests: Arc<Mutex<Vec<HttpRequest>>>,
    delay: Option<Duration>,
}

impl ScriptedHttpClient {
    pub(crate) fn new(
        handler: impl Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Arc::new(handler),
            requests: Arc::new(Mutex::new(Vec::new())),
            delay: None,
        }
    }

    /// Sleep before answering, so concurrent callers overlap.
    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn count_matching(&self, url_fragment: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.url.contains(url_fragment))
            .count()
    }
}

#[async_trait]
impl HttpClient for ScriptedHttpClient {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        (self.handler)(&request)
    }
}
