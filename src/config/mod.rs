pub mod args;

use std::time::Duration;

use crate::types::ApiKey;
use crate::types::error::CosError;

pub const DEFAULT_IAM_ENDPOINT: &str = "https://iam.cloud.ibm.com/identity/token";
pub const DEFAULT_ENDPOINTS_URL: &str =
    "https://control.cloud-object-storage.cloud.ibm.com/v2/endpoints";
pub const DEFAULT_GLOBAL_SERVICE_URL: &str = "https://s3.us.cloud-object-storage.appdomain.cloud";
pub const DEFAULT_REFRESH_LOOKAHEAD_SECONDS: u64 = 5 * 60;
pub const DEFAULT_WORKER_SIZE: u16 = 10;
pub const DEFAULT_BATCH_SIZE: u16 = 1000;
pub const DEFAULT_MAX_KEYS: i32 = 1000;

/// Largest accepted refresh lookahead. IAM tokens live about an hour; a
/// lookahead near that would refresh on every request.
pub const MAX_REFRESH_LOOKAHEAD_SECONDS: u64 = 30 * 60;

/// Service ceiling for keys in one multi-object delete request.
pub const MAX_BATCH_SIZE: u16 = 1000;

/// Main configuration for a [`CosClient`](crate::CosClient).
///
/// # Quick Start
///
/// ```
/// use cosclient_rs::Config;
///
/// let config = Config::new("my-api-key", "crn:v1:bluemix:public:cloud-object-storage:global:a/1234::");
/// assert_eq!(config.worker_size, 10);
/// assert_eq!(config.batch_size, 1000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: ApiKey,
    pub service_instance_id: String,
    pub iam_endpoint: String,
    pub endpoints_url: String,
    /// Region-agnostic service URL used for bucket listing and existence checks.
    pub global_service_url: String,
    pub refresh_lookahead_seconds: u64,
    /// Number of multi-object delete requests allowed in flight at once.
    pub worker_size: u16,
    pub batch_size: u16,
    /// Listing page size.
    pub max_keys: i32,
    pub http_config: HttpConfig,
    pub tracing_config: Option<TracingConfig>,
}

impl Config {
    /// Create a `Config` with production defaults for the given credentials.
    pub fn new(api_key: &str, service_instance_id: &str) -> Self {
        Config {
            api_key: ApiKey::new(api_key),
            service_instance_id: service_instance_id.to_string(),
            ..Config::default()
        }
    }

    pub fn refresh_lookahead(&self) -> Duration {
        Duration::from_secs(self.refresh_lookahead_seconds)
    }

    /// Reject configurations the client cannot work with.
    pub fn validate(&self) -> Result<(), CosError> {
        if self.api_key.is_empty() {
            return Err(CosError::InvalidConfig("missing API key".to_string()));
        }
        if self.service_instance_id.is_empty() {
            return Err(CosError::InvalidConfig(
                "missing COS service instance id".to_string(),
            ));
        }
        if self.refresh_lookahead_seconds > MAX_REFRESH_LOOKAHEAD_SECONDS {
            return Err(CosError::InvalidConfig(format!(
                "refresh lookahead must be at most {MAX_REFRESH_LOOKAHEAD_SECONDS} seconds"
            )));
        }
        if self.worker_size == 0 {
            return Err(CosError::InvalidConfig(
                "worker size must be at least 1".to_string(),
            ));
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(CosError::InvalidConfig(format!(
                "batch size must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }
        if self.max_keys <= 0 {
            return Err(CosError::InvalidConfig(
                "max keys must be at least 1".to_string(),
            ));
        }
        for (name, url) in [
            ("IAM endpoint", &self.iam_endpoint),
            ("endpoints URL", &self.endpoints_url),
            ("global service URL", &self.global_service_url),
        ] {
            url::Url::parse(url)
                .map_err(|e| CosError::InvalidConfig(format!("invalid {name} {url:?}: {e}")))?;
        }
        Ok(())
    }
}

impl Default for Config {
    /// Defaults with empty credentials. Set `api_key` and
    /// `service_instance_id` before building a client.
    fn default() -> Self {
        Config {
            api_key: ApiKey::new(""),
            service_instance_id: String::new(),
            iam_endpoint: DEFAULT_IAM_ENDPOINT.to_string(),
            endpoints_url: DEFAULT_ENDPOINTS_URL.to_string(),
            global_service_url: DEFAULT_GLOBAL_SERVICE_URL.to_string(),
            refresh_lookahead_seconds: DEFAULT_REFRESH_LOOKAHEAD_SECONDS,
            worker_size: DEFAULT_WORKER_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            max_keys: DEFAULT_MAX_KEYS,
            http_config: HttpConfig::default(),
            tracing_config: None,
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Default)]
pub struct HttpConfig {
    pub connect_timeout_milliseconds: Option<u64>,
    pub request_timeout_milliseconds: Option<u64>,
    /// Skip TLS certificate verification. Off unless explicitly requested.
    pub accept_invalid_certs: bool,
}

/// Tracing (logging) configuration.
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::init_dummy_tracing_subscriber;

    #[test]
    fn config_new_sets_credentials_and_defaults() {
        init_dummy_tracing_subscriber();

        let config = Config::new("key", "instance");
        assert_eq!(config.api_key.expose(), "key");
        assert_eq!(config.service_instance_id, "instance");
        assert_eq!(config.iam_endpoint, DEFAULT_IAM_ENDPOINT);
        assert_eq!(config.endpoints_url, DEFAULT_ENDPOINTS_URL);
        assert_eq!(config.global_service_url, DEFAULT_GLOBAL_SERVICE_URL);
        assert_eq!(config.refresh_lookahead(), Duration::from_secs(300));
        assert_eq!(config.worker_size, 10);
        assert_eq!(config.batch_size, 1000);
        assert_eq!(config.max_keys, 1000);
        assert!(!config.http_config.accept_invalid_certs);
        assert!(config.tracing_config.is_none());
    }

    #[test]
    fn validate_accepts_defaults_with_credentials() {
        assert!(Config::new("key", "instance").validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_credentials() {
        assert_eq!(
            Config::new("", "instance").validate(),
            Err(CosError::InvalidConfig("missing API key".to_string()))
        );
        assert!(matches!(
            Config::new("key", "").validate(),
            Err(CosError::InvalidConfig(_))
        ));
    }

    #[test]
    fn validate_rejects_bad_sizes() {
        let mut config = Config::new("key", "instance");
        config.worker_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::new("key", "instance");
        config.batch_size = 1001;
        assert!(config.validate().is_err());

        let mut config = Config::new("key", "instance");
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::new("key", "instance");
        config.max_keys = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_bounds_refresh_lookahead() {
        let mut config = Config::new("key", "instance");
        config.refresh_lookahead_seconds = MAX_REFRESH_LOOKAHEAD_SECONDS;
        assert!(config.validate().is_ok());

        config.refresh_lookahead_seconds = 3600;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("refresh lookahead"));

        config.refresh_lookahead_seconds = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unparsable_urls() {
        let mut config = Config::new("key", "instance");
        config.global_service_url = "not a url".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("global service URL"));
    }

    #[test]
    fn debug_output_hides_api_key() {
        let config = Config::new("super-secret-key", "instance");
        assert!(!format!("{config:?}").contains("super-secret-key"));
    }
}
