//! Shared E2E test infrastructure for cosclient-rs.
//!
//! Provides `TestHelper` for bucket and object management against a live
//! IBM Cloud Object Storage instance. Credentials come from the environment:
//! `COS_E2E_API_KEY` and `COS_E2E_INSTANCE_ID` are required, and
//! `COS_E2E_REGION` (regional deployment, default `us-south`) is optional.

#![allow(dead_code)]

use std::sync::Arc;

use bytes::Bytes;
use cosclient_rs::{Config, CosClient, TopologyCache};
use uuid::Uuid;

const API_KEY_ENV_VAR: &str = "COS_E2E_API_KEY";
const INSTANCE_ID_ENV_VAR: &str = "COS_E2E_INSTANCE_ID";
const REGION_ENV_VAR: &str = "COS_E2E_REGION";
const DEFAULT_REGION: &str = "us-south";

/// Deletes all objects and the bucket when dropped.
///
/// Cleanup runs on its own runtime in a separate thread so it also happens
/// when the test body panics inside the test runtime.
pub struct BucketGuard {
    helper: Arc<TestHelper>,
    bucket: String,
    cleaned: bool,
}

impl BucketGuard {
    /// Delete the bucket now and disarm the guard.
    pub async fn cleanup(mut self) {
        self.helper.delete_bucket_cascade(&self.bucket).await;
        self.cleaned = true;
    }
}

impl Drop for BucketGuard {
    fn drop(&mut self) {
        if self.cleaned {
            return;
        }
        let helper = self.helper.clone();
        let bucket = self.bucket.clone();
        let _ = std::thread::spawn(move || {
            if let Ok(runtime) = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                runtime.block_on(helper.delete_bucket_cascade(&bucket));
            }
        })
        .join();
    }
}

/// Shared test helper for E2E tests.
pub struct TestHelper {
    client: CosClient,
    config: Config,
    region: String,
}

impl TestHelper {
    pub async fn new() -> Arc<Self> {
        let config = Self::config();
        let client = CosClient::new(config.clone()).expect("client construction failed");
        let region = std::env::var(REGION_ENV_VAR).unwrap_or_else(|_| DEFAULT_REGION.to_string());

        Arc::new(Self {
            client,
            config,
            region,
        })
    }

    /// A `Config` built from the e2e environment variables.
    pub fn config() -> Config {
        let api_key = std::env::var(API_KEY_ENV_VAR)
            .unwrap_or_else(|_| panic!("{API_KEY_ENV_VAR} must be set"));
        let instance_id = std::env::var(INSTANCE_ID_ENV_VAR)
            .unwrap_or_else(|_| panic!("{INSTANCE_ID_ENV_VAR} must be set"));
        Config::new(&api_key, &instance_id)
    }

    /// A second client with its own caches, sharing `topology`.
    pub fn client_with_topology(&self, topology: Arc<TopologyCache>) -> CosClient {
        CosClient::with_topology_cache(self.config.clone(), topology)
            .expect("client construction failed")
    }

    pub fn client(&self) -> &CosClient {
        &self.client
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn bucket_guard(self: &Arc<Self>, bucket: &str) -> BucketGuard {
        BucketGuard {
            helper: Arc::clone(self),
            bucket: bucket.to_string(),
            cleaned: false,
        }
    }

    /// A unique, DNS-compatible bucket name like `cosclient-e2e-<uuid>`.
    pub fn generate_bucket_name(&self) -> String {
        format!("cosclient-e2e-{}", Uuid::new_v4())
    }

    // -----------------------------------------------------------------------
    // Bucket management
    // -----------------------------------------------------------------------

    /// Create a regional bucket in the configured region.
    pub async fn create_bucket(&self, bucket: &str) {
        self.client
            .create_bucket(bucket, "regional", &self.region)
            .await
            .unwrap_or_else(|e| panic!("create_bucket({bucket}) failed: {e:#}"));
    }

    /// Empty and delete `bucket`, ignoring errors.
    pub async fn delete_bucket_cascade(&self, bucket: &str) {
        let _ = self.client.delete_bucket_contents(bucket).await;
        let _ = self.client.delete_bucket(bucket).await;
    }

    // -----------------------------------------------------------------------
    // Object operations
    // -----------------------------------------------------------------------

    pub async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) {
        self.client
            .upload_object(bucket, key, Bytes::from(body))
            .await
            .unwrap_or_else(|e| panic!("upload_object({bucket}/{key}) failed: {e:#}"));
    }

    /// Upload `count` small objects named `<prefix><index>` with bounded
    /// parallelism.
    pub async fn put_objects(&self, bucket: &str, prefix: &str, count: usize) {
        let mut set = tokio::task::JoinSet::new();
        for i in 0..count {
            let client = self.client.clone();
            let bucket = bucket.to_string();
            let key = format!("{prefix}{i:05}");
            set.spawn(async move {
                client
                    .upload_object(&bucket, &key, Bytes::from_static(b"e2e"))
                    .await
                    .map_err(|e| format!("{key}: {e:#}"))
            });
            if set.len() >= 32 {
                set.join_next().await.unwrap().unwrap().unwrap();
            }
        }
        while let Some(result) = set.join_next().await {
            result.unwrap().unwrap();
        }
    }

    pub async fn list_keys(&self, bucket: &str) -> Vec<String> {
        self.client
            .list_objects(bucket)
            .await
            .unwrap_or_else(|e| panic!("list_objects({bucket}) failed: {e:#}"))
            .into_iter()
            .map(|object| object.key)
            .collect()
    }
}

/// Default timeout for E2E tests (5 minutes).
pub const E2E_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(300);

/// Wraps an async E2E test body with a timeout.
///
/// Usage:
/// ```ignore
/// #[tokio::test]
/// async fn e2e_my_test() {
///     e2e_timeout!(async {
///         // test body here
///     });
/// }
/// ```
#[macro_export]
macro_rules! e2e_timeout {
    ($body:expr) => {
        tokio::time::timeout(common::E2E_TIMEOUT, $body)
            .await
            .expect("E2E test timed out")
    };
}
