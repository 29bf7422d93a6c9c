//! Client façade.
//!
//! [`CosClient`] owns one token manager, one bucket endpoint cache and a
//! handle on a (possibly shared) [`TopologyCache`]. Every operation returns
//! `anyhow::Result` with a [`CosError`](crate::CosError) at the root and the
//! operation plus resource attached as context.

use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::info;

use crate::auth::TokenManager;
use crate::config::Config;
use crate::deleter::BulkDeleter;
use crate::endpoint::{EndpointResolver, TopologyCache};
use crate::http::{HttpClient, ReqwestHttpClient};
use crate::lister::ObjectLister;
use crate::storage::StorageTrait;
use crate::storage::cos::CosStorage;
use crate::transport::Transport;
use crate::types::token::DeletionCancellationToken;
use crate::types::{
    BucketList, BucketMetadata, BulkDeleteReport, DeleteObjectsOutcome, ObjectMetadata,
};

/// IBM Cloud Object Storage client.
///
/// Cheap to clone; clones share the token, the endpoint caches and the HTTP
/// client.
///
/// ```no_run
/// # async fn example() -> anyhow::Result<()> {
/// use cosclient_rs::{Config, CosClient};
///
/// let client = CosClient::new(Config::new("my-api-key", "my-instance-crn"))?;
/// for bucket in client.list_buckets().await?.buckets {
///     println!("{} {}", bucket.name, bucket.location_constraint);
/// }
/// let report = client.delete_bucket_contents("scratch").await?;
/// println!("deleted {} objects", report.deleted_objects);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct CosClient {
    config: Config,
    storage: CosStorage,
}

impl CosClient {
    /// Build a client with its own topology cache and a reqwest HTTP client.
    pub fn new(config: Config) -> Result<Self> {
        let topology = Arc::new(TopologyCache::new(&config.endpoints_url));
        Self::with_topology_cache(config, topology)
    }

    /// Build a client that shares `topology` with other clients.
    pub fn with_topology_cache(config: Config, topology: Arc<TopologyCache>) -> Result<Self> {
        config.validate()?;
        let http: Arc<dyn HttpClient> = Arc::new(
            ReqwestHttpClient::new(&config.http_config).context("HTTP client build failed.")?,
        );
        Self::from_parts(config, http, topology)
    }

    /// Build a client on an arbitrary [`HttpClient`].
    pub fn from_parts(
        config: Config,
        http: Arc<dyn HttpClient>,
        topology: Arc<TopologyCache>,
    ) -> Result<Self> {
        config.validate()?;

        let token_manager = Arc::new(TokenManager::new(
            config.api_key.clone(),
            &config.iam_endpoint,
            config.refresh_lookahead(),
            http.clone(),
        ));
        let transport = Transport::new(http.clone(), token_manager, &config.service_instance_id);
        let resolver = Arc::new(EndpointResolver::new(topology, http));
        let storage = CosStorage::new(transport, resolver, &config.global_service_url);

        Ok(Self { config, storage })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn topology_cache(&self) -> &Arc<TopologyCache> {
        self.storage.resolver().topology_cache()
    }

    /// Drop the cached topology and every cached bucket endpoint.
    ///
    /// The topology cache may be shared, in which case the other clients
    /// refetch it too.
    pub fn reset_caches(&self) {
        self.storage.resolver().clear();
        self.topology_cache().invalidate();
    }

    /// A bearer token valid for at least the refresh lookahead.
    pub async fn ensure_valid_token(&self) -> Result<String> {
        self.storage
            .transport()
            .token_manager()
            .ensure_valid_token()
            .await
            .context("ensure_valid_token() failed.")
    }

    /// Regional base URL (`https://<host>`) for `bucket`.
    pub async fn endpoint_for_bucket(&self, bucket: &str) -> Result<String> {
        self.storage
            .endpoint_for_bucket(bucket)
            .await
            .with_context(|| format!("endpoint_for_bucket() failed. bucket: {bucket}"))
    }

    pub async fn list_buckets(&self) -> Result<BucketList> {
        self.storage
            .list_buckets()
            .await
            .context("list_buckets() failed.")
    }

    /// Create `bucket`. `deployment_type` is `cross-region`, `regional` or
    /// `single-site`; `region` a region code of that type.
    pub async fn create_bucket(
        &self,
        bucket: &str,
        deployment_type: &str,
        region: &str,
    ) -> Result<()> {
        self.storage
            .create_bucket(bucket, deployment_type, region)
            .await
            .with_context(|| format!("create_bucket() failed. bucket: {bucket}"))
    }

    pub async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.storage
            .delete_bucket(bucket)
            .await
            .with_context(|| format!("delete_bucket() failed. bucket: {bucket}"))
    }

    /// Empty `bucket`, then delete it. Nothing is deleted at the bucket
    /// level if emptying fails.
    pub async fn delete_bucket_all(&self, bucket: &str) -> Result<BulkDeleteReport> {
        let report = self.delete_bucket_contents(bucket).await?;
        self.delete_bucket(bucket).await?;
        info!(bucket = bucket, deleted_objects = report.deleted_objects, "bucket deleted.");
        Ok(report)
    }

    pub async fn bucket_exists(&self, bucket: &str) -> bool {
        self.storage.bucket_exists(bucket).await
    }

    /// Raw location response body of `bucket`.
    pub async fn get_bucket_location(&self, bucket: &str) -> Result<String> {
        self.storage
            .get_bucket_location(bucket)
            .await
            .with_context(|| format!("get_bucket_location() failed. bucket: {bucket}"))
    }

    pub async fn get_bucket_metadata(&self, bucket: &str) -> Result<BucketMetadata> {
        self.storage
            .get_bucket_metadata(bucket)
            .await
            .with_context(|| format!("get_bucket_metadata() failed. bucket: {bucket}"))
    }

    /// Every object of `bucket`, following continuation tokens.
    pub async fn list_objects(&self, bucket: &str) -> Result<Vec<ObjectMetadata>> {
        ObjectLister::new(Box::new(self.storage.clone()), bucket, self.config.max_keys)
            .list_all()
            .await
            .with_context(|| format!("list_objects() failed. bucket: {bucket}"))
    }

    pub async fn upload_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
        self.storage
            .upload_object(bucket, key, data)
            .await
            .with_context(|| format!("upload_object() failed. bucket: {bucket}, key: {key}"))
    }

    pub async fn download_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        self.storage
            .download_object(bucket, key)
            .await
            .with_context(|| format!("download_object() failed. bucket: {bucket}, key: {key}"))
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.storage
            .delete_object(bucket, key)
            .await
            .with_context(|| format!("delete_object() failed. bucket: {bucket}, key: {key}"))
    }

    /// One multi-object delete request for at most 1000 `keys`.
    pub async fn delete_objects(
        &self,
        bucket: &str,
        keys: Vec<String>,
    ) -> Result<DeleteObjectsOutcome> {
        self.storage
            .delete_objects(bucket, keys)
            .await
            .with_context(|| format!("delete_objects() failed. bucket: {bucket}"))
    }

    pub async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        self.storage
            .copy_object(src_bucket, src_key, dst_bucket, dst_key)
            .await
            .with_context(|| {
                format!(
                    "copy_object() failed. source: {src_bucket}/{src_key}, destination: {dst_bucket}/{dst_key}"
                )
            })
    }

    /// Delete every object in `bucket` with bounded concurrency.
    pub async fn delete_bucket_contents(&self, bucket: &str) -> Result<BulkDeleteReport> {
        self.bulk_deleter(bucket)
            .delete_all_contents()
            .await
            .with_context(|| format!("delete_bucket_contents() failed. bucket: {bucket}"))
    }

    /// Like [`delete_bucket_contents`](Self::delete_bucket_contents), but
    /// stops starting new batches once `token` is cancelled.
    pub async fn delete_bucket_contents_with_cancellation(
        &self,
        bucket: &str,
        token: DeletionCancellationToken,
    ) -> Result<BulkDeleteReport> {
        self.bulk_deleter(bucket)
            .with_cancellation_token(token)
            .delete_all_contents()
            .await
            .with_context(|| format!("delete_bucket_contents() failed. bucket: {bucket}"))
    }

    fn bulk_deleter(&self, bucket: &str) -> BulkDeleter {
        BulkDeleter::new(Box::new(self.storage.clone()), bucket, &self.config)
    }
}
