//! Object storage REST operations.
//!
//! Every bucket-level call resolves the bucket's regional endpoint first.
//! Bucket listing and existence checks go to the global service URL.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info};

use crate::endpoint::{BucketLister, EndpointResolver};
use crate::http::Method;
use crate::storage::StorageTrait;
use crate::transport::{Scope, Transport};
use crate::types::error::CosError;
use crate::types::{BucketList, BucketMetadata, DeleteObjectsOutcome, ObjectListPage};

pub mod models;

pub use models::{build_delete_body, content_md5};

const CONFIG_API_HOST: &str = "config.cloud-object-storage.cloud.ibm.com";
const CONFIG_API_TEST_HOST: &str = "config.cloud-object-storage.test.cloud.ibm.com";

/// Percent-encode an object key one path segment at a time.
pub fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Resource configuration URL for `bucket`, on the test host when the
/// bucket's endpoint is a test endpoint.
pub fn bucket_metadata_url(endpoint: &str, bucket: &str) -> String {
    let host = if endpoint.contains(".test.") {
        CONFIG_API_TEST_HOST
    } else {
        CONFIG_API_HOST
    };
    format!("https://{host}/v1/b/{bucket}")
}

/// `https://<bucket>.<host>` for virtual-host-style addressing.
pub fn virtual_host_url(endpoint: &str, bucket: &str) -> Result<String> {
    let mut url = url::Url::parse(endpoint)
        .map_err(|e| CosError::InvalidResponse(format!("bad endpoint {endpoint:?}: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| CosError::InvalidResponse(format!("endpoint {endpoint:?} has no host")))?
        .to_string();
    url.set_host(Some(&format!("{bucket}.{host}")))
        .map_err(|e| CosError::InvalidResponse(format!("bad virtual host for {bucket:?}: {e}")))?;
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Client-side view of the object storage service.
#[derive(Clone, Debug)]
pub struct CosStorage {
    transport: Transport,
    resolver: Arc<EndpointResolver>,
    global_service_url: String,
}

impl CosStorage {
    pub fn new(
        transport: Transport,
        resolver: Arc<EndpointResolver>,
        global_service_url: &str,
    ) -> Self {
        Self {
            transport,
            resolver,
            global_service_url: global_service_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn resolver(&self) -> &Arc<EndpointResolver> {
        &self.resolver
    }

    /// Regional base URL for `bucket`.
    pub async fn endpoint_for_bucket(&self, bucket: &str) -> Result<String> {
        self.resolver.resolve(bucket, self).await
    }

    async fn bucket_url(&self, bucket: &str) -> Result<String> {
        Ok(format!("{}/{bucket}", self.endpoint_for_bucket(bucket).await?))
    }

    async fn object_url(&self, bucket: &str, key: &str) -> Result<String> {
        Ok(format!("{}/{}", self.bucket_url(bucket).await?, encode_key(key)))
    }

    pub async fn list_buckets(&self) -> Result<BucketList> {
        let url = format!("{}?extended", self.global_service_url);
        let body = self
            .transport
            .request(Method::GET, &url, Bytes::new(), &[], Scope::Instance)
            .await?;
        Ok(models::parse_bucket_list(&body)?)
    }

    /// Create `bucket` in the given deployment type and region, both named
    /// as in the endpoint topology (e.g. `regional` / `us-south`).
    pub async fn create_bucket(
        &self,
        bucket: &str,
        deployment_type: &str,
        region: &str,
    ) -> Result<()> {
        let topology = self
            .resolver
            .topology_cache()
            .get_or_fetch(self.transport.http().as_ref())
            .await?;
        let endpoint = topology.creation_endpoint(deployment_type, region)?;

        info!(
            bucket = bucket,
            deployment_type = deployment_type,
            region = region,
            endpoint = %endpoint,
            "creating bucket."
        );

        self.transport
            .request(
                Method::PUT,
                &format!("{endpoint}/{bucket}"),
                Bytes::new(),
                &[],
                Scope::Instance,
            )
            .await?;
        Ok(())
    }

    pub async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let url = self.bucket_url(bucket).await?;
        self.transport
            .request(Method::DELETE, &url, Bytes::new(), &[], Scope::Bucket)
            .await?;
        self.resolver.invalidate(bucket);
        Ok(())
    }

    /// `HEAD` on the global service URL. Any failure reads as "absent".
    pub async fn bucket_exists(&self, bucket: &str) -> bool {
        let url = format!("{}/{bucket}", self.global_service_url);
        match self
            .transport
            .request(Method::HEAD, &url, Bytes::new(), &[], Scope::Bucket)
            .await
        {
            Ok(_) => true,
            Err(e) => {
                debug!(bucket = bucket, error = %format!("{e:#}"), "bucket does not exist.");
                false
            }
        }
    }

    /// Raw `?location` response body.
    pub async fn get_bucket_location(&self, bucket: &str) -> Result<String> {
        let url = format!("{}?location", self.bucket_url(bucket).await?);
        let body = self
            .transport
            .request(Method::GET, &url, Bytes::new(), &[], Scope::Bucket)
            .await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    pub async fn get_bucket_metadata(&self, bucket: &str) -> Result<BucketMetadata> {
        let endpoint = self.endpoint_for_bucket(bucket).await?;
        let url = bucket_metadata_url(&endpoint, bucket);
        let body = self
            .transport
            .request(Method::GET, &url, Bytes::new(), &[], Scope::Bucket)
            .await?;
        let metadata = serde_json::from_slice(&body).map_err(|e| {
            CosError::InvalidResponse(format!("error parsing bucket metadata: {e}"))
        })?;
        Ok(metadata)
    }

    pub async fn upload_object(&self, bucket: &str, key: &str, data: Bytes) -> Result<()> {
        let url = self.object_url(bucket, key).await?;
        self.transport
            .request(Method::PUT, &url, data, &[], Scope::Bucket)
            .await?;
        Ok(())
    }

    pub async fn download_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let url = self.object_url(bucket, key).await?;
        self.transport
            .request(Method::GET, &url, Bytes::new(), &[], Scope::Bucket)
            .await
    }

    pub async fn delete_object(&self, bucket: &str, key: &str) -> Result<()> {
        let url = self.object_url(bucket, key).await?;
        self.transport
            .request(Method::DELETE, &url, Bytes::new(), &[], Scope::Bucket)
            .await?;
        Ok(())
    }

    /// Server-side copy into `dst_bucket`, addressed virtual-host style.
    pub async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> Result<()> {
        let endpoint = self.endpoint_for_bucket(dst_bucket).await?;
        let url = format!(
            "{}/{}",
            virtual_host_url(&endpoint, dst_bucket)?,
            encode_key(dst_key)
        );
        let copy_source = format!("/{src_bucket}/{}", encode_key(src_key));

        self.transport
            .request(
                Method::PUT,
                &url,
                Bytes::new(),
                &[("X-Amz-Copy-Source", copy_source)],
                Scope::Instance,
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BucketLister for CosStorage {
    async fn list_buckets(&self) -> Result<BucketList> {
        CosStorage::list_buckets(self).await
    }
}

#[async_trait]
impl StorageTrait for CosStorage {
    async fn list_objects_page(
        &self,
        bucket: &str,
        continuation_token: Option<String>,
        max_keys: i32,
    ) -> Result<ObjectListPage> {
        let mut url = format!(
            "{}?list-type=2&encoding-type=url&max-keys={max_keys}",
            self.bucket_url(bucket).await?
        );
        if let Some(token) = continuation_token {
            url.push_str("&continuation-token=");
            url.push_str(&urlencoding::encode(&token));
        }

        let body = self
            .transport
            .request(Method::GET, &url, Bytes::new(), &[], Scope::Bucket)
            .await?;
        Ok(models::parse_object_list_page(&body)?)
    }

    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<DeleteObjectsOutcome> {
        let url = format!("{}?delete", self.bucket_url(bucket).await?);
        let body = build_delete_body(&keys);
        let md5 = content_md5(body.as_bytes());

        debug!(bucket = bucket, keys = keys.len(), "sending multi-object delete request.");

        let response = self
            .transport
            .request(
                Method::POST,
                &url,
                Bytes::from(body),
                &[
                    ("Content-MD5", md5),
                    ("Content-Type", "application/xml".to_string()),
                ],
                Scope::Bucket,
            )
            .await
            .context("multi-object delete request failed.")?;

        Ok(models::parse_delete_result(&response, keys.len())?)
    }
}
