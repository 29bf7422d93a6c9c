/*!
# Overview
cosclient-rs is a client library and CLI for IBM Cloud Object Storage (COS),
the S3-compatible object store of IBM Cloud.

## Features
- **IAM Tokens**: API keys are exchanged for bearer tokens lazily; concurrent
  callers share one refresh
- **Endpoint Resolution**: buckets are mapped to their regional endpoint from
  the service's endpoint topology and the bucket's location constraint
- **Bulk Deletion**: buckets are emptied with multi-object delete requests
  (up to 1000 objects each) under a fixed concurrency cap
- **Library-First**: the `cosclient` CLI is a thin wrapper over this library

## As a Library

```toml
[dependencies]
cosclient-rs = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use cosclient_rs::{Config, CosClient, create_deletion_cancellation_token};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::new("my-api-key", "crn:v1:bluemix:public:cloud-object-storage:global:a/1234::");
    let client = CosClient::new(config)?;

    let endpoint = client.endpoint_for_bucket("my-bucket").await?;
    println!("my-bucket is served by {endpoint}");

    let cancellation_token = create_deletion_cancellation_token();
    let report = client
        .delete_bucket_contents_with_cancellation("my-bucket", cancellation_token)
        .await?;
    println!("deleted {} objects in {} batches", report.deleted_objects, report.total_batches);
    Ok(())
}
```
*/

#![allow(clippy::collapsible_if)]

pub mod auth;
pub mod client;
pub mod config;
pub mod deleter;
pub mod endpoint;
pub mod http;
pub mod lister;
pub mod storage;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use client::CosClient;
pub use config::Config;
pub use config::args::{CLIArgs, parse_from_args};
pub use deleter::{BulkDeleter, MAX_BATCH_SIZE};
pub use endpoint::{BucketLocation, DeploymentType, EndpointResolver, EndpointTopology, TopologyCache};
pub use http::{HttpClient, HttpRequest, HttpResponse, ReqwestHttpClient};
pub use types::error::{CosError, exit_code_from_error, find_cos_error, is_cancelled_error};
pub use types::token::{DeletionCancellationToken, create_deletion_cancellation_token};
pub use types::{
    ApiKey, BucketEntry, BucketList, BucketMetadata, BulkDeleteReport, DeleteObjectsOutcome,
    KeyDeleteError, ObjectMetadata,
};
