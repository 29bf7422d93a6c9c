use std::fmt;
use std::fmt::{Debug, Formatter};

use serde::{Deserialize, Serialize};
use zeroize_derive::{Zeroize, ZeroizeOnDrop};

pub mod error;
pub mod token;

/// IBM Cloud API key with secure zeroization.
///
/// The key is cleared from memory when dropped and never printed by `Debug`.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct ApiKey {
    key: String,
}

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    pub fn expose(&self) -> &str {
        &self.key
    }

    pub fn is_empty(&self) -> bool {
        self.key.is_empty()
    }
}

impl Debug for ApiKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("key", &"** redacted **")
            .finish()
    }
}

/// Owner of a bucket listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Owner {
    pub id: String,
    pub display_name: String,
}

/// One bucket in the account's extended bucket listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BucketEntry {
    pub name: String,
    pub creation_date: String,
    pub location_constraint: String,
}

/// Result of `list_buckets`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BucketList {
    pub owner: Owner,
    pub buckets: Vec<BucketEntry>,
}

impl BucketList {
    pub fn find(&self, name: &str) -> Option<&BucketEntry> {
        self.buckets.iter().find(|bucket| bucket.name == name)
    }
}

/// A listed object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ObjectMetadata {
    pub key: String,
    pub last_modified: String,
    pub size: u64,
}

/// One page of an object listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectListPage {
    pub objects: Vec<ObjectMetadata>,
    /// Cursor for the next page; `None` when the listing is complete.
    pub next_continuation_token: Option<String>,
}

/// Bucket metadata from the resource configuration API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketMetadata {
    pub name: String,
    pub service_instance_id: String,
    pub time_created: String,
    pub time_updated: String,
    pub object_count: u64,
    pub bytes_used: u64,
    pub crn: String,
    pub service_instance_crn: String,
}

/// A key the service refused to delete inside a multi-object delete.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyDeleteError {
    pub key: String,
    pub code: String,
    pub message: String,
}

/// Parsed result of one multi-object delete request.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeleteObjectsOutcome {
    pub deleted: usize,
    pub errors: Vec<KeyDeleteError>,
}

/// Summary of a completed bulk deletion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkDeleteReport {
    pub total_objects: usize,
    pub total_batches: usize,
    pub succeeded_batches: usize,
    pub failed_batches: usize,
    pub skipped_batches: usize,
    pub deleted_objects: usize,
}
