use anyhow::Result;
use async_trait::async_trait;
use dyn_clone::DynClone;

use crate::types::{DeleteObjectsOutcome, ObjectListPage};

pub mod cos;

/// Type alias for a boxed Storage trait object.
pub type Storage = Box<dyn StorageTrait + Send + Sync>;

/// Storage operations the bulk deletion coordinator depends on.
///
/// Methods:
/// - `list_objects_page`: one page of a bucket listing
/// - `delete_objects`: one multi-object delete request
#[async_trait]
pub trait StorageTrait: DynClone {
    /// List one page of objects, starting after `continuation_token`.
    ///
    /// The returned page carries the token for the next page, or `None`
    /// once the listing is complete.
    async fn list_objects_page(
        &self,
        bucket: &str,
        continuation_token: Option<String>,
        max_keys: i32,
    ) -> Result<ObjectListPage>;

    /// Delete multiple objects in a single request.
    ///
    /// The caller is responsible for batching into groups of at most 1000.
    /// Keys the service refused individually are reported in the outcome,
    /// not as an error.
    async fn delete_objects(&self, bucket: &str, keys: Vec<String>) -> Result<DeleteObjectsOutcome>;
}

dyn_clone::clone_trait_object!(StorageTrait);
