use std::collections::HashSet;

use anyhow::Result;
use tracing::debug;

use crate::storage::Storage;
use crate::types::ObjectMetadata;
use crate::types::error::CosError;

/// Lists every object of a bucket by following continuation tokens.
///
/// `max_keys` controls how many keys are returned per request (page size),
/// not the total number of objects listed.
pub struct ObjectLister {
    target: Storage,
    bucket: String,
    max_keys: i32,
}

impl ObjectLister {
    pub fn new(target: Storage, bucket: &str, max_keys: i32) -> Self {
        Self {
            target,
            bucket: bucket.to_string(),
            max_keys,
        }
    }

    /// All objects in listing order.
    ///
    /// Any page failure, or a continuation token the service hands out
    /// twice, is a [`CosError::ListingFailed`].
    pub async fn list_all(&self) -> Result<Vec<ObjectMetadata>> {
        debug!(bucket = %self.bucket, "list objects has started.");

        let mut objects = Vec::new();
        let mut seen_tokens = HashSet::new();
        let mut continuation_token: Option<String> = None;
        let mut page_count = 0usize;

        loop {
            let page = self
                .target
                .list_objects_page(&self.bucket, continuation_token.take(), self.max_keys)
                .await
                .map_err(|e| self.listing_failed(format!("{e:#}")))?;
            page_count += 1;
            objects.extend(page.objects);

            match page.next_continuation_token {
                None => break,
                Some(token) => {
                    if !seen_tokens.insert(token.clone()) {
                        return Err(self
                            .listing_failed(format!("continuation token repeated: {token}"))
                            .into());
                    }
                    continuation_token = Some(token);
                }
            }
        }

        debug!(
            bucket = %self.bucket,
            pages = page_count,
            objects = objects.len(),
            "list objects has been completed."
        );
        Ok(objects)
    }

    fn listing_failed(&self, message: String) -> CosError {
        CosError::ListingFailed {
            bucket: self.bucket.clone(),
            message,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use anyhow::anyhow;
    use async_trait::async_trait;

    use super::*;
    use crate::storage::StorageTrait;
    use crate::test_utils::init_dummy_tracing_subscriber;
    use crate::types::error::find_cos_error;
    use crate::types::{DeleteObjectsOutcome, ObjectListPage};

    /// Mock storage serving pre-built pages and recording the tokens it
    /// was called with.
    #[derive(Clone)]
    struct PagedStorage {
        pages: Vec<ObjectListPage>,
        fail_on_page: Option<usize>,
        tokens: Arc<Mutex<Vec<Option<String>>>>,
    }

    impl PagedStorage {
        fn new(pages: Vec<ObjectListPage>) -> Self {
            Self {
                pages,
                fail_on_page: None,
                tokens: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    fn page(keys: &[&str], next: Option<&str>) -> ObjectListPage {
        ObjectListPage {
            objects: keys
                .iter()
                .map(|key| ObjectMetadata {
                    key: key.to_string(),
                    last_modified: "2020-04-25T12:06:55.310Z".to_string(),
                    size: 11,
                })
                .collect(),
            next_continuation_token: next.map(str::to_string),
        }
    }

    #[async_trait]
    impl StorageTrait for PagedStorage {
        async fn list_objects_page(
            &self,
            _bucket: &str,
            continuation_token: Option<String>,
            max_keys: i32,
        ) -> Result<ObjectListPage> {
            assert_eq!(max_keys, 2);
            let mut tokens = self.tokens.lock().unwrap();
            let index = tokens.len();
            tokens.push(continuation_token);
            if self.fail_on_page == Some(index) {
                return Err(anyhow!(CosError::Transport {
                    status: Some(503),
                    reason: "Service Unavailable".to_string(),
                    body: String::new(),
                }));
            }
            Ok(self.pages[index].clone())
        }

        async fn delete_objects(
            &self,
            _bucket: &str,
            _keys: Vec<String>,
        ) -> Result<DeleteObjectsOutcome> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn follows_continuation_tokens_in_order() {
        init_dummy_tracing_subscriber();

        let storage = PagedStorage::new(vec![
            page(&["a", "b"], Some("t1")),
            page(&["c", "d"], Some("t2")),
            page(&["e"], None),
        ]);
        let tokens = storage.tokens.clone();
        let lister = ObjectLister::new(Box::new(storage), "dugs", 2);

        let objects = lister.list_all().await.unwrap();
        let keys: Vec<&str> = objects.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(
            *tokens.lock().unwrap(),
            vec![None, Some("t1".to_string()), Some("t2".to_string())]
        );
    }

    #[tokio::test]
    async fn empty_bucket_lists_nothing() {
        init_dummy_tracing_subscriber();

        let lister = ObjectLister::new(Box::new(PagedStorage::new(vec![page(&[], None)])), "dugs", 2);
        assert!(lister.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn page_failure_is_listing_failure() {
        init_dummy_tracing_subscriber();

        let mut storage = PagedStorage::new(vec![page(&["a", "b"], Some("t1"))]);
        storage.fail_on_page = Some(1);
        let lister = ObjectLister::new(Box::new(storage), "dugs", 2);

        let err = lister.list_all().await.unwrap_err();
        assert!(matches!(
            find_cos_error(&err),
            Some(CosError::ListingFailed { bucket, message })
                if bucket == "dugs" && message.contains("503")
        ));
    }

    #[tokio::test]
    async fn repeated_token_stops_listing() {
        init_dummy_tracing_subscriber();

        let storage = PagedStorage::new(vec![
            page(&["a"], Some("loop")),
            page(&["b"], Some("loop")),
        ]);
        let lister = ObjectLister::new(Box::new(storage), "dugs", 2);

        let err = lister.list_all().await.unwrap_err();
        assert!(matches!(
            find_cos_error(&err),
            Some(CosError::ListingFailed { message, .. }) if message.contains("repeated")
        ));
    }
}
