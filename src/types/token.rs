/// A cancellation token used to stop a bulk deletion.
///
/// This is a type alias for [`tokio_util::sync::CancellationToken`]. Pass the
/// token to [`CosClient::delete_bucket_contents_with_cancellation`](crate::CosClient::delete_bucket_contents_with_cancellation)
/// and call [`cancel()`](tokio_util::sync::CancellationToken::cancel) on it
/// (e.g., in a Ctrl+C handler). Batches that have not started are skipped;
/// batches already in flight run to completion.
pub type DeletionCancellationToken = tokio_util::sync::CancellationToken;

/// Create a new [`DeletionCancellationToken`].
///
/// # Example
///
/// ```
/// use cosclient_rs::create_deletion_cancellation_token;
///
/// let token = create_deletion_cancellation_token();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
pub fn create_deletion_cancellation_token() -> DeletionCancellationToken {
    tokio_util::sync::CancellationToken::new()
}
