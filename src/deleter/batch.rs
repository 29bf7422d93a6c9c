//! Batch deletion using the multi-object delete API.
//!
//! Keys are grouped into contiguous batches of at most 1000 and each batch
//! is sent as one request.

use tracing::{debug, warn};

use crate::storage::Storage;
use crate::types::DeleteObjectsOutcome;

/// Maximum objects per multi-object delete request (service limit).
pub const MAX_BATCH_SIZE: usize = 1000;

/// Split `keys` into contiguous batches of at most `batch_size` keys,
/// preserving order. `batch_size` is clamped to `1..=MAX_BATCH_SIZE`.
pub fn partition_into_batches(keys: Vec<String>, batch_size: usize) -> Vec<Vec<String>> {
    let batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
    let mut batches = Vec::with_capacity(keys.len().div_ceil(batch_size));
    let mut keys = keys.into_iter().peekable();
    while keys.peek().is_some() {
        batches.push(keys.by_ref().take(batch_size).collect());
    }
    batches
}

/// What happened to one batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Deleted(usize),
    Failed(String),
    /// Never started because the deletion was cancelled.
    Skipped,
}

/// Send one batch and classify the result.
///
/// Keys the service refused individually fail the whole batch; the other
/// keys of that batch are still gone.
pub(crate) async fn delete_batch(
    target: &Storage,
    bucket: &str,
    batch_index: usize,
    keys: Vec<String>,
) -> BatchOutcome {
    let batch_len = keys.len();
    debug!(batch_index, batch_size = batch_len, "sending multi-object delete batch.");

    match target.delete_objects(bucket, keys).await {
        Ok(outcome) => classify(batch_index, outcome),
        Err(e) => {
            warn!(batch_index, batch_size = batch_len, error = %format!("{e:#}"), "batch delete failed.");
            BatchOutcome::Failed(format!("{e:#}"))
        }
    }
}

fn classify(batch_index: usize, outcome: DeleteObjectsOutcome) -> BatchOutcome {
    let Some(first) = outcome.errors.first() else {
        debug!(batch_index, deleted = outcome.deleted, "batch delete completed.");
        return BatchOutcome::Deleted(outcome.deleted);
    };

    for error in &outcome.errors {
        warn!(
            batch_index,
            key = %error.key,
            code = %error.code,
            message = %error.message,
            "multi-object delete partial failure."
        );
    }

    BatchOutcome::Failed(format!(
        "{} of {} keys not deleted, first {:?}: {} ({})",
        outcome.errors.len(),
        outcome.errors.len() + outcome.deleted,
        first.key,
        first.code,
        first.message,
    ))
}
