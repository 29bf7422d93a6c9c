//! Bulk deletion of a bucket's contents.
//!
//! [`BulkDeleter`] lists the bucket, splits the keys into batches and feeds
//! them to a fixed pool of workers over an MPMC channel. Each worker sends
//! one multi-object delete at a time, so at most `worker_size` requests are
//! in flight. Outcomes are recorded per batch index, which makes the reported
//! error independent of completion order.

use std::fmt;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::lister::ObjectLister;
use crate::storage::Storage;
use crate::types::BulkDeleteReport;
use crate::types::error::CosError;
use crate::types::token::DeletionCancellationToken;

pub mod batch;

pub use batch::{BatchOutcome, MAX_BATCH_SIZE, partition_into_batches};

/// Coordinator state, logged on every transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionPhase {
    Listing,
    Batching,
    Draining { batches: usize, workers: usize },
    Done,
    Failed,
}

impl fmt::Display for DeletionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletionPhase::Listing => f.write_str("listing"),
            DeletionPhase::Batching => f.write_str("batching"),
            DeletionPhase::Draining { batches, workers } => {
                write!(f, "draining({batches} batches, {workers} workers)")
            }
            DeletionPhase::Done => f.write_str("done"),
            DeletionPhase::Failed => f.write_str("failed"),
        }
    }
}

/// Deletes every object of one bucket with bounded concurrency.
pub struct BulkDeleter {
    target: Storage,
    bucket: String,
    worker_size: usize,
    batch_size: usize,
    max_keys: i32,
    cancellation_token: Option<DeletionCancellationToken>,
}

impl BulkDeleter {
    pub fn new(target: Storage, bucket: &str, config: &Config) -> Self {
        Self {
            target,
            bucket: bucket.to_string(),
            worker_size: config.worker_size.max(1) as usize,
            batch_size: (config.batch_size as usize).clamp(1, MAX_BATCH_SIZE),
            max_keys: config.max_keys,
            cancellation_token: None,
        }
    }

    /// Skip batches that have not started once `token` is cancelled.
    pub fn with_cancellation_token(mut self, token: DeletionCancellationToken) -> Self {
        self.cancellation_token = Some(token);
        self
    }

    /// Delete every object in the bucket.
    ///
    /// Waits for all started batches to finish. If any batch failed, the
    /// error names the lowest-numbered failed batch. If none failed but the
    /// deletion was cancelled, the error is [`CosError::Cancelled`].
    pub async fn delete_all_contents(&self) -> Result<BulkDeleteReport> {
        self.enter(DeletionPhase::Listing);
        let lister = ObjectLister::new(self.target.clone(), &self.bucket, self.max_keys);
        let objects = match lister.list_all().await {
            Ok(objects) => objects,
            Err(e) => {
                self.enter(DeletionPhase::Failed);
                return Err(e);
            }
        };

        if objects.is_empty() {
            info!(bucket = %self.bucket, "bucket is already empty.");
            self.enter(DeletionPhase::Done);
            return Ok(BulkDeleteReport::default());
        }

        self.enter(DeletionPhase::Batching);
        let total_objects = objects.len();
        let keys: Vec<String> = objects.into_iter().map(|object| object.key).collect();
        let batches = partition_into_batches(keys, self.batch_size);
        let total_batches = batches.len();

        let outcomes = self.drain(batches).await;
        let report = summarize(total_objects, &outcomes);

        let first_failure = outcomes.iter().enumerate().find_map(|(index, outcome)| match outcome {
            BatchOutcome::Failed(message) => Some((index, message.clone())),
            _ => None,
        });

        if let Some((index, message)) = first_failure {
            self.enter(DeletionPhase::Failed);
            warn!(
                bucket = %self.bucket,
                total_batches,
                failed_batches = report.failed_batches,
                deleted_objects = report.deleted_objects,
                "bulk deletion finished with failed batches, some objects may remain."
            );
            return Err(CosError::BatchDeleteFailed {
                batch_number: index + 1,
                total_batches,
                failed_batches: report.failed_batches,
                message,
            }
            .into());
        }

        if report.skipped_batches > 0 {
            self.enter(DeletionPhase::Failed);
            info!(
                bucket = %self.bucket,
                skipped_batches = report.skipped_batches,
                deleted_objects = report.deleted_objects,
                "bulk deletion cancelled."
            );
            return Err(CosError::Cancelled.into());
        }

        self.enter(DeletionPhase::Done);
        info!(
            bucket = %self.bucket,
            total_objects,
            total_batches,
            deleted_objects = report.deleted_objects,
            "bulk deletion completed."
        );
        Ok(report)
    }

    /// Run every batch through the worker pool and collect one outcome per
    /// batch, in batch order.
    async fn drain(&self, batches: Vec<Vec<String>>) -> Vec<BatchOutcome> {
        let total_batches = batches.len();
        let worker_count = self.worker_size.min(total_batches);
        self.enter(DeletionPhase::Draining {
            batches: total_batches,
            workers: worker_count,
        });

        let outcomes: Arc<Mutex<Vec<Option<BatchOutcome>>>> =
            Arc::new(Mutex::new(vec![None; total_batches]));
        let (sender, receiver) = async_channel::bounded::<(usize, Vec<String>)>(worker_count);

        let mut workers = JoinSet::new();
        for worker_index in 0..worker_count {
            let receiver = receiver.clone();
            let target = self.target.clone();
            let bucket = self.bucket.clone();
            let outcomes = outcomes.clone();
            let cancellation_token = self.cancellation_token.clone();

            workers.spawn(async move {
                debug!(worker_index, "delete worker started.");
                while let Ok((batch_index, keys)) = receiver.recv().await {
                    let outcome = if cancellation_token
                        .as_ref()
                        .is_some_and(|token| token.is_cancelled())
                    {
                        BatchOutcome::Skipped
                    } else {
                        batch::delete_batch(&target, &bucket, batch_index, keys).await
                    };
                    outcomes.lock().unwrap_or_else(|e| e.into_inner())[batch_index] =
                        Some(outcome);
                }
                debug!(worker_index, "delete worker has been completed.");
            });
        }
        drop(receiver);

        for (batch_index, keys) in batches.into_iter().enumerate() {
            if self.is_cancelled() {
                info!(
                    bucket = %self.bucket,
                    next_batch = batch_index + 1,
                    "bulk deletion cancelled, no further batches will start."
                );
                break;
            }
            if sender.send((batch_index, keys)).await.is_err() {
                // every worker is gone
                break;
            }
        }
        // close the channel so workers exit once it drains
        drop(sender);

        while let Some(join_result) = workers.join_next().await {
            if let Err(e) = join_result {
                error!(bucket = %self.bucket, "delete worker task panicked: {}", e);
            }
        }

        let cancelled = self.is_cancelled();
        let mut slots = outcomes.lock().unwrap_or_else(|e| e.into_inner());
        slots
            .drain(..)
            .map(|slot| match slot {
                Some(outcome) => outcome,
                None if cancelled => BatchOutcome::Skipped,
                None => BatchOutcome::Failed("batch was not processed".to_string()),
            })
            .collect()
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation_token
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }

    fn enter(&self, phase: DeletionPhase) {
        debug!(bucket = %self.bucket, phase = %phase, "bulk deletion phase.");
    }
}

fn summarize(total_objects: usize, outcomes: &[BatchOutcome]) -> BulkDeleteReport {
    let mut report = BulkDeleteReport {
        total_objects,
        total_batches: outcomes.len(),
        ..BulkDeleteReport::default()
    };
    for outcome in outcomes {
        match outcome {
            BatchOutcome::Deleted(count) => {
                report.succeeded_batches += 1;
                report.deleted_objects += count;
            }
            BatchOutcome::Failed(_) => report.failed_batches += 1,
            BatchOutcome::Skipped => report.skipped_batches += 1,
        }
    }
    report
}

mod deleter_properties;
