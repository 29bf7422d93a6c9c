// Ctrl+C signal handler.
//
// Waits for either the deletion finishing (token cancelled by the caller)
// or Ctrl+C, which cancels the token so no further batches start.

use cosclient_rs::DeletionCancellationToken;
use tokio::task::JoinHandle;
use tokio::{select, signal};
use tracing::{debug, warn};

pub fn spawn_ctrl_c_handler(cancellation_token: DeletionCancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        select! {
            _ = cancellation_token.cancelled() => {
                debug!("cancellation_token canceled.")
            }
            _ = signal::ctrl_c() => {
                warn!("ctrl-c received, in-flight batches will finish and no new batches will start.");
                cancellation_token.cancel();
            }
        }
    })
}
