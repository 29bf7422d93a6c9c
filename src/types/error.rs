use anyhow::Error;
use thiserror::Error;

/// Error taxonomy for cosclient-rs.
///
/// Library operations return `anyhow::Result` with a `CosError` as the root
/// cause and the failing operation/resource attached as context. Use
/// [`find_cos_error`] to recover the variant from an `anyhow::Error`.
///
/// ## Exit Codes
///
/// Each variant maps to an exit code (via `exit_code()`):
/// - 0: Cancelled
/// - 1: General errors (auth, topology, endpoint, transport, listing)
/// - 2: Configuration errors (InvalidConfig, UnknownDeploymentType, UnknownRegion)
/// - 3: Partial failure (some batches of a bulk deletion failed)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CosError {
    /// The IAM token exchange failed (network, malformed response or an
    /// error message reported by the identity service).
    #[error("IAM token exchange failed: {0}")]
    AuthExchangeFailed(String),

    /// The endpoint topology could not be fetched or decoded.
    #[error("endpoint topology fetch failed: {0}")]
    TopologyFetchFailed(String),

    /// The bucket is not present in the account's bucket listing.
    #[error("can't find bucket: {0}")]
    BucketNotFound(String),

    /// The bucket's location constraint does not have a known shape.
    #[error("can't parse location constraint: {0:?}")]
    LocationParseFailed(String),

    /// The topology has no public endpoint for the derived location.
    #[error("can't find endpoint for {deployment_type}/{region}")]
    EndpointNotFound {
        deployment_type: String,
        region: String,
    },

    /// Listing the objects of a bucket failed.
    #[error("listing objects of bucket {bucket} failed: {message}")]
    ListingFailed { bucket: String, message: String },

    /// At least one batch of a bulk deletion failed. `batch_number` is the
    /// 1-based index of the lowest-numbered failed batch.
    #[error(
        "batch delete failed for batch {batch_number} of {total_batches} \
         ({failed_batches} failed, some objects may remain): {message}"
    )]
    BatchDeleteFailed {
        batch_number: usize,
        total_batches: usize,
        failed_batches: usize,
        message: String,
    },

    /// Non-2xx response or network-level failure. `status` is `None` when no
    /// response was received.
    #[error("{}", format_transport_error(.status, .reason, .body))]
    Transport {
        status: Option<u16>,
        reason: String,
        body: String,
    },

    /// The service returned a body that could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error (non-retryable).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Unknown deployment type requested for bucket creation.
    #[error("unknown type of region {requested:?} (can be: {valid})")]
    UnknownDeploymentType { requested: String, valid: String },

    /// Unknown region requested for bucket creation.
    #[error("unknown region {requested:?} (can be: {valid})")]
    UnknownRegion { requested: String, valid: String },

    /// Operation cancelled before completion.
    #[error("operation cancelled")]
    Cancelled,
}

fn format_transport_error(status: &Option<u16>, reason: &str, body: &str) -> String {
    let head = match *status {
        Some(code) if reason.is_empty() => code.to_string(),
        Some(code) => format!("{code} {reason}"),
        None => reason.to_string(),
    };
    if body.is_empty() {
        head
    } else {
        format!("{head}: {body}")
    }
}

impl CosError {
    /// Get the appropriate process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CosError::Cancelled => 0,
            CosError::InvalidConfig(_)
            | CosError::UnknownDeploymentType { .. }
            | CosError::UnknownRegion { .. } => 2,
            CosError::BatchDeleteFailed { .. } => 3,
            _ => 1,
        }
    }

    /// Whether a caller could reasonably retry the failed operation.
    ///
    /// Nothing in this crate retries on its own; this only classifies.
    pub fn is_retryable(&self) -> bool {
        match self {
            CosError::Transport { status: None, .. } => true,
            CosError::Transport {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            CosError::AuthExchangeFailed(_) | CosError::TopologyFetchFailed(_) => true,
            _ => false,
        }
    }

    /// HTTP status of a transport error, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            CosError::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

/// Find the first `CosError` in the cause chain of an `anyhow::Error`.
pub fn find_cos_error(e: &Error) -> Option<&CosError> {
    e.downcast_ref::<CosError>()
        .or_else(|| e.chain().find_map(|cause| cause.downcast_ref::<CosError>()))
}

/// Check if an anyhow::Error wraps a cancellation error.
pub fn is_cancelled_error(e: &Error) -> bool {
    matches!(find_cos_error(e), Some(CosError::Cancelled))
}

/// Extract the exit code from an anyhow::Error, defaulting to 1.
pub fn exit_code_from_error(e: &Error) -> i32 {
    find_cos_error(e).map_or(1, CosError::exit_code)
}
