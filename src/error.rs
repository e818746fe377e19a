//! Error types for the vertical cache

use std::time::Duration;

use thiserror::Error;

use crate::types::BundleKey;

/// Main error type for the cache
#[derive(Error, Debug)]
pub enum Error {
    /// Persistence backend error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// An archive update disagrees with the step or size of its segment
    #[error(
        "Segment {key} mismatch: segment has step {expected_step:?} size {expected_size}, \
         update has step {step:?} size {size}"
    )]
    SegmentMismatch {
        /// Bundle partition the update was routed to
        key: BundleKey,
        /// Step recorded by the segment
        expected_step: Duration,
        /// Size recorded by the segment
        expected_size: i64,
        /// Step claimed by the update
        step: Duration,
        /// Size claimed by the update
        size: i64,
    },

    /// An archive update carries a shape the cache cannot slot
    #[error("Invalid archive {key}: {reason}")]
    InvalidArchive {
        /// Bundle partition the update was routed to
        key: BundleKey,
        /// What is wrong with it
        reason: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by a persistence backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The backend failed to apply a batch
    #[error("Backend error: {0}")]
    Backend(String),

    /// The backend is not reachable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    /// The batch itself is malformed (e.g. values and versions disagree)
    #[error("Invalid batch: {0}")]
    InvalidBatch(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
