/*!
# Error Module

This module defines the error handling infrastructure for crystalball.

Every failure the preview engine can report is detected synchronously,
before a single fit result is produced:
- Malformed magnitude/unit input (storage sizes, job durations)
- Incomplete job requests (no cores, neither memory nor disk, no jobs)
- Raw slot records that lack a required attribute
- Catalog snapshots that cannot be read back
- Failures of the external slot-query command

An empty catalog, or a request that fits nowhere, is not an error; it is
reported through the preview result itself.
*/

use thiserror::Error;

/// Result type alias for crystalball operations
pub type Result<T> = std::result::Result<T, CrystalBallError>;

/// Errors that can occur during crystalball operations
#[derive(Debug, Error)]
pub enum CrystalBallError {
    #[error("Invalid storage value given: {0}")]
    InvalidStorage(String),

    #[error("Invalid time value given: {0}")]
    InvalidDuration(String),

    #[error("Incomplete job request: {0}")]
    IncompleteRequest(String),

    #[error("Malformed slot record: {0}")]
    MalformedSlotRecord(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Collector error: {0}")]
    Collector(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
