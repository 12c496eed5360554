//! Storage error types for pipeworks-storage.
//!
//! Unlike structural problems (which the core repairs and reports), I/O and
//! format failures are real errors: they propagate to the caller and are
//! never recovered internally.

use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// File could not be read or written.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The core rejected the project structure outright (not a repairable
    /// inconsistency).
    #[error(transparent)]
    Core(#[from] pipeworks_core::CoreError),
}
