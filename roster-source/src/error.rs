//! Error types for roster-source.

use thiserror::Error;

use roster_core::CoreError;

/// Errors raised while reading the master stores.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The snapshot file could not be read or parsed.
    #[error("master store error: {0}")]
    Store(#[from] CoreError),
}
