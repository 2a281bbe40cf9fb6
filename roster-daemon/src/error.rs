use std::path::PathBuf;

use thiserror::Error;

/// Error surface for the change feed and the daemon runtime.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed change message {path}: {source}")]
    Message {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("store error: {0}")]
    Store(#[from] roster_core::CoreError),

    #[error("master store error: {0}")]
    Source(#[from] roster_source::SourceError),

    #[error("sync error: {0}")]
    Sync(#[from] roster_sync::SyncError),

    #[error("channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("task failed: {0}")]
    Join(String),
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
