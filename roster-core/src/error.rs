//! Error types for roster-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors from settings loading and file-backed stores.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Underlying I/O failure, with the path that was being accessed.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON store content could not be parsed or serialized.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Settings YAML could not be parsed — includes serde_yaml's line context.
    #[error("failed to parse settings at {path}: {source}")]
    Settings {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None` — cannot locate `~/.roster/`.
    #[error("cannot determine home directory; set $HOME or pass --config")]
    HomeNotFound,

    /// A required file did not exist.
    #[error("not found: {path}")]
    NotFound { path: PathBuf },
}

/// Convenience constructor for [`CoreError::Io`].
pub fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> CoreError {
    CoreError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`CoreError::Json`].
pub fn json_err(path: impl Into<PathBuf>, source: serde_json::Error) -> CoreError {
    CoreError::Json {
        path: path.into(),
        source,
    }
}
