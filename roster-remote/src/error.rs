//! Error types for roster-remote.

use thiserror::Error;

/// Failures talking to the remote directory.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Connection, TLS, timeout or body-read failure.
    #[error("transport error on {method} {url}: {message}")]
    Transport {
        method: &'static str,
        url: String,
        message: String,
    },

    /// The directory answered with a non-success status.
    #[error("{method} {url} failed with status {status}: {reason}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        reason: String,
    },

    /// The response body was not the expected JSON.
    #[error("unexpected response body from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The addressed entity does not exist remotely.
    #[error("not found: {url}")]
    NotFound { url: String },
}
