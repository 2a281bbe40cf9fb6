//! Error types for roster-sync.
//!
//! [`ReconcileError`] is per identity and never aborts a batch;
//! [`SyncError`] is per pass (a store could not be opened at all).

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use roster_core::{CoreError, ExternalId, RemoteId};
use roster_remote::RemoteError;
use roster_source::SourceError;

/// Operator-facing failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Network or store failure; retried on the next pass.
    Transient,
    /// Missing required field or invalid archived id; record skipped.
    DataIntegrity,
    /// Remote state the archive cannot describe; needs manual cleanup.
    InconsistentState,
    /// Location does not resolve to a remote location id.
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCategory::Transient => "transient",
            ErrorCategory::DataIntegrity => "data integrity",
            ErrorCategory::InconsistentState => "inconsistent state",
            ErrorCategory::Configuration => "configuration",
        };
        f.write_str(label)
    }
}

/// Failure reconciling one identity.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("{external_id}: required field `{field}` is empty")]
    MissingField {
        external_id: ExternalId,
        field: &'static str,
    },

    #[error("{external_id}: archived remote id {remote_id} is not usable")]
    InvalidRemoteId {
        external_id: ExternalId,
        remote_id: RemoteId,
    },

    #[error("{external_id}: location code {code:?} does not resolve to a remote location")]
    UnresolvedLocation { external_id: ExternalId, code: String },

    #[error("{external_id}: remote {operation} reported success without an id for {username}")]
    MissingRemoteId {
        external_id: ExternalId,
        username: String,
        operation: &'static str,
    },

    #[error("{external_id}: remote {operation} failed: {source}")]
    Remote {
        external_id: ExternalId,
        operation: &'static str,
        #[source]
        source: RemoteError,
    },

    #[error("{external_id}: remote {operation} produced {remote_id} but the archive write failed: {source}")]
    Unrecorded {
        external_id: ExternalId,
        remote_id: RemoteId,
        operation: &'static str,
        #[source]
        source: CoreError,
    },

    #[error("{external_id}: store access failed: {source}")]
    Store {
        external_id: ExternalId,
        #[source]
        source: CoreError,
    },
}

impl ReconcileError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ReconcileError::MissingField { .. } | ReconcileError::InvalidRemoteId { .. } => {
                ErrorCategory::DataIntegrity
            }
            ReconcileError::UnresolvedLocation { .. } => ErrorCategory::Configuration,
            ReconcileError::MissingRemoteId { .. } | ReconcileError::Unrecorded { .. } => {
                ErrorCategory::InconsistentState
            }
            ReconcileError::Remote { .. } | ReconcileError::Store { .. } => {
                ErrorCategory::Transient
            }
        }
    }

    pub fn external_id(&self) -> &ExternalId {
        match self {
            ReconcileError::MissingField { external_id, .. }
            | ReconcileError::InvalidRemoteId { external_id, .. }
            | ReconcileError::UnresolvedLocation { external_id, .. }
            | ReconcileError::MissingRemoteId { external_id, .. }
            | ReconcileError::Remote { external_id, .. }
            | ReconcileError::Unrecorded { external_id, .. }
            | ReconcileError::Store { external_id, .. } => external_id,
        }
    }

    /// Remote identity left without an archive entry, if one is known.
    pub fn remote_id(&self) -> Option<RemoteId> {
        match self {
            ReconcileError::Unrecorded { remote_id, .. } => Some(*remote_id),
            _ => None,
        }
    }
}

/// Failure that stops a whole pass before any identity is touched.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("store error: {0}")]
    Store(#[from] CoreError),

    #[error("{0}")]
    Source(#[from] SourceError),

    #[error("remote group listing failed: {0}")]
    Remote(#[from] RemoteError),
}
