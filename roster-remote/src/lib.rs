//! Remote directory access for Roster.
//!
//! - [`wire`] — request and response bodies
//! - [`update`] — the typed [`SparseUpdate`]
//! - [`client`] — the [`DirectoryClient`] seam and its HTTP implementation

pub mod client;
pub mod error;
pub mod update;
pub mod wire;

pub use client::{DirectoryClient, HttpDirectoryClient};
pub use error::RemoteError;
pub use update::{Field, FieldValue, SparseUpdate};
pub use wire::{
    Acl, ApiResponse, CreateIdentityPayload, GroupPayload, GroupUpdate, RemoteGroup,
    RemoteIdentity,
};
