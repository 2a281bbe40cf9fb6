//! Roster core library — domain types, store capabilities, settings, errors.
//!
//! - [`types`] — newtypes, identity records, archive entries
//! - [`store`] — [`Reader`] / [`ReaderWriter`] capabilities and [`MemoryStore`]
//! - [`settings`] — the YAML settings document
//! - [`error`] — [`CoreError`]

pub mod error;
pub mod settings;
pub mod store;
pub mod types;

pub use error::CoreError;
pub use settings::Settings;
pub use store::{Keyed, MemoryStore, Reader, ReaderWriter};
pub use types::{
    ArchiveEntry, ArchivedGroup, ExternalId, GroupDescriptor, IdentityKind, IdentityRecord,
    Location, LocationId, Projection, RemoteId, TeacherAccess,
};
