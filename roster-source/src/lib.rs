//! Master-store access for Roster.
//!
//! - [`rows`] — raw upstream rows and their mapping onto identity records
//! - [`snapshot`] — JSON snapshot exports held in memory
//! - [`provider`] — the Source Record Provider and its eligibility rules

pub mod error;
pub mod provider;
pub mod rows;
pub mod snapshot;

pub use error::SourceError;
pub use provider::{MasterView, SourceRecordProvider};
pub use snapshot::SnapshotStore;
