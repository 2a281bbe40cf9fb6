//! # roster-sync
//!
//! Reconciliation of master-store identities against the remote directory.
//!
//! - [`archive`] — the durable archive ([`JsonArchive`]) and its capability trait
//! - [`location`] — location code → remote location id
//! - [`membership`] — group derivation and resolve-or-create
//! - [`diff`] — the static field table and partial-update staging
//! - [`engine`] — the per-identity state machine
//! - [`groups`] — remote group maintenance
//! - [`pipeline`] — run modes shared by the CLI and the daemon

pub mod archive;
pub mod diff;
pub mod engine;
pub mod error;
pub mod groups;
pub mod location;
pub mod membership;
pub mod pipeline;
pub mod report;

pub use archive::{Archive, JsonArchive, MemoryArchive};
pub use engine::{Engine, Outcome};
pub use error::{ErrorCategory, ReconcileError, SyncError};
pub use pipeline::{run, RunMode, SyncContext};
pub use report::BatchReport;
