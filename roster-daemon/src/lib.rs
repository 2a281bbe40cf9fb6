//! Change-feed daemon: polls per-store inbox queues and reconciles each
//! changed identity on a single blocking worker.

mod error;
pub mod feed;
pub mod paths;
mod runtime;

pub use error::DaemonError;
pub use feed::{ChangeFeed, InboxFeed, UPDATE_MESSAGE_TYPE};
pub use runtime::{init_tracing, remote_reconciler, run, run_until, start_blocking, Reconciler};
