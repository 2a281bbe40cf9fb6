//! Change feed: per-master-store queues of "this person changed" messages.
//!
//! The inbox implementation reads `*.json` files from one directory per
//! master store. Each file holds one message:
//!
//! ```text
//! { "message_type": "updatemessagetype",
//!   "body": [ { "ADObjectID": "...", "samaccountname": "..." } ] }
//! ```
//!
//! `body` may also be the same array encoded as a JSON string and the message
//! type is matched case-insensitively. Messages are received oldest first and
//! deleted only once parsed. A file that cannot be read, or that ends early
//! (still being written), stays for the next receive; a file that is not a
//! change message is moved to `rejected/`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Deserialize;
use serde_json::Value;

use roster_core::{ExternalId, IdentityKind};

use crate::error::{io_err, DaemonError};
use crate::paths::inbox_dir;

/// The only message type that carries changed identities, in any case.
pub const UPDATE_MESSAGE_TYPE: &str = "updatemessagetype";

const REJECTED_DIR: &str = "rejected";

/// A source of changed external ids for one master store.
pub trait ChangeFeed: Send {
    fn kind(&self) -> IdentityKind;

    /// Take every pending change. A message that fails on its own never
    /// hides the changes read alongside it.
    fn receive(&mut self) -> Result<Vec<ExternalId>, DaemonError>;
}

#[derive(Debug, Deserialize)]
struct ChangeMessage {
    message_type: String,
    #[serde(default)]
    body: Value,
}

#[derive(Debug, Deserialize)]
struct ChangedIdentity {
    #[serde(rename = "ADObjectID", default)]
    external_id: Option<String>,
    #[serde(rename = "samaccountname", default)]
    account_name: Option<String>,
}

// ---------------------------------------------------------------------------
// Inbox directory
// ---------------------------------------------------------------------------

pub struct InboxFeed {
    kind: IdentityKind,
    dir: PathBuf,
}

impl InboxFeed {
    /// Feed for `kind` under `root`, creating its directory if needed.
    pub fn open(root: &Path, kind: IdentityKind) -> Result<Self, DaemonError> {
        let dir = inbox_dir(root, kind);
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        Ok(Self { kind, dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn pending(&self) -> Result<Vec<PathBuf>, DaemonError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| io_err(&self.dir, e))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_err(&self.dir, e))?;
            let path = entry.path();
            if !is_message_file(&path) || !path.is_file() {
                continue;
            }
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            files.push((modified, path));
        }
        files.sort();
        Ok(files.into_iter().map(|(_, path)| path).collect())
    }

    fn reject(&self, path: &Path) {
        let rejected = self.dir.join(REJECTED_DIR);
        let moved = fs::create_dir_all(&rejected).and_then(|()| match path.file_name() {
            Some(name) => fs::rename(path, rejected.join(name)),
            None => fs::remove_file(path),
        });
        if let Err(source) = moved {
            let err = io_err(path, source);
            tracing::warn!(kind = %self.kind, error = %err, "could not move rejected change message");
        }
    }
}

impl ChangeFeed for InboxFeed {
    fn kind(&self) -> IdentityKind {
        self.kind
    }

    fn receive(&mut self) -> Result<Vec<ExternalId>, DaemonError> {
        let mut ids = Vec::new();
        for path in self.pending()? {
            let raw = match fs::read_to_string(&path) {
                Ok(raw) => raw,
                Err(source) => {
                    let err = io_err(&path, source);
                    tracing::warn!(kind = %self.kind, error = %err, "cannot read change message; leaving it for retry");
                    continue;
                }
            };

            match parse_message(&raw) {
                Ok(received) => {
                    tracing::debug!(kind = %self.kind, file = %path.display(), count = received.len(), "received change message");
                    if let Err(source) = fs::remove_file(&path) {
                        let err = io_err(&path, source);
                        tracing::warn!(kind = %self.kind, error = %err, "could not delete change message; it will be received again");
                    }
                    ids.extend(received);
                }
                Err(source) if source.is_eof() => {
                    tracing::debug!(kind = %self.kind, file = %path.display(), "change message incomplete; leaving it for retry");
                }
                Err(source) => {
                    let err = DaemonError::Message {
                        path: path.clone(),
                        source,
                    };
                    tracing::warn!(kind = %self.kind, error = %err, "rejecting change message");
                    self.reject(&path);
                }
            }
        }
        Ok(ids)
    }
}

pub(crate) fn is_message_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"))
}

/// External ids named by one message; other message types carry none.
fn parse_message(raw: &str) -> Result<Vec<ExternalId>, serde_json::Error> {
    let message: ChangeMessage = serde_json::from_str(raw)?;
    if !message.message_type.eq_ignore_ascii_case(UPDATE_MESSAGE_TYPE) {
        tracing::debug!(message_type = %message.message_type, "ignoring message type");
        return Ok(Vec::new());
    }

    let changed: Vec<ChangedIdentity> = match message.body {
        Value::String(encoded) => serde_json::from_str(&encoded)?,
        Value::Null => Vec::new(),
        other => serde_json::from_value(other)?,
    };

    Ok(changed
        .into_iter()
        .filter_map(|c| match c.external_id {
            Some(id) if !id.trim().is_empty() => Some(ExternalId::from(id.trim())),
            _ => {
                tracing::warn!(account = ?c.account_name, "change without external id");
                None
            }
        })
        .collect())
}
