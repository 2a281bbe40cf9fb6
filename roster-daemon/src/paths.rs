use std::path::{Path, PathBuf};

use roster_core::IdentityKind;

pub const STUDENTS_INBOX: &str = "students";
pub const STAFF_INBOX: &str = "staff";

pub fn inbox_dir(root: &Path, kind: IdentityKind) -> PathBuf {
    match kind {
        IdentityKind::Student => root.join(STUDENTS_INBOX),
        IdentityKind::Teacher => root.join(STAFF_INBOX),
    }
}
