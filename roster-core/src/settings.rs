//! Process settings, loaded once at startup and passed by reference.
//!
//! # Location
//!
//! ```text
//! ~/.roster/
//!   config.yaml
//! ```
//!
//! As with the rest of the workspace, every loader has an `_at` form taking
//! an explicit home directory; tests must always use the `_at` form.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, CoreError};

/// Root settings document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub remote: RemoteSettings,
    pub stores: StoreSettings,
    /// Path of the JSON archive file.
    pub archive: PathBuf,
    /// Appended as `@<domain>` to directory account names.
    #[serde(default)]
    pub principal_domain: String,
    /// Location codes whose people are never synced.
    #[serde(default)]
    pub exclude_locations: Vec<String>,
    /// Staff account names synced regardless of job title or location.
    #[serde(default)]
    pub custom_usernames: Vec<String>,
    #[serde(default)]
    pub sites: SiteRules,
    #[serde(default)]
    pub daemon: DaemonSettings,
}

/// Remote directory endpoint and credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSettings {
    pub base_url: String,
    pub username: String,
    pub password: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Master-store snapshot files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    pub students: PathBuf,
    pub staff: PathBuf,
}

/// Institution-specific rules applied while deriving group memberships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteRules {
    /// Display name of the adult-education site (grade derived from VO groups).
    pub adult_education_name: String,
    /// Location code of the adult-education site (the `subset` run mode).
    pub adult_education_code: String,
    /// Sites whose name contains this marker get no grade/class groups;
    /// `null` disables the rule.
    pub excluded_site_marker: Option<String>,
    /// Basisgruppe name known to be bad upstream data.
    pub bad_basisgruppe: String,
}

impl Default for SiteRules {
    fn default() -> Self {
        Self {
            adult_education_name: "Voksenopplæringen".to_string(),
            adult_education_code: "1VO".to_string(),
            excluded_site_marker: Some("ooo".to_string()),
            bad_basisgruppe: "5.tr".to_string(),
        }
    }
}

/// Change-feed daemon tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSettings {
    /// Inbox root holding `students/` and `staff/` message directories.
    pub inbox: Option<PathBuf>,
    pub idle_interval_ms: u64,
    pub backoff_secs: u64,
}

impl Default for DaemonSettings {
    fn default() -> Self {
        Self {
            inbox: None,
            idle_interval_ms: 1000,
            backoff_secs: 60,
        }
    }
}

impl RemoteSettings {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            username: String::new(),
            password: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    30
}

impl Settings {
    /// Settings with every optional field at its default.
    pub fn new(remote: RemoteSettings, stores: StoreSettings, archive: PathBuf) -> Self {
        Self {
            remote,
            stores,
            archive,
            principal_domain: String::new(),
            exclude_locations: Vec::new(),
            custom_usernames: Vec::new(),
            sites: SiteRules::default(),
            daemon: DaemonSettings::default(),
        }
    }

    pub fn is_custom_username(&self, account_name: &str) -> bool {
        self.custom_usernames.iter().any(|u| u == account_name)
    }

    /// `<account>@<principal_domain>`, or empty if the account name is blank.
    pub fn principal_for(&self, account_name: &str) -> String {
        let account = account_name.trim();
        if account.is_empty() {
            return String::new();
        }
        if self.principal_domain.is_empty() {
            return account.to_string();
        }
        format!("{account}@{}", self.principal_domain)
    }

    /// Inbox root, defaulting to `inbox/` next to the archive file.
    pub fn inbox_root(&self) -> PathBuf {
        match &self.daemon.inbox {
            Some(path) => path.clone(),
            None => self
                .archive
                .parent()
                .map(|dir| dir.join("inbox"))
                .unwrap_or_else(|| PathBuf::from("inbox")),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// `<home>/.roster/config.yaml` — pure, no I/O.
pub fn settings_path_at(home: &Path) -> PathBuf {
    home.join(".roster").join("config.yaml")
}

/// Load settings from an explicit file.
///
/// Returns `CoreError::NotFound` if absent and `CoreError::Settings` (with
/// path and line context) if malformed.
pub fn load_from(path: &Path) -> Result<Settings, CoreError> {
    if !path.exists() {
        return Err(CoreError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    serde_yaml::from_str(&contents).map_err(|source| CoreError::Settings {
        path: path.to_path_buf(),
        source,
    })
}

/// Load `<home>/.roster/config.yaml`.
pub fn load_at(home: &Path) -> Result<Settings, CoreError> {
    load_from(&settings_path_at(home))
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Settings, CoreError> {
    load_at(&home()?)
}

fn home() -> Result<PathBuf, CoreError> {
    dirs::home_dir().ok_or(CoreError::HomeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
remote:
  base_url: https://directory.example.org/api/
  username: svc
  password: hunter2
stores:
  students: /data/students.json
  staff: /data/staff.json
archive: /data/archive.json
"#;

    fn write_config(home: &TempDir, body: &str) {
        let path = settings_path_at(home.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, body).unwrap();
    }

    #[test]
    fn settings_path_is_correct() {
        let home = TempDir::new().unwrap();
        assert!(settings_path_at(home.path()).ends_with(".roster/config.yaml"));
    }

    #[test]
    fn minimal_config_gets_defaults() {
        let home = TempDir::new().unwrap();
        write_config(&home, MINIMAL);
        let settings = load_at(home.path()).expect("load");
        assert_eq!(settings.remote.timeout_secs, 30);
        assert_eq!(settings.sites.bad_basisgruppe, "5.tr");
        assert_eq!(settings.sites.adult_education_code, "1VO");
        assert_eq!(settings.sites.excluded_site_marker.as_deref(), Some("ooo"));
        assert_eq!(settings.daemon.backoff_secs, 60);
        assert_eq!(settings.daemon.idle_interval_ms, 1000);
        assert!(settings.exclude_locations.is_empty());
        assert_eq!(settings.inbox_root(), PathBuf::from("/data/inbox"));
    }

    #[test]
    fn missing_config_is_not_found() {
        let home = TempDir::new().unwrap();
        let err = load_at(home.path()).unwrap_err();
        assert!(matches!(err, CoreError::NotFound { .. }), "got: {err}");
    }

    #[test]
    fn malformed_config_reports_path() {
        let home = TempDir::new().unwrap();
        write_config(&home, "remote: [unclosed");
        let err = load_at(home.path()).unwrap_err();
        assert!(matches!(err, CoreError::Settings { .. }), "got: {err}");
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    fn principal_appends_domain() {
        let home = TempDir::new().unwrap();
        write_config(
            &home,
            &format!("{MINIMAL}principal_domain: skole.example.no\n"),
        );
        let settings = load_at(home.path()).unwrap();
        assert_eq!(settings.principal_for("ola01"), "ola01@skole.example.no");
        assert_eq!(settings.principal_for("  "), "");
    }

    #[test]
    fn excluded_site_rule_can_be_disabled() {
        let home = TempDir::new().unwrap();
        write_config(&home, &format!("{MINIMAL}sites:\n  excluded_site_marker: null\n"));
        let settings = load_at(home.path()).unwrap();
        assert!(settings.sites.excluded_site_marker.is_none());
        assert_eq!(settings.sites.bad_basisgruppe, "5.tr");
    }
}
