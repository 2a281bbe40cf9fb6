//! Settings loading and serialisation tests for `roster-core`.

use assert_fs::prelude::*;
use predicates::prelude::predicate;
use roster_core::{
    settings::{self, settings_path_at},
    ArchiveEntry, CoreError, ExternalId, LocationId, Projection, RemoteId,
};
use rstest::rstest;

const FULL: &str = r#"
remote:
  base_url: https://directory.example.org/api/
  username: svc
  password: secret
  timeout_secs: 10
stores:
  students: /var/lib/roster/students.json
  staff: /var/lib/roster/staff.json
archive: /var/lib/roster/archive.json
principal_domain: example.no
exclude_locations: [NO999]
custom_usernames: [special.admin]
sites:
  adult_education_name: Voksenopplæringen
  adult_education_code: 1VO
  excluded_site_marker: ooo
  bad_basisgruppe: 5.tr
daemon:
  inbox: /var/lib/roster/inbox
  idle_interval_ms: 250
  backoff_secs: 5
"#;

// ---------------------------------------------------------------------------
// 1. Loading
// ---------------------------------------------------------------------------

#[test]
fn full_config_loads_every_section() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".roster/config.yaml").write_str(FULL).expect("write");

    let loaded = settings::load_at(home.path()).expect("load");
    assert_eq!(loaded.remote.timeout_secs, 10);
    assert_eq!(loaded.sites.excluded_site_marker.as_deref(), Some("ooo"));
    assert_eq!(loaded.daemon.idle_interval_ms, 250);
    assert_eq!(loaded.exclude_locations, vec!["NO999".to_string()]);
    assert!(loaded.is_custom_username("special.admin"));
    assert_eq!(
        loaded.inbox_root(),
        std::path::PathBuf::from("/var/lib/roster/inbox")
    );
}

#[test]
fn load_from_explicit_path() {
    let dir = assert_fs::TempDir::new().expect("tempdir");
    let file = dir.child("roster.yaml");
    file.write_str(FULL).expect("write");
    file.assert(predicate::path::exists());

    let loaded = settings::load_from(file.path()).expect("load");
    assert_eq!(loaded.principal_domain, "example.no");
}

#[test]
fn wrong_shape_is_settings_error_with_path() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    home.child(".roster/config.yaml")
        .write_str("- a list, not a mapping\n")
        .expect("write");

    let err = settings::load_at(home.path()).unwrap_err();
    assert!(matches!(err, CoreError::Settings { .. }), "got: {err}");
    assert!(err.to_string().contains(
        settings_path_at(home.path()).to_string_lossy().as_ref()
    ));
}

// ---------------------------------------------------------------------------
// 2. Archive entry serialisation
// ---------------------------------------------------------------------------

#[rstest]
#[case::plain(vec![], vec![])]
#[case::memberships(vec!["Berg Elever".to_string(), "7.Trinn - Berg".to_string()], vec![RemoteId(12)])]
fn archive_entry_roundtrips(#[case] member_of: Vec<String>, #[case] teacher_groups: Vec<RemoteId>) {
    let entry = ArchiveEntry {
        external_id: ExternalId::from("s-1"),
        remote_id: RemoteId(501),
        snapshot: Projection {
            username: "kari@example.no".to_string(),
            email: "kari@example.no".to_string(),
            first_name: "Kari".to_string(),
            last_name: "Nordmann".to_string(),
            location_id: LocationId(42),
            member_of,
            teacher_groups,
            ..Default::default()
        },
        synced_at: chrono::Utc::now(),
    };
    let json = serde_json::to_string(&entry).expect("serialize");
    let back: ArchiveEntry = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, entry);
}
