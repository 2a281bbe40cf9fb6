//! Source Record Provider — yields in-scope identity records from either
//! master store.
//!
//! "Active" means in scope for sync: records flagged inactive are still
//! yielded so the engine can retire their remote counterpart.

use roster_core::{CoreError, ExternalId, IdentityKind, IdentityRecord, Location, Reader, Settings};

use crate::snapshot::SnapshotStore;

/// Job-title fragments that make a staff member a teacher.
const TEACHER_TITLES: &[&str] = &["adjunkt", "lærer", "rektor"];

/// Read-only view of one master store.
#[derive(Clone, Copy)]
pub struct MasterView<'a> {
    pub records: &'a dyn Reader<IdentityRecord>,
    pub locations: &'a dyn Reader<Location>,
}

impl<'a> From<&'a SnapshotStore> for MasterView<'a> {
    fn from(store: &'a SnapshotStore) -> Self {
        Self {
            records: store.records(),
            locations: store.locations(),
        }
    }
}

/// Narrows a listing beyond the eligibility rules.
pub type ExtraFilter<'f> = &'f dyn Fn(&IdentityRecord) -> bool;

pub struct SourceRecordProvider<'a> {
    settings: &'a Settings,
    students: MasterView<'a>,
    staff: MasterView<'a>,
}

impl<'a> SourceRecordProvider<'a> {
    pub fn new(settings: &'a Settings, students: MasterView<'a>, staff: MasterView<'a>) -> Self {
        Self {
            settings,
            students,
            staff,
        }
    }

    /// The master store backing `kind`.
    pub fn view(&self, kind: IdentityKind) -> MasterView<'a> {
        match kind {
            IdentityKind::Student => self.students,
            IdentityKind::Teacher => self.staff,
        }
    }

    /// Every eligible record of `kind`, ordered by external id.
    pub fn list_active(
        &self,
        kind: IdentityKind,
        exclusions: &[String],
        extra_filter: Option<ExtraFilter<'_>>,
    ) -> Result<Vec<IdentityRecord>, CoreError> {
        let records = self.view(kind).records.all()?;
        let total = records.len();
        let eligible: Vec<IdentityRecord> = records
            .into_iter()
            .filter(|record| self.is_eligible(record, exclusions))
            .filter(|record| extra_filter.map_or(true, |keep| keep(record)))
            .collect();
        tracing::debug!(
            kind = %kind,
            total,
            eligible = eligible.len(),
            "listed master store records",
        );
        Ok(eligible)
    }

    /// A single record by external id, subject to the same eligibility rules
    /// (with the configured exclusion set).
    pub fn get_by_external_id(
        &self,
        kind: IdentityKind,
        id: &ExternalId,
    ) -> Result<Option<IdentityRecord>, CoreError> {
        let record = self.view(kind).records.get(id)?;
        Ok(record.filter(|r| self.is_eligible(r, &self.settings.exclude_locations)))
    }

    fn is_eligible(&self, record: &IdentityRecord, exclusions: &[String]) -> bool {
        let excluded = exclusions.iter().any(|code| *code == record.home_location_code);
        match record.kind {
            IdentityKind::Student => !excluded,
            IdentityKind::Teacher => {
                if self.settings.is_custom_username(&record.account_name) {
                    return true;
                }
                has_teacher_title(record.job_title.as_deref()) && !excluded
            }
        }
    }
}

fn has_teacher_title(title: Option<&str>) -> bool {
    let Some(title) = title else {
        return false;
    };
    let title = title.to_lowercase();
    TEACHER_TITLES.iter().any(|fragment| title.contains(fragment))
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::settings::{RemoteSettings, StoreSettings};
    use rstest::rstest;
    use std::path::PathBuf;

    fn settings() -> Settings {
        let mut settings = Settings::new(
            RemoteSettings::new("http://localhost/"),
            StoreSettings {
                students: PathBuf::from("students.json"),
                staff: PathBuf::from("staff.json"),
            },
            PathBuf::from("archive.json"),
        );
        settings.exclude_locations = vec!["NO999".to_string()];
        settings.custom_usernames = vec!["special.admin".to_string()];
        settings
    }

    fn record(kind: IdentityKind, id: &str, location: &str, title: Option<&str>) -> IdentityRecord {
        IdentityRecord {
            kind,
            external_id: ExternalId::from(id),
            account_name: id.to_string(),
            username: format!("{id}@example.no"),
            email: format!("{id}@example.no"),
            first_name: "First".to_string(),
            last_name: "Last".to_string(),
            home_location_code: location.to_string(),
            secondary_location_codes: Vec::new(),
            descriptors: Vec::new(),
            grade_level: None,
            job_title: title.map(str::to_string),
            active: true,
        }
    }

    #[rstest]
    #[case("Lektor og Lærer", true)]
    #[case("ADJUNKT", true)]
    #[case("Rektor", true)]
    #[case("Vaktmester", false)]
    fn teacher_titles_match_by_fragment(#[case] title: &str, #[case] expected: bool) {
        assert_eq!(has_teacher_title(Some(title)), expected);
    }

    #[test]
    fn exclusions_and_titles_filter_listing() {
        let settings = settings();
        let students = SnapshotStore::from_parts(
            IdentityKind::Student,
            vec![
                record(IdentityKind::Student, "s1", "NO1", None),
                record(IdentityKind::Student, "s2", "NO999", None),
            ],
            Vec::new(),
        );
        let staff = SnapshotStore::from_parts(
            IdentityKind::Teacher,
            vec![
                record(IdentityKind::Teacher, "t1", "NO1", Some("Lærer")),
                record(IdentityKind::Teacher, "t2", "NO1", Some("Konsulent")),
                record(IdentityKind::Teacher, "t3", "NO999", Some("Adjunkt")),
                record(IdentityKind::Teacher, "special.admin", "NO999", None),
            ],
            Vec::new(),
        );
        let provider = SourceRecordProvider::new(&settings, (&students).into(), (&staff).into());

        let ids = |records: Vec<IdentityRecord>| -> Vec<String> {
            records.into_iter().map(|r| r.external_id.0).collect()
        };
        let exclusions = &settings.exclude_locations;
        assert_eq!(
            ids(provider.list_active(IdentityKind::Student, exclusions, None).unwrap()),
            vec!["s1"]
        );
        assert_eq!(
            ids(provider.list_active(IdentityKind::Teacher, exclusions, None).unwrap()),
            vec!["special.admin", "t1"]
        );
    }

    #[test]
    fn inactive_records_stay_in_scope() {
        let settings = settings();
        let mut inactive = record(IdentityKind::Student, "s1", "NO1", None);
        inactive.active = false;
        let students = SnapshotStore::from_parts(IdentityKind::Student, vec![inactive], Vec::new());
        let staff = SnapshotStore::from_parts(IdentityKind::Teacher, Vec::new(), Vec::new());
        let provider = SourceRecordProvider::new(&settings, (&students).into(), (&staff).into());

        let listed = provider
            .list_active(IdentityKind::Student, &[], None)
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed[0].active);
    }

    #[test]
    fn extra_filter_narrows_and_single_lookup_checks_eligibility() {
        let settings = settings();
        let students = SnapshotStore::from_parts(
            IdentityKind::Student,
            vec![
                record(IdentityKind::Student, "s1", "1VO", None),
                record(IdentityKind::Student, "s2", "NO1", None),
                record(IdentityKind::Student, "s3", "NO999", None),
            ],
            Vec::new(),
        );
        let staff = SnapshotStore::from_parts(IdentityKind::Teacher, Vec::new(), Vec::new());
        let provider = SourceRecordProvider::new(&settings, (&students).into(), (&staff).into());

        let only_vo = |r: &IdentityRecord| r.home_location_code == "1VO";
        let subset = provider
            .list_active(IdentityKind::Student, &[], Some(&only_vo))
            .unwrap();
        assert_eq!(subset.len(), 1);

        let found = provider
            .get_by_external_id(IdentityKind::Student, &ExternalId::from("s2"))
            .unwrap();
        assert!(found.is_some());
        let excluded = provider
            .get_by_external_id(IdentityKind::Student, &ExternalId::from("s3"))
            .unwrap();
        assert!(excluded.is_none());
    }
}
