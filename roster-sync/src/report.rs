//! Per-category counts for one reconciliation pass.

use serde::Serialize;

use crate::engine::Outcome;
use crate::error::{ErrorCategory, ReconcileError};
use crate::groups::MaintenanceReport;
use crate::membership::GroupTally;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FailureCounts {
    pub transient: usize,
    pub data_integrity: usize,
    pub inconsistent_state: usize,
    pub configuration: usize,
}

impl FailureCounts {
    pub fn total(&self) -> usize {
        self.transient + self.data_integrity + self.inconsistent_state + self.configuration
    }

    fn count(&mut self, category: ErrorCategory) {
        match category {
            ErrorCategory::Transient => self.transient += 1,
            ErrorCategory::DataIntegrity => self.data_integrity += 1,
            ErrorCategory::InconsistentState => self.inconsistent_state += 1,
            ErrorCategory::Configuration => self.configuration += 1,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub processed: usize,
    pub created: usize,
    pub updated: usize,
    pub recreated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    /// Records with nothing to do (inactive and never synced, or not found).
    pub skipped: usize,
    pub failures: FailureCounts,
    pub groups: GroupTally,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance: Option<MaintenanceReport>,
}

impl BatchReport {
    pub fn record(&mut self, result: &Result<Outcome, ReconcileError>) {
        self.processed += 1;
        match result {
            Ok(Outcome::Created(_)) => self.created += 1,
            Ok(Outcome::Updated { .. }) => self.updated += 1,
            Ok(Outcome::Recreated { .. }) => self.recreated += 1,
            Ok(Outcome::Deleted(_)) => self.deleted += 1,
            Ok(Outcome::Unchanged) => self.unchanged += 1,
            Ok(Outcome::NoOp) => self.skipped += 1,
            Err(err) => self.failures.count(err.category()),
        }
    }

    pub fn merge(&mut self, other: BatchReport) {
        self.processed += other.processed;
        self.created += other.created;
        self.updated += other.updated;
        self.recreated += other.recreated;
        self.deleted += other.deleted;
        self.unchanged += other.unchanged;
        self.skipped += other.skipped;
        self.failures.transient += other.failures.transient;
        self.failures.data_integrity += other.failures.data_integrity;
        self.failures.inconsistent_state += other.failures.inconsistent_state;
        self.failures.configuration += other.failures.configuration;
        self.groups.merge(other.groups);
        if other.maintenance.is_some() {
            self.maintenance = other.maintenance;
        }
    }
}
