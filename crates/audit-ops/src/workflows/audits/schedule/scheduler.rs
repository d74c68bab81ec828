use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::super::domain::{
    Audit, AuditId, AuditStatus, Branch, Organization, OrgId, Survey,
};
use super::super::repository::{AuditFilter, AuditRepository, Directory, RepositoryError};
use super::period::{period_range, PeriodError};

/// Error raised while synchronizing one organization.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error(transparent)]
    Period(#[from] PeriodError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Per-organization failure captured without aborting the whole pass.
#[derive(Debug)]
pub struct OrgSyncFailure {
    pub org_id: OrgId,
    pub error: ScheduleError,
}

/// Outcome of one `synchronize` call.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub audits_created: usize,
    pub rollovers: usize,
    pub failures: Vec<OrgSyncFailure>,
}

static AUDIT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_audit_id() -> AuditId {
    let id = AUDIT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AuditId(format!("aud-{id:06}"))
}

/// Keeps the audit collection consistent with the survey schedule: exactly
/// one audit per (branch, survey, period start), created unassigned, with
/// manual branch routing cleared whenever a period rolls over.
pub struct AuditScheduler<D, R> {
    directory: Arc<D>,
    audits: Arc<R>,
}

impl<D, R> AuditScheduler<D, R>
where
    D: Directory + 'static,
    R: AuditRepository + 'static,
{
    pub fn new(directory: Arc<D>, audits: Arc<R>) -> Self {
        Self { directory, audits }
    }

    /// Idempotent synchronization pass. A failure inside one organization
    /// (for example a malformed time zone) is recorded and the remaining
    /// organizations are still processed.
    pub fn synchronize(&self, now: DateTime<Utc>) -> Result<SyncReport, RepositoryError> {
        let mut report = SyncReport::default();

        for org in self.directory.organizations()? {
            match self.synchronize_org(&org, now) {
                Ok((created, rolled)) => {
                    report.audits_created += created;
                    if rolled {
                        report.rollovers += 1;
                    }
                }
                Err(error) => {
                    warn!(org = %org.id.0, %error, "skipping organization during sync");
                    report.failures.push(OrgSyncFailure {
                        org_id: org.id.clone(),
                        error,
                    });
                }
            }
        }

        Ok(report)
    }

    fn synchronize_org(
        &self,
        org: &Organization,
        now: DateTime<Utc>,
    ) -> Result<(usize, bool), ScheduleError> {
        let surveys = self.directory.active_surveys(&org.id)?;
        let branches = self.directory.branches_in(&org.id)?;

        let mut created = 0usize;
        let mut rolled_over = false;
        // Period starts already advanced this pass, keyed by cadence, so two
        // surveys on the same cadence trigger at most one rollover.
        let mut seen_periods = BTreeMap::new();

        for survey in &surveys {
            let period = period_range(survey.frequency, now, org)?;

            if seen_periods.insert(survey.frequency, period.start) != Some(period.start) {
                let cursor = self.directory.period_cursor(&org.id, survey.frequency)?;
                if cursor != Some(period.start) {
                    if cursor.is_some() {
                        // Manual distributions do not carry across periods;
                        // each cycle starts from a blank routing state.
                        self.directory.clear_branch_assignments(&org.id)?;
                        rolled_over = true;
                    }
                    self.directory
                        .record_period_cursor(&org.id, survey.frequency, period.start)?;
                }
            }

            for branch in &branches {
                if self.period_audit_exists(branch, survey, period.start)? {
                    continue;
                }

                let audit = new_scheduled_audit(org, branch, survey, period.start, period.end, now);
                debug!(
                    audit = %audit.id.0,
                    branch = %branch.id.0,
                    survey = %survey.id.0,
                    "scheduling audit for current period"
                );
                self.audits.insert(audit)?;
                created += 1;
            }
        }

        Ok((created, rolled_over))
    }

    /// Archived audits also block re-creation: a soft-closed audit still
    /// occupies its period slot.
    fn period_audit_exists(
        &self,
        branch: &Branch,
        survey: &Survey,
        period_start: DateTime<Utc>,
    ) -> Result<bool, ScheduleError> {
        let filter = AuditFilter {
            branch_id: Some(branch.id.clone()),
            survey_id: Some(survey.id.clone()),
            period_start: Some(period_start),
            ..AuditFilter::default()
        };
        Ok(!self.audits.query(&filter)?.is_empty())
    }
}

fn new_scheduled_audit(
    org: &Organization,
    branch: &Branch,
    survey: &Survey,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Audit {
    Audit {
        id: next_audit_id(),
        org_id: org.id.clone(),
        branch_id: branch.id.clone(),
        survey_id: survey.id.clone(),
        survey_version: survey.version,
        assigned_to: None,
        status: AuditStatus::Draft,
        responses: BTreeMap::new(),
        na_reasons: BTreeMap::new(),
        section_comments: BTreeMap::new(),
        photos: BTreeMap::new(),
        score_overrides: BTreeMap::new(),
        submitted_by: None,
        submitted_at: None,
        approved_by: None,
        approved_at: None,
        approval_note: None,
        approval_signature: None,
        rejected_by: None,
        rejected_at: None,
        rejection_note: None,
        period_start,
        period_end,
        due_at: period_end,
        is_archived: false,
        archived_at: None,
        created_at: now,
        updated_at: now,
    }
}
