use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Audit, AuditId, AuditStatus, AuditorAssignment, Branch, BranchId, Frequency, Organization,
    OrgId, Survey, SurveyId, User, UserId,
};

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Predicate describing an audit collection query. All criteria are
/// conjunctive; `None` means "any".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub org_id: Option<OrgId>,
    pub branch_id: Option<BranchId>,
    pub survey_id: Option<SurveyId>,
    pub status: Option<AuditStatus>,
    pub assigned_to: Option<UserId>,
    pub archived: Option<bool>,
    pub period_start: Option<DateTime<Utc>>,
    pub due_before: Option<DateTime<Utc>>,
    pub updated_after: Option<DateTime<Utc>>,
}

impl AuditFilter {
    pub fn matches(&self, audit: &Audit) -> bool {
        if let Some(org_id) = &self.org_id {
            if &audit.org_id != org_id {
                return false;
            }
        }
        if let Some(branch_id) = &self.branch_id {
            if &audit.branch_id != branch_id {
                return false;
            }
        }
        if let Some(survey_id) = &self.survey_id {
            if &audit.survey_id != survey_id {
                return false;
            }
        }
        if let Some(status) = self.status {
            if audit.status != status {
                return false;
            }
        }
        if let Some(assigned_to) = &self.assigned_to {
            if audit.assigned_to.as_ref() != Some(assigned_to) {
                return false;
            }
        }
        if let Some(archived) = self.archived {
            if audit.is_archived != archived {
                return false;
            }
        }
        if let Some(period_start) = self.period_start {
            if audit.period_start != period_start {
                return false;
            }
        }
        if let Some(due_before) = self.due_before {
            if audit.due_at > due_before {
                return false;
            }
        }
        if let Some(updated_after) = self.updated_after {
            if audit.updated_at <= updated_after {
                return false;
            }
        }
        true
    }
}

/// Storage abstraction for the audit collection so the state machine and
/// scheduler can be exercised against in-memory fakes.
pub trait AuditRepository: Send + Sync {
    fn insert(&self, audit: Audit) -> Result<Audit, RepositoryError>;
    fn update(&self, audit: Audit) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &AuditId) -> Result<Option<Audit>, RepositoryError>;
    fn query(&self, filter: &AuditFilter) -> Result<Vec<Audit>, RepositoryError>;
}

/// Identity, org-structure, and assignment lookup used by the scheduler and
/// every permission-checked operation.
pub trait Directory: Send + Sync {
    fn organizations(&self) -> Result<Vec<Organization>, RepositoryError>;
    fn organization(&self, id: &OrgId) -> Result<Option<Organization>, RepositoryError>;
    fn branches_in(&self, org_id: &OrgId) -> Result<Vec<Branch>, RepositoryError>;
    fn branch(&self, id: &BranchId) -> Result<Option<Branch>, RepositoryError>;
    fn active_surveys(&self, org_id: &OrgId) -> Result<Vec<Survey>, RepositoryError>;
    fn survey(&self, id: &SurveyId) -> Result<Option<Survey>, RepositoryError>;
    fn user(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;

    fn assignments_in(&self, org_id: &OrgId) -> Result<Vec<AuditorAssignment>, RepositoryError>;
    fn store_assignment(&self, assignment: AuditorAssignment) -> Result<(), RepositoryError>;
    /// Wipes the `branch_ids` of every assignment belonging to the org,
    /// leaving zone routing intact.
    fn clear_branch_assignments(&self, org_id: &OrgId) -> Result<(), RepositoryError>;

    /// Last period start the scheduler processed for this org and cadence.
    fn period_cursor(
        &self,
        org_id: &OrgId,
        frequency: Frequency,
    ) -> Result<Option<DateTime<Utc>>, RepositoryError>;
    fn record_period_cursor(
        &self,
        org_id: &OrgId,
        frequency: Frequency,
        period_start: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}

/// Kind of lifecycle event carried by a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Submitted,
    Approved,
    Rejected,
}

/// Fixed payload handed to the notification dispatcher after a transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditNotification {
    pub recipient: UserId,
    pub audit_id: AuditId,
    pub branch_name: String,
    pub actor_name: String,
    pub kind: NotificationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Outbound notification hook. Dispatch is best effort: the lifecycle logs
/// failures and never rolls back the underlying transition.
pub trait NotificationDispatcher: Send + Sync {
    fn dispatch(&self, notification: AuditNotification) -> Result<(), DispatchError>;
}

/// Sanitized representation of an audit's exposed state.
#[derive(Debug, Clone, Serialize)]
pub struct AuditStatusView {
    pub audit_id: AuditId,
    pub status: &'static str,
    pub assigned_to: Option<UserId>,
    pub completion_percent: u32,
    pub is_archived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection_note: Option<String>,
}

impl AuditStatusView {
    pub fn from_audit(audit: &Audit, completion_percent: u32) -> Self {
        Self {
            audit_id: audit.id.clone(),
            status: audit.status.label(),
            assigned_to: audit.assigned_to.clone(),
            completion_percent,
            is_archived: audit.is_archived,
            rejection_note: audit.rejection_note.clone(),
        }
    }
}
