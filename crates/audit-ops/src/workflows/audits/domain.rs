use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for organizations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrgId(pub String);

/// Identifier wrapper for branches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchId(pub String);

/// Identifier wrapper for survey templates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurveyId(pub String);

/// Identifier wrapper for audit instances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuditId(pub String);

/// Identifier wrapper for users.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Scheduling cadence for a survey template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Quarterly,
    Unlimited,
}

impl Frequency {
    pub const fn label(self) -> &'static str {
        match self {
            Frequency::Daily => "DAILY",
            Frequency::Weekly => "WEEKLY",
            Frequency::Monthly => "MONTHLY",
            Frequency::Quarterly => "QUARTERLY",
            Frequency::Unlimited => "UNLIMITED",
        }
    }
}

/// First day of the organization's scheduling week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStart {
    Sunday,
    Monday,
}

impl WeekStart {
    /// Days since Sunday for the configured week start.
    pub const fn days_from_sunday(self) -> u32 {
        match self {
            WeekStart::Sunday => 0,
            WeekStart::Monday => 1,
        }
    }
}

/// Organization owning branches, surveys, and users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub id: OrgId,
    pub name: String,
    /// IANA zone identifier, e.g. "America/Chicago".
    pub time_zone: String,
    pub week_start: WeekStart,
    /// Downstream gating policy label, e.g. "completed_approved".
    pub gating_policy: String,
}

/// Branch subject to recurring audits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub org_id: OrgId,
    pub name: String,
    pub manager_id: Option<UserId>,
}

/// Actor roles recognized by the permission rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Auditor,
    BranchManager,
    Admin,
    SuperAdmin,
}

impl Role {
    pub const fn is_admin(self) -> bool {
        matches!(self, Role::Admin | Role::SuperAdmin)
    }
}

/// Directory entry for a user within an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub org_id: OrgId,
    pub name: String,
    pub role: Role,
}

/// Question kinds supported by survey templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    YesNo,
    YesNoNa,
}

/// Point values contributed by a yes/no answer to weighted scoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionWeight {
    pub yes_points: i32,
    pub no_points: i32,
}

/// One question inside a survey section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub kind: QuestionKind,
    pub required: bool,
    pub weight: Option<QuestionWeight>,
}

/// Ordered group of questions within a survey.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurveySection {
    pub id: String,
    pub title: String,
    pub questions: Vec<Question>,
}

/// Survey template. Structural edits bump `version`; audits pin the version
/// they were created under so in-flight scoring stays consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Survey {
    pub id: SurveyId,
    pub org_id: OrgId,
    pub title: String,
    pub version: u32,
    pub frequency: Frequency,
    pub active: bool,
    pub sections: Vec<SurveySection>,
}

impl Survey {
    pub fn question_count(&self) -> usize {
        self.sections
            .iter()
            .map(|section| section.questions.len())
            .sum()
    }
}

/// Recorded answer to a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Answer {
    Yes,
    No,
    Na,
}

/// Lifecycle status of an audit instance.
///
/// `Finalized` appears in the capability vocabulary but no lifecycle
/// operation produces it; the only path there is an explicit
/// `set_status` overwrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditStatus {
    Draft,
    InProgress,
    Completed,
    Submitted,
    Approved,
    Rejected,
    Finalized,
}

impl AuditStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AuditStatus::Draft => "DRAFT",
            AuditStatus::InProgress => "IN_PROGRESS",
            AuditStatus::Completed => "COMPLETED",
            AuditStatus::Submitted => "SUBMITTED",
            AuditStatus::Approved => "APPROVED",
            AuditStatus::Rejected => "REJECTED",
            AuditStatus::Finalized => "FINALIZED",
        }
    }

    /// Statuses in which ordinary saves are silently dropped.
    pub const fn is_edit_locked(self) -> bool {
        matches!(self, AuditStatus::Submitted | AuditStatus::Approved)
    }
}

/// Admin point override for one question's weighted contribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreOverride {
    pub points: i32,
    pub note: String,
    pub set_by: UserId,
    pub set_at: DateTime<Utc>,
}

/// The mutable audit lifecycle entity, one per branch/survey/period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Audit {
    pub id: AuditId,
    pub org_id: OrgId,
    pub branch_id: BranchId,
    pub survey_id: SurveyId,
    pub survey_version: u32,
    /// `None` means the scheduler created it unassigned.
    pub assigned_to: Option<UserId>,
    pub status: AuditStatus,
    pub responses: BTreeMap<String, Answer>,
    pub na_reasons: BTreeMap<String, String>,
    pub section_comments: BTreeMap<String, String>,
    /// Storage keys of photo evidence, keyed by question id.
    pub photos: BTreeMap<String, Vec<String>>,
    pub score_overrides: BTreeMap<String, ScoreOverride>,
    pub submitted_by: Option<UserId>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub approval_note: Option<String>,
    pub approval_signature: Option<String>,
    pub rejected_by: Option<UserId>,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejection_note: Option<String>,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub is_archived: bool,
    pub archived_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Audit {
    /// Clears approval fields; called when a rejection decision lands.
    pub(crate) fn clear_approval_metadata(&mut self) {
        self.approved_by = None;
        self.approved_at = None;
        self.approval_note = None;
        self.approval_signature = None;
    }

    /// Clears rejection fields; called when an approval decision lands.
    pub(crate) fn clear_rejection_metadata(&mut self) {
        self.rejected_by = None;
        self.rejected_at = None;
        self.rejection_note = None;
    }

    pub fn is_assigned_to(&self, user: &UserId) -> bool {
        self.assigned_to.as_ref() == Some(user)
    }
}

/// Manual auditor-to-branch routing, distinct from `Audit::assigned_to`.
/// Branch routing is wiped organization-wide on every period rollover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditorAssignment {
    pub user_id: UserId,
    pub branch_ids: Vec<BranchId>,
    pub zone_ids: Vec<String>,
}
