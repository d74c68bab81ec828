//! Recurring branch compliance audits: period math, scheduling, the
//! lifecycle state machine, scoring, and capability resolution.
//!
//! The synchronization pass (scheduler then archiver) is expected to run
//! before any read of the audit collection; the lifecycle service then
//! mediates every mutation an actor can request.

pub mod capabilities;
pub mod domain;
pub mod lifecycle;
pub mod repository;
pub mod router;
pub mod schedule;
pub mod scoring;

#[cfg(test)]
mod tests;

pub use capabilities::{Capabilities, Severity};
pub use domain::{
    Answer, Audit, AuditId, AuditStatus, AuditorAssignment, Branch, BranchId, Frequency,
    Organization, OrgId, Question, QuestionKind, QuestionWeight, Role, ScoreOverride, Survey,
    SurveyId, SurveySection, User, UserId, WeekStart,
};
pub use lifecycle::{
    AuditInspection, AuditLifecycle, AuditUpdate, Decision, LifecycleError,
};
pub use repository::{
    AuditFilter, AuditNotification, AuditRepository, AuditStatusView, Directory, DispatchError,
    NotificationDispatcher, NotificationKind, RepositoryError,
};
pub use router::audit_router;
pub use schedule::{
    period_range, Archiver, AuditScheduler, PeriodError, PeriodRange, ScheduleError, SyncReport,
};
pub use scoring::{
    is_answered_for_progress, is_valid_for_submission, progress, score, weighted_score,
    AuditProgress, AuditScore, SectionProgress, WeightedScore,
};
