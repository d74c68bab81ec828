//! The audit lifecycle state machine: every legal status transition, who may
//! request it, and the side effects it triggers.
//!
//! Two locking rules are deliberately asymmetric. An explicit action from an
//! ineligible status (submitting a draft, say) is an error the caller must
//! surface; a passive save while the audit sits in a review state is a silent
//! no-op, because the auditor's form may legitimately still be open when the
//! lock engages. Admin edits are the logged escape hatch through that lock.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};

use super::capabilities::{self, Capabilities};
use super::domain::{
    Answer, Audit, AuditId, AuditStatus, Branch, BranchId, ScoreOverride, User, UserId,
};
use super::repository::{
    AuditFilter, AuditNotification, AuditRepository, Directory, NotificationDispatcher,
    NotificationKind, RepositoryError,
};
use super::scoring::{self, AuditProgress};

/// Error raised by lifecycle operations. Validation happens before any
/// mutation, so a returned error implies the audit is unchanged.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("cannot {operation} while the audit is {status}")]
    InvalidTransition {
        operation: &'static str,
        status: &'static str,
    },
    #[error("user '{actor}' may not {operation} this audit")]
    Permission {
        actor: String,
        operation: &'static str,
    },
    #[error("{entity} '{id}' does not exist")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Partial edit payload. Maps merge into the audit's existing maps; keys not
/// present here are never touched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuditUpdate {
    #[serde(default)]
    pub responses: BTreeMap<String, Answer>,
    #[serde(default)]
    pub na_reasons: BTreeMap<String, String>,
    #[serde(default)]
    pub section_comments: BTreeMap<String, String>,
    #[serde(default)]
    pub photos: BTreeMap<String, Vec<String>>,
}

impl AuditUpdate {
    fn apply_to(&self, audit: &mut Audit) {
        audit.responses.extend(self.responses.clone());
        audit.na_reasons.extend(self.na_reasons.clone());
        audit
            .section_comments
            .extend(self.section_comments.clone());
        audit.photos.extend(self.photos.clone());
    }
}

/// Manager verdict on a submitted audit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Decision {
    Approved {
        #[serde(default)]
        note: Option<String>,
        #[serde(default)]
        signature: Option<String>,
    },
    Rejected {
        #[serde(default)]
        note: Option<String>,
    },
}

/// Read model for one audit: the record, its progress, and what the
/// requesting actor may do with it.
#[derive(Debug, Clone)]
pub struct AuditInspection {
    pub audit: Audit,
    pub progress: AuditProgress,
    pub capabilities: Capabilities,
}

/// Service executing lifecycle transitions against the injected seams.
pub struct AuditLifecycle<D, R, N> {
    directory: Arc<D>,
    audits: Arc<R>,
    notifications: Arc<N>,
}

impl<D, R, N> AuditLifecycle<D, R, N>
where
    D: Directory + 'static,
    R: AuditRepository + 'static,
    N: NotificationDispatcher + 'static,
{
    pub fn new(directory: Arc<D>, audits: Arc<R>, notifications: Arc<N>) -> Self {
        Self {
            directory,
            audits,
            notifications,
        }
    }

    /// Merges an auditor's in-progress edits. Draft and rejected audits
    /// reopen to in-progress on the first save; submitted and approved
    /// audits silently drop the edit and return the stored record unchanged.
    pub fn save_progress(
        &self,
        actor_id: &UserId,
        audit_id: &AuditId,
        update: AuditUpdate,
        now: DateTime<Utc>,
    ) -> Result<Audit, LifecycleError> {
        let mut audit = self.load_audit(audit_id)?;
        let actor = self.load_user(actor_id)?;
        require_assignee_or_admin(&audit, &actor, "edit")?;

        if audit.status.is_edit_locked() {
            return Ok(audit);
        }

        update.apply_to(&mut audit);
        if matches!(audit.status, AuditStatus::Draft | AuditStatus::Rejected) {
            // Rejection metadata intentionally survives the reopen; only the
            // next approval decision overwrites it.
            audit.status = AuditStatus::InProgress;
        }
        audit.updated_at = now;

        self.audits.update(audit.clone())?;
        Ok(audit)
    }

    /// Admin-only merge that bypasses the review lock. Never changes status.
    pub fn admin_edit(
        &self,
        actor_id: &UserId,
        audit_id: &AuditId,
        update: AuditUpdate,
        now: DateTime<Utc>,
    ) -> Result<Audit, LifecycleError> {
        let mut audit = self.load_audit(audit_id)?;
        let actor = self.load_user(actor_id)?;
        require_admin(&actor, "admin-edit")?;

        update.apply_to(&mut audit);
        audit.updated_at = now;

        info!(audit = %audit.id.0, admin = %actor.id.0, "admin edit applied past status lock");
        self.audits.update(audit.clone())?;
        Ok(audit)
    }

    /// Hands the audit to the branch manager for review. Legal only once the
    /// auditor has actually worked on it: a draft that was never saved cannot
    /// be submitted, however complete it nominally is.
    pub fn submit_for_approval(
        &self,
        actor_id: &UserId,
        audit_id: &AuditId,
        now: DateTime<Utc>,
    ) -> Result<Audit, LifecycleError> {
        let mut audit = self.load_audit(audit_id)?;
        let actor = self.load_user(actor_id)?;
        require_assignee_or_admin(&audit, &actor, "submit")?;

        if !matches!(
            audit.status,
            AuditStatus::InProgress | AuditStatus::Completed
        ) {
            return Err(LifecycleError::InvalidTransition {
                operation: "submit",
                status: audit.status.label(),
            });
        }

        audit.status = AuditStatus::Submitted;
        audit.submitted_by = Some(actor.id.clone());
        audit.submitted_at = Some(now);
        audit.updated_at = now;
        self.audits.update(audit.clone())?;

        let branch = self.load_branch(&audit.branch_id)?;
        if let Some(manager) = &branch.manager_id {
            self.notify(AuditNotification {
                recipient: manager.clone(),
                audit_id: audit.id.clone(),
                branch_name: branch.name.clone(),
                actor_name: actor.name.clone(),
                kind: NotificationKind::Submitted,
                reason: None,
            });
        }

        Ok(audit)
    }

    /// Records a manager's verdict. Approval and rejection metadata are
    /// mutually exclusive; whichever decision lands later clears the other's
    /// fields. The assignee is notified either way.
    pub fn set_approval(
        &self,
        actor_id: &UserId,
        audit_id: &AuditId,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> Result<Audit, LifecycleError> {
        let mut audit = self.load_audit(audit_id)?;
        let actor = self.load_user(actor_id)?;
        let branch = self.load_branch(&audit.branch_id)?;
        require_manager_or_admin(&branch, &actor, "decide on")?;

        let (kind, reason) = match decision {
            Decision::Approved { note, signature } => {
                audit.status = AuditStatus::Approved;
                audit.approved_by = Some(actor.id.clone());
                audit.approved_at = Some(now);
                audit.approval_note = note.clone();
                audit.approval_signature = signature;
                audit.clear_rejection_metadata();
                (NotificationKind::Approved, note)
            }
            Decision::Rejected { note } => {
                audit.status = AuditStatus::Rejected;
                audit.rejected_by = Some(actor.id.clone());
                audit.rejected_at = Some(now);
                audit.rejection_note = note.clone();
                audit.clear_approval_metadata();
                (NotificationKind::Rejected, note)
            }
        };
        audit.updated_at = now;
        self.audits.update(audit.clone())?;

        if let Some(assignee) = &audit.assigned_to {
            self.notify(AuditNotification {
                recipient: assignee.clone(),
                audit_id: audit.id.clone(),
                branch_name: branch.name.clone(),
                actor_name: actor.name.clone(),
                kind,
                reason,
            });
        }

        Ok(audit)
    }

    /// Direct status overwrite with no gating or side effects. Internal and
    /// admin tooling only; also the sole route to `Finalized`.
    pub fn set_status(
        &self,
        audit_id: &AuditId,
        status: AuditStatus,
        now: DateTime<Utc>,
    ) -> Result<Audit, LifecycleError> {
        let mut audit = self.load_audit(audit_id)?;
        audit.status = status;
        audit.updated_at = now;
        self.audits.update(audit.clone())?;
        Ok(audit)
    }

    /// Bulk-reassigns a branch's open audits. Completed, submitted, and
    /// approved audits keep their owner: recorded progress and pending
    /// review must not silently change hands.
    pub fn reassign_open_audits(
        &self,
        branch_id: &BranchId,
        new_assignee: &UserId,
        now: DateTime<Utc>,
    ) -> Result<usize, LifecycleError> {
        self.reassign(branch_id, new_assignee, now, |status| {
            matches!(
                status,
                AuditStatus::Draft | AuditStatus::InProgress | AuditStatus::Rejected
            )
        })
    }

    /// Narrower variant for zone-based distribution: never moves an audit
    /// with any recorded progress.
    pub fn reassign_unstarted_audits(
        &self,
        branch_id: &BranchId,
        new_assignee: &UserId,
        now: DateTime<Utc>,
    ) -> Result<usize, LifecycleError> {
        self.reassign(branch_id, new_assignee, now, |status| {
            matches!(status, AuditStatus::Draft)
        })
    }

    /// Records an admin point override for one question, independent of
    /// status.
    pub fn set_override_score(
        &self,
        actor_id: &UserId,
        audit_id: &AuditId,
        question_id: &str,
        points: i32,
        note: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Audit, LifecycleError> {
        let mut audit = self.load_audit(audit_id)?;
        let actor = self.load_user(actor_id)?;
        require_admin(&actor, "override scoring on")?;

        audit.score_overrides.insert(
            question_id.to_string(),
            ScoreOverride {
                points,
                note: note.into(),
                set_by: actor.id.clone(),
                set_at: now,
            },
        );
        audit.updated_at = now;
        self.audits.update(audit.clone())?;
        Ok(audit)
    }

    /// Read model for the presentation layer: record, progress against the
    /// pinned survey version, and the actor's capability set.
    pub fn inspect(
        &self,
        actor_id: &UserId,
        audit_id: &AuditId,
    ) -> Result<AuditInspection, LifecycleError> {
        let audit = self.load_audit(audit_id)?;
        let actor = self.load_user(actor_id)?;
        let survey = self
            .directory
            .survey(&audit.survey_id)?
            .ok_or_else(|| LifecycleError::NotFound {
                entity: "survey",
                id: audit.survey_id.0.clone(),
            })?;

        let progress = scoring::progress(&audit, &survey);
        let capabilities =
            capabilities::derive(audit.status, actor.role, progress.completion_percent);

        Ok(AuditInspection {
            audit,
            progress,
            capabilities,
        })
    }

    /// Status view with the completion percentage computed against the
    /// audit's pinned survey version.
    pub fn status_view(
        &self,
        audit: &Audit,
    ) -> Result<super::repository::AuditStatusView, LifecycleError> {
        let survey = self
            .directory
            .survey(&audit.survey_id)?
            .ok_or_else(|| LifecycleError::NotFound {
                entity: "survey",
                id: audit.survey_id.0.clone(),
            })?;
        let progress = scoring::progress(audit, &survey);
        Ok(super::repository::AuditStatusView::from_audit(
            audit,
            progress.completion_percent,
        ))
    }

    fn reassign(
        &self,
        branch_id: &BranchId,
        new_assignee: &UserId,
        now: DateTime<Utc>,
        eligible: impl Fn(AuditStatus) -> bool,
    ) -> Result<usize, LifecycleError> {
        self.load_branch(branch_id)?;
        self.load_user(new_assignee)?;

        let filter = AuditFilter {
            branch_id: Some(branch_id.clone()),
            archived: Some(false),
            ..AuditFilter::default()
        };

        let mut moved = 0usize;
        for mut audit in self.audits.query(&filter)? {
            if !eligible(audit.status) {
                continue;
            }
            audit.assigned_to = Some(new_assignee.clone());
            audit.updated_at = now;
            self.audits.update(audit)?;
            moved += 1;
        }

        Ok(moved)
    }

    fn notify(&self, notification: AuditNotification) {
        if let Err(error) = self.notifications.dispatch(notification) {
            // Best effort: the transition is already committed.
            warn!(%error, "audit notification dispatch failed");
        }
    }

    fn load_audit(&self, id: &AuditId) -> Result<Audit, LifecycleError> {
        self.audits
            .fetch(id)?
            .ok_or_else(|| LifecycleError::NotFound {
                entity: "audit",
                id: id.0.clone(),
            })
    }

    fn load_user(&self, id: &UserId) -> Result<User, LifecycleError> {
        self.directory
            .user(id)?
            .ok_or_else(|| LifecycleError::NotFound {
                entity: "user",
                id: id.0.clone(),
            })
    }

    fn load_branch(&self, id: &BranchId) -> Result<Branch, LifecycleError> {
        self.directory
            .branch(id)?
            .ok_or_else(|| LifecycleError::NotFound {
                entity: "branch",
                id: id.0.clone(),
            })
    }
}

fn require_assignee_or_admin(
    audit: &Audit,
    actor: &User,
    operation: &'static str,
) -> Result<(), LifecycleError> {
    if actor.role.is_admin() || audit.is_assigned_to(&actor.id) {
        return Ok(());
    }
    Err(LifecycleError::Permission {
        actor: actor.id.0.clone(),
        operation,
    })
}

fn require_admin(actor: &User, operation: &'static str) -> Result<(), LifecycleError> {
    if actor.role.is_admin() {
        return Ok(());
    }
    Err(LifecycleError::Permission {
        actor: actor.id.0.clone(),
        operation,
    })
}

fn require_manager_or_admin(
    branch: &Branch,
    actor: &User,
    operation: &'static str,
) -> Result<(), LifecycleError> {
    if actor.role.is_admin() {
        return Ok(());
    }
    let manages_branch = branch.manager_id.as_ref() == Some(&actor.id);
    if actor.role == super::domain::Role::BranchManager && manages_branch {
        return Ok(());
    }
    Err(LifecycleError::Permission {
        actor: actor.id.0.clone(),
        operation,
    })
}
