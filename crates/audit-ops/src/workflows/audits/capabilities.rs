//! Derives what an actor may do with an audit in its current status, plus
//! the guidance text the presentation layer shows alongside. Pure data in,
//! pure data out; the rules live in one table per role.

use serde::Serialize;

use super::domain::{AuditStatus, Role};

/// Tone of the guidance message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Capability set for one (status, role, completion) combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capabilities {
    pub can_edit: bool,
    pub can_submit: bool,
    pub can_delete: bool,
    pub can_reopen: bool,
    pub view_only: bool,
    pub severity: Option<Severity>,
    pub guidance: String,
}

impl Capabilities {
    fn view_only(severity: Option<Severity>, guidance: impl Into<String>) -> Self {
        Self {
            can_edit: false,
            can_submit: false,
            can_delete: false,
            can_reopen: false,
            view_only: true,
            severity,
            guidance: guidance.into(),
        }
    }
}

pub fn derive(status: AuditStatus, role: Role, completion_percent: u32) -> Capabilities {
    match role {
        Role::Auditor => auditor_capabilities(status, completion_percent),
        Role::BranchManager => manager_capabilities(status),
        Role::Admin | Role::SuperAdmin => admin_capabilities(status),
    }
}

fn auditor_capabilities(status: AuditStatus, completion_percent: u32) -> Capabilities {
    let complete = completion_percent >= 100;

    match status {
        AuditStatus::Draft | AuditStatus::InProgress => {
            let (severity, guidance) = if complete {
                (
                    Some(Severity::Info),
                    "All questions answered. You can submit when ready.".to_string(),
                )
            } else {
                (
                    Some(Severity::Info),
                    format!(
                        "{completion_percent}% complete. Answer the remaining questions before submitting."
                    ),
                )
            };
            Capabilities {
                can_edit: true,
                can_submit: complete,
                can_delete: true,
                can_reopen: false,
                view_only: false,
                severity,
                guidance,
            }
        }
        AuditStatus::Completed => Capabilities {
            can_edit: true,
            // Completed audits may always be submitted, regardless of the
            // computed completion percentage.
            can_submit: true,
            can_delete: true,
            can_reopen: false,
            view_only: false,
            severity: Some(Severity::Info),
            guidance: "Marked complete. Submit for manager review.".to_string(),
        },
        AuditStatus::Rejected => Capabilities {
            can_edit: true,
            can_submit: complete,
            can_delete: true,
            can_reopen: false,
            view_only: false,
            severity: Some(Severity::Warning),
            guidance: "This audit was rejected. Address the feedback, save your fixes, and resubmit."
                .to_string(),
        },
        AuditStatus::Submitted => Capabilities::view_only(
            Some(Severity::Info),
            "Submitted and awaiting manager review. Edits are locked until a decision is made.",
        ),
        AuditStatus::Approved => {
            Capabilities::view_only(None, "Approved. No further action is available.")
        }
        AuditStatus::Finalized => {
            Capabilities::view_only(None, "Finalized. This audit is permanently read-only.")
        }
    }
}

fn manager_capabilities(status: AuditStatus) -> Capabilities {
    match status {
        AuditStatus::Submitted => Capabilities::view_only(
            Some(Severity::Warning),
            "An audit is waiting on you: review the responses, then approve or reject.",
        ),
        AuditStatus::Draft | AuditStatus::InProgress => Capabilities::view_only(
            Some(Severity::Info),
            "The assigned auditor is still working on this audit.",
        ),
        AuditStatus::Completed => Capabilities::view_only(
            Some(Severity::Info),
            "Marked complete by the auditor; awaiting submission.",
        ),
        AuditStatus::Approved => Capabilities::view_only(Some(Severity::Info), "Approved."),
        AuditStatus::Rejected => Capabilities::view_only(
            Some(Severity::Info),
            "Rejected. The auditor has been asked to rework and resubmit.",
        ),
        AuditStatus::Finalized => Capabilities::view_only(None, "Finalized."),
    }
}

fn admin_capabilities(status: AuditStatus) -> Capabilities {
    match status {
        AuditStatus::Draft | AuditStatus::InProgress => Capabilities {
            can_edit: true,
            can_submit: false,
            can_delete: true,
            can_reopen: false,
            view_only: false,
            severity: Some(Severity::Info),
            guidance: "Early-stage audit. Admins may edit or delete it directly.".to_string(),
        },
        AuditStatus::Finalized => Capabilities {
            can_edit: false,
            can_submit: false,
            can_delete: false,
            can_reopen: true,
            view_only: false,
            severity: Some(Severity::Warning),
            guidance: "Finalized. Reopening will return the audit to the review flow.".to_string(),
        },
        AuditStatus::Submitted => Capabilities::view_only(
            Some(Severity::Info),
            "Locked pending review. Use an admin edit for corrections.",
        ),
        AuditStatus::Completed => Capabilities::view_only(
            Some(Severity::Info),
            "Marked complete by the auditor; awaiting submission.",
        ),
        AuditStatus::Approved => Capabilities::view_only(Some(Severity::Info), "Approved."),
        AuditStatus::Rejected => Capabilities::view_only(
            Some(Severity::Info),
            "Rejected and back with the assigned auditor.",
        ),
    }
}
