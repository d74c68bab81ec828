use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::super::domain::{Audit, AuditId};
use super::super::repository::{AuditFilter, AuditRepository, RepositoryError};

/// Soft-closes audits whose due time has elapsed. Archiving never touches
/// `status`; an archived draft can still be read and reassigned, but the
/// scheduler will not create a replacement for its period.
pub struct Archiver<R> {
    audits: Arc<R>,
}

impl<R> Archiver<R>
where
    R: AuditRepository + 'static,
{
    pub fn new(audits: Arc<R>) -> Self {
        Self { audits }
    }

    /// Archives every non-archived audit with `due_at <= now`, stamping
    /// `archived_at` with the due instant: the logical close time, not the
    /// wall clock at detection.
    pub fn archive_due(&self, now: DateTime<Utc>) -> Result<usize, RepositoryError> {
        let filter = AuditFilter {
            archived: Some(false),
            due_before: Some(now),
            ..AuditFilter::default()
        };

        let overdue = self.audits.query(&filter)?;
        let count = overdue.len();

        for mut audit in overdue {
            debug!(audit = %audit.id.0, due_at = %audit.due_at, "archiving overdue audit");
            audit.is_archived = true;
            audit.archived_at = Some(audit.due_at);
            self.audits.update(audit)?;
        }

        Ok(count)
    }

    /// Admin-triggered archive; stamps the wall-clock time instead of the
    /// due instant.
    pub fn archive_manually(
        &self,
        id: &AuditId,
        now: DateTime<Utc>,
    ) -> Result<Audit, RepositoryError> {
        let mut audit = self.audits.fetch(id)?.ok_or(RepositoryError::NotFound)?;
        audit.is_archived = true;
        audit.archived_at = Some(now);
        self.audits.update(audit.clone())?;
        Ok(audit)
    }
}
