//! Period math and the synchronization pass that keeps the audit collection
//! consistent: one audit per branch/survey/period, stale assignments cleared
//! on rollover, overdue audits archived.

mod archiver;
mod period;
mod scheduler;

pub use archiver::Archiver;
pub use period::{period_range, PeriodError, PeriodRange};
pub use scheduler::{AuditScheduler, OrgSyncFailure, ScheduleError, SyncReport};
