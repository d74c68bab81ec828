//! Core engine for recurring branch compliance audits.
//!
//! The heart of the crate lives in [`workflows::audits`]: a period calculator
//! that understands organization time zones, a scheduler that keeps exactly
//! one audit per branch/survey/period, and the lifecycle state machine that
//! validates every status transition an auditor, branch manager, or admin can
//! request.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
