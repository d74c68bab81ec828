pub mod audits;
