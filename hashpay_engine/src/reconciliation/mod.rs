//! The reconciliation loop: matching observed transfers to the orders they pay for.
//!
//! [`scheduler`] drives the loop and the ledger transitions. [`matcher`] holds the pure matching rules, which are
//! independent of storage and sources.
pub mod matcher;
pub mod poll_report;
pub mod scheduler;

pub use matcher::{within_tolerance, Assignment, MatchPolicy, Matcher, DEFAULT_TOLERANCE};
pub use poll_report::{GroupOutcome, GroupStatus, PollReport};
pub use scheduler::{ReconciliationScheduler, SchedulerConfig};
