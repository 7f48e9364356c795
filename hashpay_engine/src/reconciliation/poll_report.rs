use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// What happened to a single `(chain, address)` group during a poll cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GroupOutcome {
    pub status: GroupStatus,
    /// Eligible transfers returned by the source, after filtering out those that have already settled an order.
    pub transfers: usize,
    pub matched: usize,
    pub confirmed: usize,
    pub already_paid: usize,
    /// Matches that the ledger refused, e.g. because the order expired in the meantime.
    pub rejected: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GroupStatus {
    #[default]
    Polled,
    /// No source is registered for the group's chain.
    NoSource,
    /// The source failed or timed out, or storage could not be read. There is no information for this cycle.
    Failed,
}

/// A summary of one reconciliation cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollReport {
    /// Payable orders found at the start of the cycle.
    pub orders: usize,
    pub groups: usize,
    pub skipped_groups: usize,
    pub failed_groups: usize,
    pub transfers: usize,
    pub matched: usize,
    pub confirmed: usize,
    pub already_paid: usize,
    pub rejected: usize,
}

impl PollReport {
    pub fn record(&mut self, outcome: GroupOutcome) {
        self.groups += 1;
        match outcome.status {
            GroupStatus::Polled => {},
            GroupStatus::NoSource => self.skipped_groups += 1,
            GroupStatus::Failed => self.failed_groups += 1,
        }
        self.transfers += outcome.transfers;
        self.matched += outcome.matched;
        self.confirmed += outcome.confirmed;
        self.already_paid += outcome.already_paid;
        self.rejected += outcome.rejected;
    }

    /// True if every group was polled and every match was accepted.
    pub fn is_clean(&self) -> bool {
        self.skipped_groups == 0 && self.failed_groups == 0 && self.rejected == 0
    }
}

impl Display for PollReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} orders in {} groups ({} without a source, {} failed). {} transfers, {} matched, {} confirmed, {} \
             already paid, {} rejected",
            self.orders,
            self.groups,
            self.skipped_groups,
            self.failed_groups,
            self.transfers,
            self.matched,
            self.confirmed,
            self.already_paid,
            self.rejected
        )
    }
}
