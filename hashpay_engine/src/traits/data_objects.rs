use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db_types::Order;

/// The result of marking an order as paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// The order moved from `Pending` to `Paid` in this call.
    Confirmed(Order),
    /// The order had already been paid. Nothing was changed.
    AlreadyPaid(Order),
}

impl ConfirmOutcome {
    pub fn order(&self) -> &Order {
        match self {
            ConfirmOutcome::Confirmed(o) | ConfirmOutcome::AlreadyPaid(o) => o,
        }
    }

    pub fn into_order(self) -> Order {
        match self {
            ConfirmOutcome::Confirmed(o) | ConfirmOutcome::AlreadyPaid(o) => o,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, ConfirmOutcome::Confirmed(_))
    }
}

/// Aggregate order counts, plus the paid volume per requested currency.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStats {
    pub pending: i64,
    pub paid: i64,
    pub expired: i64,
    pub failed: i64,
    pub paid_volume: Vec<(String, Decimal)>,
}

impl OrderStats {
    pub fn total(&self) -> i64 {
        self.pending + self.paid + self.expired + self.failed
    }
}
