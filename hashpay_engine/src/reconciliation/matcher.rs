use std::{collections::HashSet, fmt::Display, str::FromStr};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db_types::{ConversionError, Order, OrderId, Transfer};

/// The default relative tolerance on transfer amounts: 1%.
pub const DEFAULT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// How a transfer is assigned when more than one unmatched order in a group would accept it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchPolicy {
    /// The oldest acceptable order wins.
    #[default]
    FirstMatch,
    /// The order whose expected amount is closest to the transfer amount wins. Ties go to the oldest order.
    ClosestMatch,
}

impl Display for MatchPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchPolicy::FirstMatch => write!(f, "first"),
            MatchPolicy::ClosestMatch => write!(f, "closest"),
        }
    }
}

impl FromStr for MatchPolicy {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" | "first_match" | "firstmatch" => Ok(Self::FirstMatch),
            "closest" | "closest_match" | "closestmatch" | "best" => Ok(Self::ClosestMatch),
            s => Err(ConversionError::from(format!("Invalid match policy: {s}"))),
        }
    }
}

/// True if `actual` is strictly within `tolerance` (a fraction, e.g. 0.01 for 1%) of `expected`.
pub fn within_tolerance(expected: Decimal, actual: Decimal, tolerance: Decimal) -> bool {
    expected > Decimal::ZERO && (actual - expected).abs() < tolerance * expected
}

/// A transfer that has been assigned to an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub order_id: OrderId,
    pub transfer: Transfer,
}

/// Pairs observed transfers with the orders of a single `(chain, address)` group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Matcher {
    pub tolerance: Decimal,
    pub policy: MatchPolicy,
    /// When set, a transfer must be in the order's settlement currency to match it.
    pub check_currency: bool,
}

impl Default for Matcher {
    fn default() -> Self {
        Self { tolerance: DEFAULT_TOLERANCE, policy: MatchPolicy::default(), check_currency: false }
    }
}

impl Matcher {
    pub fn new(tolerance: Decimal, policy: MatchPolicy) -> Self {
        Self { tolerance, policy, check_currency: false }
    }

    pub fn with_currency_check(mut self, check: bool) -> Self {
        self.check_currency = check;
        self
    }

    /// Whether `transfer` would settle `order`, ignoring whether either has been used already.
    pub fn accepts(&self, order: &Order, transfer: &Transfer) -> bool {
        let Some(settlement) = order.settlement.as_ref() else {
            return false;
        };
        if self.check_currency && !settlement.currency.eq_ignore_ascii_case(&transfer.currency) {
            return false;
        }
        within_tolerance(settlement.amount, transfer.amount, self.tolerance)
    }

    /// Assigns each transfer to at most one order, and each order to at most one transfer.
    ///
    /// `orders` must be in creation order. Transfers are considered oldest first (ties broken by hash), so the
    /// outcome does not depend on the order in which a source happened to list them. Duplicate hashes are considered
    /// once. Transfers that match nothing are dropped.
    pub fn assign(&self, orders: &[Order], transfers: &[Transfer]) -> Vec<Assignment> {
        let mut transfers = transfers.iter().collect::<Vec<&Transfer>>();
        transfers.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.hash.cmp(&b.hash)));
        let mut seen = HashSet::new();
        let mut open = orders.iter().collect::<Vec<&Order>>();
        let mut result = Vec::new();
        for transfer in transfers {
            if open.is_empty() {
                break;
            }
            if !seen.insert(transfer.hash.as_str()) {
                continue;
            }
            if let Some(index) = self.pick(&open, transfer) {
                let order = open.remove(index);
                result.push(Assignment { order_id: order.order_id.clone(), transfer: transfer.clone() });
            }
        }
        result
    }

    fn pick(&self, open: &[&Order], transfer: &Transfer) -> Option<usize> {
        let mut candidates = open.iter().enumerate().filter(|(_, order)| self.accepts(order, transfer));
        match self.policy {
            MatchPolicy::FirstMatch => candidates.next().map(|(i, _)| i),
            MatchPolicy::ClosestMatch => candidates
                .filter_map(|(i, order)| order.settlement.as_ref().map(|s| (i, (s.amount - transfer.amount).abs())))
                .min_by(|(ia, da), (ib, db)| da.cmp(db).then_with(|| ia.cmp(ib)))
                .map(|(i, _)| i),
        }
    }
}
