use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
    db_types::{Chain, NewNotification, NewOrder, Order, OrderId, PaymentProof, Settlement},
    traits::{ConfirmOutcome, OrderStats, PaymentGatewayError},
};

/// The `OrderManagement` trait defines order storage and the lifecycle transitions of the order state machine.
///
/// Orders are never deleted. `Pending` may move to `Paid`, `Expired` or `Failed`; the terminal states never change.
pub trait OrderManagement {
    /// Stores a brand-new order in the `Pending` state. Fails with [`PaymentGatewayError::OrderAlreadyExists`] if the
    /// order id is taken.
    fn insert_order(&self, order: NewOrder) -> impl Future<Output = Result<Order, PaymentGatewayError>> + Send;

    fn fetch_order_by_order_id(
        &self,
        order_id: &OrderId,
    ) -> impl Future<Output = Result<Option<Order>, PaymentGatewayError>> + Send;

    /// Orders that are `Pending`, have a settlement and have not reached `expires_at` at `now`, oldest first.
    fn fetch_payable_orders(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Vec<Order>, PaymentGatewayError>> + Send;

    /// Records the payment method for a `Pending` order. The settlement can only be set once.
    fn set_settlement(
        &self,
        order_id: &OrderId,
        settlement: &Settlement,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Order, PaymentGatewayError>> + Send;

    /// Atomically moves a `Pending` order to `Paid`, records the proof, so that the same transfer can never settle a
    /// second order, and queues `notifications`. Either all of these happen or none do.
    ///
    /// * An order that is already `Paid` is left untouched and [`ConfirmOutcome::AlreadyPaid`] is returned.
    /// * Any other non-pending status results in [`PaymentGatewayError::OrderNotPending`].
    /// * A transfer hash already recorded against a different order results in
    ///   [`PaymentGatewayError::TransferAlreadyClaimed`].
    fn mark_order_paid(
        &self,
        order_id: &OrderId,
        proof: &PaymentProof,
        paid_at: DateTime<Utc>,
        notifications: &[NewNotification],
    ) -> impl Future<Output = Result<ConfirmOutcome, PaymentGatewayError>> + Send;

    /// Moves a `Pending` order to `Failed`, storing the reason in the memo.
    fn mark_order_failed(
        &self,
        order_id: &OrderId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<Order, PaymentGatewayError>> + Send;

    /// Moves every `Pending` order with `expires_at <= now` to `Expired`, returning the updated orders.
    fn expire_orders(&self, now: DateTime<Utc>) -> impl Future<Output = Result<Vec<Order>, PaymentGatewayError>> + Send;

    /// Returns the subset of `hashes` already recorded as having settled an order on `chain`.
    fn fetch_claimed_transfers(
        &self,
        chain: &Chain,
        hashes: &[String],
    ) -> impl Future<Output = Result<Vec<String>, PaymentGatewayError>> + Send;

    fn fetch_order_stats(&self) -> impl Future<Output = Result<OrderStats, PaymentGatewayError>> + Send;
}
