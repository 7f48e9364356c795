use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Utc};
use log::*;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::{
    db_types::{
        currency_code,
        Chain,
        NewOrder,
        Notification,
        Order,
        OrderId,
        OrderStatusType,
        PaymentMethod,
        PaymentProof,
        Settlement,
        Transfer,
    },
    events::{EventProducers, OrderAnnulledEvent, OrderPaidEvent},
    hpe_api::{errors::OrderFlowError, exchange_rate_api::ExchangeRateApi, notification_api::NotificationQueue},
    sources::SourceRegistry,
    traits::{ConfirmOutcome, OrderStats, PaymentGatewayDatabase},
};

pub const DEFAULT_ORDER_TIMEOUT_SECS: i64 = 1800;
/// Settlement amounts are quoted to this many decimal places.
pub const SETTLEMENT_DECIMALS: u32 = 6;

/// `OrderFlowApi` is the order ledger. It owns every lifecycle transition of an order:
///
/// ```text
///   Pending ──▶ Paid      (confirm_payment / confirm_manually)
///      │
///      ├────▶ Expired   (expire_orders)
///      └────▶ Failed    (fail_order)
/// ```
///
/// The terminal states never change. Confirming an order that is already paid is a no-op that reports
/// [`ConfirmOutcome::AlreadyPaid`], so callers that race each other (the scheduler and an operator, say) cannot settle an
/// order twice or send its notifications twice.
///
/// The first successful confirmation queues the paid-order notifications and publishes an [`OrderPaidEvent`].
/// Expired and failed orders publish an [`OrderAnnulledEvent`].
pub struct OrderFlowApi<B> {
    db: B,
    rates: Arc<ExchangeRateApi>,
    sources: SourceRegistry,
    producers: EventProducers,
    notifications: NotificationQueue<B>,
    order_timeout: chrono::Duration,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi (order timeout: {}s)", self.order_timeout.num_seconds())
    }
}

impl<B: Clone> OrderFlowApi<B> {
    pub fn new(db: B, rates: Arc<ExchangeRateApi>, sources: SourceRegistry, producers: EventProducers) -> Self {
        let notifications = NotificationQueue::new(db.clone());
        Self {
            db,
            rates,
            sources,
            producers,
            notifications,
            order_timeout: chrono::Duration::seconds(DEFAULT_ORDER_TIMEOUT_SECS),
        }
    }
}

impl<B> OrderFlowApi<B> {
    pub fn with_notifications(mut self, notifications: NotificationQueue<B>) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn with_order_timeout(mut self, timeout: chrono::Duration) -> Self {
        self.order_timeout = timeout;
        self
    }

    pub fn order_timeout(&self) -> chrono::Duration {
        self.order_timeout
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    pub fn rates(&self) -> &ExchangeRateApi {
        &self.rates
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> OrderFlowApi<B>
where B: PaymentGatewayDatabase
{
    /// Creates a new `Pending` order for `amount` of `currency`. The order can be paid until `now + order_timeout`.
    pub async fn create_order(
        &self,
        amount: Decimal,
        currency: &str,
        merchant_id: Option<&str>,
    ) -> Result<Order, OrderFlowError> {
        if amount <= Decimal::ZERO {
            return Err(OrderFlowError::InvalidAmount(format!("Order amount must be positive, got {amount}")));
        }
        if currency.trim().is_empty() {
            return Err(OrderFlowError::InvalidInput("An order currency is required".into()));
        }
        let now = Utc::now();
        let mut order = NewOrder::new(amount, currency, now, now + self.order_timeout);
        if let Some(merchant) = merchant_id {
            order = order.with_merchant(merchant);
        }
        let order = self.db.insert_order(order).await?;
        info!(
            "🔄️📦️ Order [{}] created for {} {}. It expires at {}",
            order.order_id, order.amount, order.currency, order.expires_at
        );
        Ok(order)
    }

    /// Records how the customer will pay: `settlement_currency` sent to `address` on `chain`.
    ///
    /// The settlement amount is the order amount converted at the current aggregated rate and rounded to six decimal
    /// places. A payment method can be selected once only.
    pub async fn select_method(
        &self,
        order_id: &OrderId,
        chain: &Chain,
        settlement_currency: &str,
        address: &str,
    ) -> Result<Order, OrderFlowError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(OrderFlowError::InvalidInput("A settlement address is required".into()));
        }
        if settlement_currency.trim().is_empty() {
            return Err(OrderFlowError::InvalidInput("A settlement currency is required".into()));
        }
        let now = Utc::now();
        let order = self.fetch_order(order_id).await?;
        if !order.is_pending() {
            return Err(OrderFlowError::OrderNotPending { order_id: order_id.clone(), status: order.status });
        }
        if order.is_expired_at(now) {
            return Err(OrderFlowError::OrderExpired(order_id.clone()));
        }
        if order.settlement.is_some() {
            return Err(OrderFlowError::MethodAlreadySelected(order_id.clone()));
        }
        if order.amount <= Decimal::ZERO {
            return Err(OrderFlowError::InvalidAmount(format!("Order {order_id} has a non-positive amount")));
        }
        let method = match self.sources.get(chain).await {
            Some(source) if !source.validate_address(address) => {
                return Err(OrderFlowError::InvalidAddress { chain: chain.clone(), address: address.to_string() });
            },
            Some(source) => source.kind().payment_method(),
            None => {
                warn!(
                    "🔄️ No transfer source is registered for {chain}. Order [{order_id}] will not be matched \
                     automatically until one is."
                );
                PaymentMethod::Blockchain
            },
        };
        let settlement_currency = currency_code(settlement_currency);
        let quote = self.rates.fetch_rate(&order.currency, &settlement_currency).await;
        if quote.is_fallback() {
            warn!(
                "🔄️ No rate is available for {}/{settlement_currency}. Order [{order_id}] is priced at parity.",
                order.currency
            );
        }
        let amount = quote
            .rate
            .convert(order.amount)
            .map(|a| a.round_dp_with_strategy(SETTLEMENT_DECIMALS, RoundingStrategy::MidpointAwayFromZero))
            .filter(|a| *a > Decimal::ZERO)
            .ok_or_else(|| {
                OrderFlowError::InvalidAmount(format!(
                    "{} {} does not convert to a payable amount of {settlement_currency} at {}",
                    order.amount, order.currency, quote.rate
                ))
            })?;
        let settlement =
            Settlement { amount, currency: settlement_currency, chain: chain.clone(), address: address.to_string(), method };
        let order = self.db.set_settlement(order_id, &settlement, now).await?;
        info!(
            "🔄️💱️ Order [{order_id}] will be paid with {} {} on {chain} to {address}",
            settlement.amount, settlement.currency
        );
        Ok(order)
    }

    /// Marks the order as paid by an observed transfer. See [`Self::confirm_payment_at`].
    pub async fn confirm_payment(&self, order_id: &OrderId, transfer: &Transfer) -> Result<ConfirmOutcome, OrderFlowError> {
        self.confirm_payment_at(order_id, transfer, Utc::now()).await
    }

    /// Marks the order as paid by `transfer`, which is recorded against the order's settlement chain so that it can
    /// never settle another order.
    ///
    /// * An order that is already `Paid` is left alone and [`ConfirmOutcome::AlreadyPaid`] is returned.
    /// * An order that has expired, even if the sweep has not caught up with it yet, gives
    ///   [`OrderFlowError::OrderExpired`].
    /// * A failed order gives [`OrderFlowError::OrderNotPending`].
    pub async fn confirm_payment_at(
        &self,
        order_id: &OrderId,
        transfer: &Transfer,
        now: DateTime<Utc>,
    ) -> Result<ConfirmOutcome, OrderFlowError> {
        let order = self.confirmable_order(order_id, now).await?;
        if order.status == OrderStatusType::Paid {
            trace!("🔄️✅️ Order [{order_id}] is already paid. Ignoring transfer {}", transfer.hash);
            return Ok(ConfirmOutcome::AlreadyPaid(order));
        }
        let chain = order.settlement.as_ref().map(|s| s.chain.clone()).ok_or_else(|| {
            OrderFlowError::InvalidInput(format!("No payment method has been selected for order {order_id}"))
        })?;
        let proof = PaymentProof::Transfer { chain, transfer: transfer.clone() };
        self.settle(&order, proof, now).await
    }

    /// Marks the order as paid after an operator has verified the payment by hand. The same rules as for
    /// [`Self::confirm_payment`] apply.
    pub async fn confirm_manually(
        &self,
        order_id: &OrderId,
        tx_hash: &str,
        reviewer: &str,
    ) -> Result<ConfirmOutcome, OrderFlowError> {
        let tx_hash = tx_hash.trim();
        if tx_hash.is_empty() {
            return Err(OrderFlowError::InvalidInput("A transaction hash is required for manual confirmation".into()));
        }
        let now = Utc::now();
        let order = self.confirmable_order(order_id, now).await?;
        if order.status == OrderStatusType::Paid {
            trace!("🔄️✅️ Order [{order_id}] is already paid. Ignoring manual confirmation by {reviewer}");
            return Ok(ConfirmOutcome::AlreadyPaid(order));
        }
        let proof = PaymentProof::Manual { tx_hash: tx_hash.to_string(), reviewer: reviewer.to_string() };
        let outcome = self.settle(&order, proof, now).await?;
        info!("🔄️✅️ Order [{order_id}] was confirmed manually by {reviewer}");
        Ok(outcome)
    }

    /// Expires every `Pending` order whose payment window has closed, returning how many were expired.
    pub async fn expire_orders(&self) -> Result<usize, OrderFlowError> {
        self.expire_orders_at(Utc::now()).await
    }

    pub async fn expire_orders_at(&self, now: DateTime<Utc>) -> Result<usize, OrderFlowError> {
        let expired = self.db.expire_orders(now).await?;
        let count = expired.len();
        for order in expired {
            debug!("🔄️⏰️ Order [{}] expired at {}", order.order_id, order.expires_at);
            self.producers.publish_order_annulled(OrderAnnulledEvent::new(order)).await;
        }
        if count > 0 {
            info!("🔄️⏰️ {count} orders expired");
        }
        Ok(count)
    }

    /// Administratively rejects a `Pending` order. The reason is kept in the order memo.
    pub async fn fail_order(&self, order_id: &OrderId, reason: &str) -> Result<Order, OrderFlowError> {
        let order = self.db.mark_order_failed(order_id, reason, Utc::now()).await?;
        info!("🔄️❌️ Order [{order_id}] marked as failed: {reason}");
        self.producers.publish_order_annulled(OrderAnnulledEvent::new(order.clone())).await;
        Ok(order)
    }

    pub async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, OrderFlowError> {
        self.db.fetch_order_by_order_id(order_id).await?.ok_or_else(|| OrderFlowError::OrderNotFound(order_id.clone()))
    }

    pub async fn fetch_notifications(&self, order_id: &OrderId) -> Result<Vec<Notification>, OrderFlowError> {
        Ok(self.db.fetch_notifications_for_order(order_id).await?)
    }

    pub async fn order_stats(&self) -> Result<OrderStats, OrderFlowError> {
        Ok(self.db.fetch_order_stats().await?)
    }

    /// Fetches the order and rejects the states that can never be confirmed. `Paid` orders are passed through.
    async fn confirmable_order(&self, order_id: &OrderId, now: DateTime<Utc>) -> Result<Order, OrderFlowError> {
        let order = self.fetch_order(order_id).await?;
        match order.status {
            OrderStatusType::Paid => Ok(order),
            OrderStatusType::Expired => Err(OrderFlowError::OrderExpired(order_id.clone())),
            OrderStatusType::Failed => {
                Err(OrderFlowError::OrderNotPending { order_id: order_id.clone(), status: order.status })
            },
            OrderStatusType::Pending if order.is_expired_at(now) => {
                debug!("🔄️⏰️ Order [{order_id}] is past its deadline but has not been swept yet");
                Err(OrderFlowError::OrderExpired(order_id.clone()))
            },
            OrderStatusType::Pending => Ok(order),
        }
    }

    /// Marks `order` as paid by `proof`. The paid-order notifications are written in the same transaction as the
    /// status change, so a paid order always has them.
    async fn settle(
        &self,
        order: &Order,
        proof: PaymentProof,
        now: DateTime<Utc>,
    ) -> Result<ConfirmOutcome, OrderFlowError> {
        let order_id = &order.order_id;
        let mut paid = order.clone();
        paid.status = OrderStatusType::Paid;
        paid.tx_hash = Some(proof.tx_hash().to_string());
        paid.paid_at = Some(now);
        paid.updated_at = now;
        let notifications = self.notifications.paid_order_notifications(&paid, now).await?;
        let outcome = self.db.mark_order_paid(order_id, &proof, now, &notifications).await?;
        match &outcome {
            ConfirmOutcome::Confirmed(order) => {
                info!("🔄️✅️ Order [{order_id}] is paid by {}", proof.tx_hash());
                self.producers.publish_order_paid(OrderPaidEvent::new(order.clone())).await;
            },
            ConfirmOutcome::AlreadyPaid(_) => {
                trace!("🔄️✅️ Order [{order_id}] was paid concurrently. Nothing more to do.");
            },
        }
        Ok(outcome)
    }
}
