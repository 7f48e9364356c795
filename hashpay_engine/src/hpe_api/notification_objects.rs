use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hpg_common::Secret;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db_types::{Notification, NotificationKind, Order, OrderId, OrderStatusType},
    hpe_api::errors::ErrorCategory,
};

pub const DEFAULT_RETRY_DELAY_SECS: i64 = 300;
pub const DEFAULT_MAX_RETRIES: i64 = 5;

/// The body POSTed to merchant callback and notify URLs when an order is paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackPayload {
    pub order_id: OrderId,
    /// Lower case on the wire, e.g. `"paid"`.
    #[serde(with = "lowercase_status")]
    pub status: OrderStatusType,
    pub amount: Decimal,
    pub currency: String,
    pub settlement_amount: Option<Decimal>,
    pub settlement_currency: Option<String>,
    pub chain: Option<String>,
    pub tx_hash: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    /// Unix timestamp (seconds) of when the payload was built.
    pub timestamp: i64,
}

mod lowercase_status {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use crate::db_types::OrderStatusType;

    pub fn serialize<S: Serializer>(status: &OrderStatusType, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&status.to_string().to_ascii_lowercase())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<OrderStatusType, D::Error> {
        let s = String::deserialize(deserializer)?;
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatusType::Pending),
            "paid" => Ok(OrderStatusType::Paid),
            "expired" => Ok(OrderStatusType::Expired),
            "failed" => Ok(OrderStatusType::Failed),
            _ => Err(D::Error::custom(format!("Invalid order status: {s}"))),
        }
    }
}

impl CallbackPayload {
    pub fn for_order(order: &Order, now: DateTime<Utc>) -> Self {
        let settlement = order.settlement.as_ref();
        Self {
            order_id: order.order_id.clone(),
            status: order.status,
            amount: order.amount,
            currency: order.currency.clone(),
            settlement_amount: settlement.map(|s| s.amount),
            settlement_currency: settlement.map(|s| s.currency.clone()),
            chain: settlement.map(|s| s.chain.to_string()),
            tx_hash: order.tx_hash.clone(),
            paid_at: order.paid_at,
            timestamp: now.timestamp(),
        }
    }
}

/// The operator-facing message for a paid order.
pub fn paid_order_alert(order: &Order) -> String {
    let mut message = format!("✅ Order {} paid: {} {}", order.order_id, order.amount, order.currency);
    if let Some(s) = &order.settlement {
        message.push_str(&format!(" ({} {} on {} to {})", s.amount, s.currency, s.chain, s.address));
    }
    if let Some(hash) = &order.tx_hash {
        message.push_str(&format!("\nTx: {hash}"));
    }
    if let Some(merchant) = &order.merchant_id {
        message.push_str(&format!("\nMerchant: {merchant}"));
    }
    message
}

/// Everything a dispatcher needs to make one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRequest {
    pub notification_id: i64,
    pub order_id: OrderId,
    pub kind: NotificationKind,
    pub target: String,
    pub payload: String,
    /// The merchant's API key, sent along with callbacks and webhooks.
    pub api_key: Option<Secret<String>>,
}

impl DeliveryRequest {
    pub fn new(notification: &Notification, api_key: Option<Secret<String>>) -> Self {
        Self {
            notification_id: notification.id,
            order_id: notification.order_id.clone(),
            kind: notification.kind,
            target: notification.target.clone(),
            payload: notification.payload.clone(),
            api_key,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("The receiver responded with HTTP {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Could not reach the receiver: {0}")]
    Transport(String),
    #[error("Invalid delivery target: {0}")]
    InvalidTarget(String),
    #[error("The receiver did not respond within {0:?}")]
    Timeout(Duration),
}

impl DeliveryError {
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::DeliveryFailed
    }
}

/// Sends notifications over the wire. Any error counts as a failed attempt and is retried later.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn deliver(&self, request: &DeliveryRequest) -> Result<(), DeliveryError>;
}

/// Linear backoff with a cap on the number of attempts: the n-th failure is retried after `n * base_delay`, and the
/// notification is abandoned once it has failed `max_retries` times.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: chrono::Duration,
    pub max_retries: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { base_delay: chrono::Duration::seconds(DEFAULT_RETRY_DELAY_SECS), max_retries: DEFAULT_MAX_RETRIES }
    }
}

impl RetryPolicy {
    pub fn next_retry(&self, now: DateTime<Utc>, retry_count: i64) -> DateTime<Utc> {
        let multiplier = i32::try_from(retry_count).unwrap_or(i32::MAX);
        now + self.base_delay * multiplier
    }

    pub fn is_exhausted(&self, retry_count: i64) -> bool {
        retry_count >= self.max_retries
    }
}

/// A summary of one pass over the notification queue.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub attempted: usize,
    pub sent: usize,
    pub retried: usize,
    pub dead: usize,
    /// Outcomes that could not be written back to storage. These notifications will be attempted again.
    pub storage_errors: usize,
}
