use std::fmt::Display;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    db_types::{Chain, OrderId, OrderStatusType},
    traits::PaymentGatewayError,
};

/// The coarse classification shared by every error type in the engine. Front ends map these onto their own
/// responses (e.g. HTTP status codes) without having to know each concrete error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    NotFound,
    InvalidState,
    InvalidInput,
    SourceUnavailable,
    RateUnavailable,
    DeliveryFailed,
    Storage,
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorCategory::NotFound => "NotFound",
            ErrorCategory::InvalidState => "InvalidState",
            ErrorCategory::InvalidInput => "InvalidInput",
            ErrorCategory::SourceUnavailable => "SourceUnavailable",
            ErrorCategory::RateUnavailable => "RateUnavailable",
            ErrorCategory::DeliveryFailed => "DeliveryFailed",
            ErrorCategory::Storage => "Storage",
        };
        f.write_str(s)
    }
}

/// Errors surfaced to callers of the order ledger.
#[derive(Debug, Clone, Error)]
pub enum OrderFlowError {
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} is {status}, not Pending")]
    OrderNotPending { order_id: OrderId, status: OrderStatusType },
    #[error("Order {0} has expired")]
    OrderExpired(OrderId),
    #[error("A payment method has already been selected for order {0}")]
    MethodAlreadySelected(OrderId),
    #[error("Transfer {tx_hash} has already settled order {claimed_by}")]
    TransferAlreadyClaimed { tx_hash: String, claimed_by: OrderId },
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("{address} is not a valid address on {chain}")]
    InvalidAddress { chain: Chain, address: String },
    #[error("Invalid request: {0}")]
    InvalidInput(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl OrderFlowError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            OrderFlowError::OrderNotFound(_) => ErrorCategory::NotFound,
            OrderFlowError::OrderNotPending { .. } |
            OrderFlowError::OrderExpired(_) |
            OrderFlowError::MethodAlreadySelected(_) |
            OrderFlowError::TransferAlreadyClaimed { .. } => ErrorCategory::InvalidState,
            OrderFlowError::InvalidAmount(_) |
            OrderFlowError::InvalidAddress { .. } |
            OrderFlowError::InvalidInput(_) => ErrorCategory::InvalidInput,
            OrderFlowError::DatabaseError(_) => ErrorCategory::Storage,
        }
    }
}

impl From<PaymentGatewayError> for OrderFlowError {
    fn from(e: PaymentGatewayError) -> Self {
        match e {
            PaymentGatewayError::OrderNotFound(id) => OrderFlowError::OrderNotFound(id),
            PaymentGatewayError::OrderNotPending { order_id, status: OrderStatusType::Expired } => {
                OrderFlowError::OrderExpired(order_id)
            },
            PaymentGatewayError::OrderNotPending { order_id, status } => {
                OrderFlowError::OrderNotPending { order_id, status }
            },
            PaymentGatewayError::SettlementAlreadySet(id) => OrderFlowError::MethodAlreadySelected(id),
            PaymentGatewayError::TransferAlreadyClaimed { tx_hash, claimed_by } => {
                OrderFlowError::TransferAlreadyClaimed { tx_hash, claimed_by }
            },
            e => OrderFlowError::DatabaseError(e.to_string()),
        }
    }
}
