use std::future::Future;

use thiserror::Error;

use crate::{
    db_types::{OrderId, OrderStatusType},
    hpe_api::errors::ErrorCategory,
    traits::{MerchantManagement, NotificationManagement, OrderManagement, SourceConfigManagement},
};

/// This trait defines the highest level of behaviour for backends supporting the HashPay engine.
///
/// A backend is cheap to clone (it is usually a handle to a connection pool) and is shared between the ledger, the
/// reconciliation scheduler and the background workers.
pub trait PaymentGatewayDatabase:
    Clone + Send + Sync + 'static + OrderManagement + NotificationManagement + MerchantManagement + SourceConfigManagement
{
    /// The URL of the database
    fn url(&self) -> &str;

    /// Closes all connections to the backend.
    fn close(&self) -> impl Future<Output = Result<(), PaymentGatewayError>> + Send;
}

#[derive(Debug, Clone, Error)]
pub enum PaymentGatewayError {
    #[error("We have an internal database engine (configuration/uptime etc.) : {0}")]
    DatabaseError(String),
    #[error("A stored record could not be decoded: {0}")]
    InvalidRecord(String),
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} is {status}, and can no longer change")]
    OrderNotPending { order_id: OrderId, status: OrderStatusType },
    #[error("A payment method has already been selected for order {0}")]
    SettlementAlreadySet(OrderId),
    #[error("Transfer {tx_hash} has already settled order {claimed_by}")]
    TransferAlreadyClaimed { tx_hash: String, claimed_by: OrderId },
    #[error("The requested notification {0} does not exist")]
    NotificationNotFound(i64),
    #[error("Notification {0} has already been delivered or abandoned")]
    NotificationClosed(i64),
}

impl PaymentGatewayError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            PaymentGatewayError::DatabaseError(_) | PaymentGatewayError::InvalidRecord(_) => ErrorCategory::Storage,
            PaymentGatewayError::OrderNotFound(_) | PaymentGatewayError::NotificationNotFound(_) => {
                ErrorCategory::NotFound
            },
            PaymentGatewayError::OrderAlreadyExists(_) |
            PaymentGatewayError::OrderNotPending { .. } |
            PaymentGatewayError::SettlementAlreadySet(_) |
            PaymentGatewayError::TransferAlreadyClaimed { .. } |
            PaymentGatewayError::NotificationClosed(_) => ErrorCategory::InvalidState,
        }
    }
}

impl From<sqlx::Error> for PaymentGatewayError {
    fn from(e: sqlx::Error) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}
