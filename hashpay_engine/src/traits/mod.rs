//! #  Storage backends
//!
//! This module defines the interface contracts of the payment engine storage *backends*. The engine's APIs are
//! generic over a backend type `B`, and only call through these traits.
//!
//! * [`OrderManagement`] owns order lifecycle transitions. Every transition is a conditional, atomic update: a backend
//!   must report an invalid transition rather than overwrite a terminal state.
//! * [`NotificationManagement`] persists the outbound notification queue and its retry bookkeeping.
//! * [`MerchantManagement`] provides read access to merchant sites and their callback settings.
//! * [`SourceConfigManagement`] lists the transfer sources that should be built at start-up.
//! * [`PaymentGatewayDatabase`] ties the above together.
//!
//! Trait methods return `Send` futures, so that APIs generic over a backend can be driven from spawned tasks.
mod data_objects;
mod merchant_management;
mod notification_management;
mod order_management;
mod payment_gateway_database;
mod source_config_management;

pub use data_objects::{ConfirmOutcome, OrderStats};
pub use merchant_management::MerchantManagement;
pub use notification_management::NotificationManagement;
pub use order_management::OrderManagement;
pub use payment_gateway_database::{PaymentGatewayDatabase, PaymentGatewayError};
pub use source_config_management::SourceConfigManagement;
