//! HashPay Reconciliation Engine
//!
//! The engine settles orders denominated in one currency against proofs of payment observed on external ledgers:
//! on-chain token transfers and exchange deposits. External ledgers are polled rather than pushed, amounts carry
//! slippage, and the same external transfer must never settle more than one order. This library contains the core
//! logic for all of that. It is provider-agnostic: concrete chain, exchange and rate adapters are plugged in through
//! the traits in [`sources`] and [`hpe_api::exchange_objects`].
//!
//! The library is divided into these main sections:
//! 1. Storage ([`traits`] and, with the `sqlite` feature, [`SqliteDatabase`]). You should never need to access the
//!    database directly. The data types used in storage are defined in [`db_types`] and are public.
//! 2. The public API ([`hpe_api`]): the order ledger ([`OrderFlowApi`]), the rate aggregator ([`ExchangeRateApi`]) and
//!    notification delivery ([`NotificationApi`]).
//! 3. The [`reconciliation`] loop, which polls the registered sources and drives the ledger.
//!
//! The engine also emits events when an order is paid or annulled. A simple actor framework ([`events`]) lets you hook
//! into these and perform custom actions.
pub mod db_types;
pub mod events;
pub mod helpers;
pub mod hpe_api;
pub mod reconciliation;
pub mod sources;
pub mod traits;

#[cfg(feature = "sqlite")]
pub mod sqlite;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use hpe_api::{
    errors::{ErrorCategory, OrderFlowError},
    exchange_objects::{ExchangeRate, RateOrigin, RateQuote, RateSource, RateSourceError},
    exchange_rate_api::ExchangeRateApi,
    notification_api::{NotificationApi, NotificationQueue},
    notification_objects::{
        CallbackPayload,
        DeliveryError,
        DeliveryReport,
        DeliveryRequest,
        NotificationDispatcher,
        RetryPolicy,
    },
    order_flow_api::OrderFlowApi,
};
pub use reconciliation::{MatchPolicy, PollReport, ReconciliationScheduler, SchedulerConfig};
pub use sources::{SourceError, SourceRegistry, TransferSource};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{ConfirmOutcome, PaymentGatewayDatabase, PaymentGatewayError};
