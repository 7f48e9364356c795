//! # HashPay engine public API
//!
//! The `hpe_api` module exposes the programmatic API of the reconciliation engine. The API is modular, so that clients
//! can pick the parts they need.
//!
//! * [`order_flow_api`] is the order ledger. Every order lifecycle transition goes through it.
//! * [`exchange_rate_api`] quotes currency pairs by averaging a set of rate sources, with a short-lived cache.
//! * [`notification_api`] queues and delivers paid-order notifications, retrying failed deliveries with backoff.
//!
//! The other submodules hold the supporting types and the error taxonomy shared by the whole engine.
//!
//! # API usage
//!
//! An API instance is created by supplying a database backend that implements the backend traits it needs, plus the
//! shared components it collaborates with.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use hashpay_engine::{events::EventProducers, ExchangeRateApi, OrderFlowApi, SourceRegistry, SqliteDatabase};
//! let db = SqliteDatabase::new_with_url("sqlite://data/hashpay_store.db", 5).await?;
//! let rates = Arc::new(ExchangeRateApi::new());
//! let ledger = OrderFlowApi::new(db, rates, SourceRegistry::new(), EventProducers::default());
//! let order = ledger.create_order(dec!(100), "CNY", None).await?;
//! ```
pub mod errors;
pub mod exchange_objects;
pub mod exchange_rate_api;
pub mod notification_api;
pub mod notification_objects;
pub mod order_flow_api;
