//! # HashPay server
//! This crate runs the HashPay reconciliation engine as a long-lived process. It is responsible for:
//! * Building the transfer sources listed in the source registration table, and the configured rate sources.
//! * Running the reconciliation scheduler, which confirms orders as their payments are observed.
//! * Running the expiry worker, which closes orders that were not paid in time.
//! * Running the notification worker, which delivers callbacks, webhooks and operator alerts.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
pub mod cli;
pub mod config;
pub mod errors;
pub mod expiry_worker;
pub mod hooks;
pub mod notification_worker;
pub mod server;
