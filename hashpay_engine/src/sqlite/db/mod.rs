//! # SQLite Database methods
//!
//! This module contains "low-level" SQLite database interactions.
//!
//! All these interaction are maintained by simple functions (rather than stateful structs) that accept a
//! `&mut SqliteConnection` argument. Callers can obtain a connection from a pool,
//! or create an atomic transaction as the need arises and call through to the functions without any other changes.
//!
//! Timestamps are stored as integer milliseconds since the Unix epoch and decimal amounts as TEXT, so that both
//! compare and round-trip exactly.
use std::{env, str::FromStr, time::Duration};

use chrono::{DateTime, TimeZone, Utc};
use log::info;
use rust_decimal::Decimal;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions},
    SqlitePool,
};

use super::SqliteDatabaseError;
use crate::traits::PaymentGatewayError;

pub mod merchants;
pub mod notifications;
pub mod orders;
pub mod source_configs;
pub mod transfers;

const SQLITE_DB_URL: &str = "sqlite://data/hashpay_store.db";
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub fn db_url() -> String {
    let result = env::var("HP_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ HP_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

/// Opens a connection pool, creating the database file if it does not exist yet.
pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqliteDatabaseError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect_with(options).await?;
    Ok(pool)
}

pub(crate) fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>, PaymentGatewayError> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or_else(|| PaymentGatewayError::InvalidRecord(format!("{ms} is not a valid timestamp")))
}

pub(crate) fn opt_from_millis(ms: Option<i64>) -> Result<Option<DateTime<Utc>>, PaymentGatewayError> {
    ms.map(from_millis).transpose()
}

pub(crate) fn parse_decimal(value: &str) -> Result<Decimal, PaymentGatewayError> {
    Decimal::from_str(value).map_err(|e| PaymentGatewayError::InvalidRecord(format!("'{value}' is not a decimal: {e}")))
}

pub(crate) fn parse_field<T>(value: &str) -> Result<T, PaymentGatewayError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| PaymentGatewayError::InvalidRecord(e.to_string()))
}
