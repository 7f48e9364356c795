use std::{fmt::Display, time::Duration};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::hpe_api::errors::ErrorCategory;

/// The price of one unit of `to`, expressed in `from`. With `from = CNY` and `to = USDT`, a rate of `7.2` means that
/// one USDT costs 7.2 CNY, so an amount in CNY is converted to USDT by dividing by the rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub from: String,
    pub to: String,
    pub rate: Decimal,
    pub fetched_at: DateTime<Utc>,
}

impl ExchangeRate {
    pub fn new(from: &str, to: &str, rate: Decimal, fetched_at: DateTime<Utc>) -> Self {
        Self { from: from.to_string(), to: to.to_string(), rate, fetched_at }
    }

    /// Converts an amount in `from` into `to`. Returns `None` for a zero rate.
    pub fn convert(&self, amount: Decimal) -> Option<Decimal> {
        amount.checked_div(self.rate)
    }

    /// A cached rate is served only while it is strictly younger than `ttl`.
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.fetched_at < ttl
    }
}

impl Display for ExchangeRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "1 {} => {} {}", self.to, self.rate, self.from)
    }
}

/// Where a quoted rate came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateOrigin {
    /// Both currencies are the same.
    Identity,
    /// Served from the cache without contacting any source.
    Cached,
    /// The mean of this many successful source responses.
    Aggregated(usize),
    /// No source answered. The fallback rate of 1 was used and not cached.
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateQuote {
    pub rate: ExchangeRate,
    pub origin: RateOrigin,
}

impl RateQuote {
    pub fn value(&self) -> Decimal {
        self.rate.rate
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == RateOrigin::Fallback
    }
}

#[derive(Debug, Clone, Error)]
pub enum RateSourceError {
    #[error("The rate source is unavailable: {0}")]
    Unavailable(String),
    #[error("The rate source does not quote {from}/{to}")]
    UnsupportedPair { from: String, to: String },
    #[error("The rate source returned a response that could not be understood: {0}")]
    InvalidResponse(String),
    #[error("The rate source did not respond within {0:?}")]
    Timeout(Duration),
    #[error("No rate source could provide {from}/{to}")]
    NoRateAvailable { from: String, to: String },
}

impl RateSourceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RateSourceError::UnsupportedPair { .. } => ErrorCategory::InvalidInput,
            _ => ErrorCategory::RateUnavailable,
        }
    }
}

/// A single provider of exchange rates, e.g. an exchange ticker or a price aggregator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RateSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// The price of one `to` in `from`. See [`ExchangeRate`].
    async fn fetch_rate(&self, from: &str, to: &str) -> Result<Decimal, RateSourceError>;
}
