use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{
    db_types::{SourceKind, Transfer},
    hpe_api::errors::ErrorCategory,
};

#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("The source is unavailable: {0}")]
    SourceUnavailable(String),
    #[error("The source returned a response that could not be understood: {0}")]
    InvalidResponse(String),
    #[error("The source did not respond within {0:?}")]
    Timeout(Duration),
    #[error("Transfer {0} is not known to the source")]
    NotFound(String),
}

impl SourceError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            SourceError::NotFound(_) => ErrorCategory::NotFound,
            _ => ErrorCategory::SourceUnavailable,
        }
    }
}

/// The contract every chain or exchange adapter implements.
///
/// Implementations do all normalisation: amounts are returned in whole token units (not base units), and currency
/// symbols in upper case. They contain no scheduling logic of their own; the reconciliation scheduler decides when to
/// call them and bounds every call with a timeout.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransferSource: Send + Sync {
    /// A short name for logging, e.g. `trongrid`.
    fn name(&self) -> &'static str;

    /// Whether this source watches a chain directly or an exchange account.
    fn kind(&self) -> SourceKind {
        SourceKind::Chain
    }

    /// Incoming transfers to `address` observed at or after `since`. The result is unordered.
    async fn get_transfers(&self, address: &str, since: DateTime<Utc>) -> Result<Vec<Transfer>, SourceError>;

    /// Looks up a single transfer by hash. Returns [`SourceError::NotFound`] if the source does not know it.
    async fn get_transfer(&self, hash: &str) -> Result<Transfer, SourceError>;

    /// Checks the format of `address` only. No network access.
    fn validate_address(&self, address: &str) -> bool;
}
