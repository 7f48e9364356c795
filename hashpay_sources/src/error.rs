use hashpay_engine::{db_types::ConversionError, DeliveryError, RateSourceError, SourceError};
use thiserror::Error;

use crate::api::DEFAULT_TIMEOUT;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Invalid REST request: {0}")]
    RestRequestError(String),
    #[error("Invalid REST response: {0}")]
    RestResponseError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("The provider did not respond in time")]
    Timeout,
    #[error("The provider reported an error: {0}")]
    ApiError(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("{0} was not found")]
    NotFound(String),
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else if e.is_decode() {
            ProviderError::JsonError(e.to_string())
        } else if e.is_builder() {
            ProviderError::RestRequestError(e.to_string())
        } else {
            ProviderError::RestResponseError(e.to_string())
        }
    }
}

impl From<ConversionError> for ProviderError {
    fn from(e: ConversionError) -> Self {
        ProviderError::JsonError(e.to_string())
    }
}

impl From<ProviderError> for SourceError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::NotFound(what) => SourceError::NotFound(what),
            ProviderError::Timeout => SourceError::Timeout(DEFAULT_TIMEOUT),
            ProviderError::JsonError(_) | ProviderError::InvalidAmount(_) => SourceError::InvalidResponse(e.to_string()),
            e => SourceError::SourceUnavailable(e.to_string()),
        }
    }
}

impl From<ProviderError> for RateSourceError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Timeout => RateSourceError::Timeout(DEFAULT_TIMEOUT),
            ProviderError::JsonError(_) | ProviderError::InvalidAmount(_) => {
                RateSourceError::InvalidResponse(e.to_string())
            },
            e => RateSourceError::Unavailable(e.to_string()),
        }
    }
}

impl From<ProviderError> for DeliveryError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::Timeout => DeliveryError::Timeout(DEFAULT_TIMEOUT),
            ProviderError::QueryError { status, message } => DeliveryError::Rejected { status, body: message },
            ProviderError::RestRequestError(s) => DeliveryError::InvalidTarget(s),
            e => DeliveryError::Transport(e.to_string()),
        }
    }
}
