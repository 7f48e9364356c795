use hashpay_engine::{sqlite::SqliteDatabaseError, PaymentGatewayError};
use hashpay_sources::ProviderError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("Database error. {0}")]
    DatabaseError(#[from] SqliteDatabaseError),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(#[from] PaymentGatewayError),
    #[error("Could not build a provider adapter. {0}")]
    ProviderError(#[from] ProviderError),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
}
