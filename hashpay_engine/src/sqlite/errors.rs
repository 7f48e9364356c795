use thiserror::Error;

use crate::traits::PaymentGatewayError;

/// Errors raised by the SQLite driver itself, i.e. while connecting or migrating. Query-level failures are reported
/// as [`PaymentGatewayError`]s.
#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Could not run database migrations: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
}

impl From<SqliteDatabaseError> for PaymentGatewayError {
    fn from(e: SqliteDatabaseError) -> Self {
        PaymentGatewayError::DatabaseError(e.to_string())
    }
}
