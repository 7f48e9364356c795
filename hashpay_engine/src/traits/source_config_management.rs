use std::future::Future;

use crate::{db_types::SourceConfig, traits::PaymentGatewayError};

/// Access to the source registration table.
pub trait SourceConfigManagement {
    /// All enabled source configurations, one per chain.
    fn fetch_source_configs(&self) -> impl Future<Output = Result<Vec<SourceConfig>, PaymentGatewayError>> + Send;

    /// Registers the source for `config.chain`, replacing any earlier registration for that chain.
    fn upsert_source_config(&self, config: &SourceConfig) -> impl Future<Output = Result<(), PaymentGatewayError>> + Send;
}
