use std::future::Future;

use crate::{db_types::Merchant, traits::PaymentGatewayError};

pub trait MerchantManagement {
    fn fetch_merchant(&self, id: &str) -> impl Future<Output = Result<Option<Merchant>, PaymentGatewayError>> + Send;

    /// Inserts the merchant, or replaces the existing record with the same id.
    fn upsert_merchant(&self, merchant: &Merchant) -> impl Future<Output = Result<(), PaymentGatewayError>> + Send;
}
