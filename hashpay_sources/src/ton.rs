use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hashpay_engine::{
    db_types::{currency_code, Transfer, TransferStatus},
    SourceError,
    TransferSource,
};
use log::*;
use reqwest::header::{HeaderMap, HeaderValue};

use crate::{
    api::RestClient,
    config::ProviderConfig,
    data_objects::{JettonTransfer, JettonTransfers},
    helpers::{from_secs, is_ton_address, parse_base_units},
    ProviderError,
};

/// The USDT Jetton master contract on TON mainnet.
pub const USDT_JETTON_MASTER: &str = "EQCxE6mUtQJKFnGfaROTKOt1lZbDiiX1kCixRv7Nw2Id_sDs";
const JETTON_TRANSFERS: &str = "/api/v3/jetton/transfers";
const PAGE_SIZE: &str = "50";

/// The Jetton a [`TonSource`] watches.
#[derive(Debug, Clone)]
pub struct Jetton {
    pub master: String,
    pub symbol: String,
    pub decimals: u32,
}

impl Default for Jetton {
    fn default() -> Self {
        Self { master: USDT_JETTON_MASTER.to_string(), symbol: "USDT".to_string(), decimals: 6 }
    }
}

/// Watches incoming Jetton transfers through the TON Center v3 API.
///
/// TON addresses have several encodings. Register the wallet in the form TON Center reports as the transfer
/// destination; addresses are compared exactly.
#[derive(Clone)]
pub struct TonSource {
    client: RestClient,
    jetton: Jetton,
}

impl TonSource {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        if !config.api_key.is_empty() {
            let key = HeaderValue::from_str(config.api_key.reveal())
                .map_err(|e| ProviderError::Initialization(format!("Invalid TON Center API key. {e}")))?;
            headers.insert("X-API-Key", key);
        }
        let client = RestClient::new(&config.endpoint, headers)?;
        Ok(Self { client, jetton: Jetton::default() })
    }

    pub fn with_jetton(mut self, jetton: Jetton) -> Self {
        self.jetton = jetton;
        self
    }

    pub async fn fetch_transfers(&self, address: &str, since: DateTime<Utc>) -> Result<Vec<Transfer>, ProviderError> {
        let start = since.timestamp().to_string();
        let params = [
            ("owner_address", address),
            ("jetton_master", self.jetton.master.as_str()),
            ("direction", "in"),
            ("start_utime", start.as_str()),
            ("limit", PAGE_SIZE),
        ];
        let response = self.client.get::<JettonTransfers>(JETTON_TRANSFERS, &params).await?;
        let since = since.timestamp();
        let transfers = response
            .transfers
            .into_iter()
            .filter(|t| t.transaction_time >= since && t.destination == address && !t.transaction_aborted)
            .map(|t| jetton_to_transfer(t, &self.jetton))
            .collect::<Result<Vec<_>, _>>()?;
        trace!("🔌️ TON Center returned {} transfers to {address}", transfers.len());
        Ok(transfers)
    }

    pub async fn fetch_transfer(&self, hash: &str) -> Result<Transfer, ProviderError> {
        let params = [("transaction_hash", hash), ("jetton_master", self.jetton.master.as_str())];
        let transfer = self
            .client
            .get::<JettonTransfers>(JETTON_TRANSFERS, &params)
            .await?
            .transfers
            .into_iter()
            .find(|t| t.transaction_hash == hash)
            .ok_or_else(|| ProviderError::NotFound(format!("Transfer {hash}")))?;
        jetton_to_transfer(transfer, &self.jetton)
    }
}

fn jetton_to_transfer(t: JettonTransfer, jetton: &Jetton) -> Result<Transfer, ProviderError> {
    let status = if t.transaction_aborted { TransferStatus::Pending } else { TransferStatus::Confirmed };
    Ok(Transfer {
        amount: parse_base_units(&t.amount, jetton.decimals)?,
        currency: currency_code(&jetton.symbol),
        timestamp: from_secs(t.transaction_time)?,
        hash: t.transaction_hash,
        from: t.source,
        to: t.destination,
        block_number: None,
        status,
    })
}

#[async_trait]
impl TransferSource for TonSource {
    fn name(&self) -> &'static str {
        "toncenter"
    }

    async fn get_transfers(&self, address: &str, since: DateTime<Utc>) -> Result<Vec<Transfer>, SourceError> {
        Ok(self.fetch_transfers(address, since).await?)
    }

    async fn get_transfer(&self, hash: &str) -> Result<Transfer, SourceError> {
        Ok(self.fetch_transfer(hash).await?)
    }

    fn validate_address(&self, address: &str) -> bool {
        is_ton_address(address)
    }
}
