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
    data_objects::{Trc20Transfer, TronEvent, TronGridResponse},
    helpers::{from_millis, hex_to_tron_address, is_tron_address, parse_base_units},
    ProviderError,
};

/// USDT on TRON mainnet.
pub const USDT_TRC20_CONTRACT: &str = "TR7NHqjeKQxGTCi8q8ZY4pL8otSzgjLj6t";
const PAGE_SIZE: &str = "200";

/// The TRC-20 token a [`TronGridSource`] watches.
#[derive(Debug, Clone)]
pub struct Trc20Token {
    pub contract: String,
    pub symbol: String,
    pub decimals: u32,
}

impl Default for Trc20Token {
    fn default() -> Self {
        Self { contract: USDT_TRC20_CONTRACT.to_string(), symbol: "USDT".to_string(), decimals: 6 }
    }
}

/// Watches incoming TRC-20 transfers through the TronGrid v1 API.
#[derive(Clone)]
pub struct TronGridSource {
    client: RestClient,
    token: Trc20Token,
}

impl TronGridSource {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        if !config.api_key.is_empty() {
            let key = HeaderValue::from_str(config.api_key.reveal())
                .map_err(|e| ProviderError::Initialization(format!("Invalid TronGrid API key. {e}")))?;
            headers.insert("TRON-PRO-API-KEY", key);
        }
        let client = RestClient::new(&config.endpoint, headers)?;
        Ok(Self { client, token: Trc20Token::default() })
    }

    pub fn with_token(mut self, token: Trc20Token) -> Self {
        self.token = token;
        self
    }

    pub async fn fetch_transfers(&self, address: &str, since: DateTime<Utc>) -> Result<Vec<Transfer>, ProviderError> {
        let path = format!("/v1/accounts/{address}/transactions/trc20");
        let min_timestamp = since.timestamp_millis().to_string();
        let params = [
            ("only_confirmed", "true"),
            ("only_to", "true"),
            ("limit", PAGE_SIZE),
            ("contract_address", self.token.contract.as_str()),
            ("min_timestamp", min_timestamp.as_str()),
        ];
        let response = self.client.get::<TronGridResponse<Trc20Transfer>>(&path, &params).await?;
        if !response.success {
            let message = response.error.unwrap_or_else(|| "TronGrid reported a failure".to_string());
            return Err(ProviderError::ApiError(message));
        }
        let transfers = response
            .data
            .into_iter()
            .filter(|t| t.transfer_type == "Transfer" && t.to == address)
            .map(trc20_to_transfer)
            .collect::<Result<Vec<_>, _>>()?;
        trace!("🔌️ TronGrid returned {} transfers to {address}", transfers.len());
        Ok(transfers)
    }

    pub async fn fetch_transfer(&self, hash: &str) -> Result<Transfer, ProviderError> {
        let path = format!("/v1/transactions/{hash}/events");
        let response =
            self.client.get::<TronGridResponse<TronEvent>>(&path, &[("only_confirmed", "true")]).await?;
        let event = response
            .data
            .into_iter()
            .find(|e| e.event_name == "Transfer" && e.contract_address == self.token.contract)
            .ok_or_else(|| ProviderError::NotFound(format!("Transfer {hash}")))?;
        event_to_transfer(hash, event, &self.token)
    }
}

fn trc20_to_transfer(t: Trc20Transfer) -> Result<Transfer, ProviderError> {
    Ok(Transfer {
        amount: parse_base_units(&t.value, t.token_info.decimals)?,
        currency: currency_code(&t.token_info.symbol),
        timestamp: from_millis(t.block_timestamp)?,
        hash: t.transaction_id,
        from: t.from,
        to: t.to,
        block_number: None,
        status: TransferStatus::Confirmed,
    })
}

fn event_to_transfer(hash: &str, event: TronEvent, token: &Trc20Token) -> Result<Transfer, ProviderError> {
    Ok(Transfer {
        hash: hash.to_string(),
        from: hex_to_tron_address(&event.result.from)?,
        to: hex_to_tron_address(&event.result.to)?,
        amount: parse_base_units(&event.result.value, token.decimals)?,
        currency: currency_code(&token.symbol),
        block_number: event.block_number,
        timestamp: from_millis(event.block_timestamp)?,
        status: TransferStatus::Confirmed,
    })
}

#[async_trait]
impl TransferSource for TronGridSource {
    fn name(&self) -> &'static str {
        "trongrid"
    }

    async fn get_transfers(&self, address: &str, since: DateTime<Utc>) -> Result<Vec<Transfer>, SourceError> {
        Ok(self.fetch_transfers(address, since).await?)
    }

    async fn get_transfer(&self, hash: &str) -> Result<Transfer, SourceError> {
        Ok(self.fetch_transfer(hash).await?)
    }

    fn validate_address(&self, address: &str) -> bool {
        is_tron_address(address)
    }
}
