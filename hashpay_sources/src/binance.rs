use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hashpay_engine::{
    db_types::{currency_code, SourceKind, Transfer, TransferStatus},
    SourceError,
    TransferSource,
};
use hpg_common::Secret;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Method,
};

use crate::{
    api::RestClient,
    config::ProviderConfig,
    data_objects::{BinanceDeposit, BinanceError},
    helpers::{binance_signature, from_millis, parse_decimal},
    ProviderError,
};

const DEPOSIT_HISTORY: &str = "/sapi/v1/capital/deposit/hisrec";
/// Binance deposit status for "success".
const DEPOSIT_CREDITED: i32 = 1;

/// Watches deposits into a Binance account through the signed capital API. As with OKX, the address passed to
/// [`TransferSource::get_transfers`] is the account's deposit address.
#[derive(Clone)]
pub struct BinanceDepositSource {
    client: RestClient,
    api_secret: Secret<String>,
    coin: String,
}

impl BinanceDepositSource {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        if config.api_key.is_empty() || config.api_secret.is_empty() {
            return Err(ProviderError::MissingCredentials("Binance needs an API key and secret".to_string()));
        }
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(config.api_key.reveal())
            .map_err(|e| ProviderError::Initialization(format!("Invalid Binance API key. {e}")))?;
        headers.insert("X-MBX-APIKEY", key);
        let client = RestClient::new(&config.endpoint, headers)?;
        Ok(Self { client, api_secret: config.api_secret.clone(), coin: "USDT".to_string() })
    }

    pub fn with_coin(mut self, coin: &str) -> Self {
        self.coin = currency_code(coin);
        self
    }

    /// Appends `timestamp` and the signature over the whole query string.
    fn signed_path(&self, query: &str, now: DateTime<Utc>) -> String {
        let query = format!("{query}&timestamp={}", now.timestamp_millis());
        let signature = binance_signature(self.api_secret.reveal(), &query);
        format!("{DEPOSIT_HISTORY}?{query}&signature={signature}")
    }

    async fn deposit_history(&self, query: &str) -> Result<Vec<BinanceDeposit>, ProviderError> {
        let path = self.signed_path(query, Utc::now());
        self.client
            .rest_query::<Vec<BinanceDeposit>, ()>(Method::GET, &path, &[], HeaderMap::new(), None)
            .await
            .map_err(|e| match e {
                ProviderError::QueryError { ref message, .. } => match serde_json::from_str::<BinanceError>(message) {
                    Ok(err) => ProviderError::ApiError(format!("Binance error {}: {}", err.code, err.msg)),
                    Err(_) => e,
                },
                e => e,
            })
    }

    pub async fn fetch_deposits(&self, address: &str, since: DateTime<Utc>) -> Result<Vec<Transfer>, ProviderError> {
        let query = format!("coin={}&status={DEPOSIT_CREDITED}&startTime={}", self.coin, since.timestamp_millis());
        let deposits = self.deposit_history(&query).await?;
        let transfers = deposits
            .into_iter()
            .filter(|d| d.status == DEPOSIT_CREDITED && d.address == address)
            .map(deposit_to_transfer)
            .collect::<Result<Vec<_>, _>>()?;
        trace!("🔌️ Binance returned {} credited deposits to {address}", transfers.len());
        Ok(transfers)
    }

    pub async fn fetch_deposit(&self, hash: &str) -> Result<Transfer, ProviderError> {
        let query = format!("coin={}&txId={hash}", self.coin);
        let deposit = self
            .deposit_history(&query)
            .await?
            .into_iter()
            .find(|d| d.tx_id == hash)
            .ok_or_else(|| ProviderError::NotFound(format!("Deposit {hash}")))?;
        deposit_to_transfer(deposit)
    }
}

fn deposit_to_transfer(deposit: BinanceDeposit) -> Result<Transfer, ProviderError> {
    let status = if deposit.status == DEPOSIT_CREDITED { TransferStatus::Confirmed } else { TransferStatus::Pending };
    Ok(Transfer {
        amount: parse_decimal(&deposit.amount)?,
        currency: currency_code(&deposit.coin),
        timestamp: from_millis(deposit.insert_time)?,
        hash: deposit.tx_id,
        from: String::default(),
        to: deposit.address,
        block_number: None,
        status,
    })
}

#[async_trait]
impl TransferSource for BinanceDepositSource {
    fn name(&self) -> &'static str {
        "binance"
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Exchange
    }

    async fn get_transfers(&self, address: &str, since: DateTime<Utc>) -> Result<Vec<Transfer>, SourceError> {
        Ok(self.fetch_deposits(address, since).await?)
    }

    async fn get_transfer(&self, hash: &str) -> Result<Transfer, SourceError> {
        Ok(self.fetch_deposit(hash).await?)
    }

    /// Deposit addresses can be on any network Binance supports.
    fn validate_address(&self, address: &str) -> bool {
        let len = address.len();
        (20..=128).contains(&len) && address.chars().all(|c| c.is_ascii_alphanumeric() || c == ':' || c == '_')
    }
}
