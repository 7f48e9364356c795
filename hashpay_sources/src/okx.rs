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
    data_objects::{OkxDeposit, OkxResponse},
    helpers::{from_millis, okx_signature, okx_timestamp, parse_decimal},
    ProviderError,
};

const DEPOSIT_HISTORY: &str = "/api/v5/asset/deposit-history";
/// OKX deposit state for "deposit successful".
const DEPOSIT_CREDITED: &str = "2";

/// Watches deposits into an OKX account. The address passed to [`TransferSource::get_transfers`] is the account's
/// deposit address; only deposits credited to it are returned.
#[derive(Clone)]
pub struct OkxDepositSource {
    client: RestClient,
    api_key: Secret<String>,
    api_secret: Secret<String>,
    passphrase: Secret<String>,
    currency: String,
}

impl OkxDepositSource {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        if !config.has_exchange_credentials() {
            return Err(ProviderError::MissingCredentials(
                "OKX needs an API key, secret and passphrase".to_string(),
            ));
        }
        let client = RestClient::new(&config.endpoint, HeaderMap::new())?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            passphrase: config.passphrase.clone(),
            currency: "USDT".to_string(),
        })
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency_code(currency);
        self
    }

    fn signed_headers(&self, method: &Method, request_path: &str) -> Result<HeaderMap, ProviderError> {
        let timestamp = okx_timestamp(Utc::now());
        let signature = okx_signature(self.api_secret.reveal(), &timestamp, method.as_str(), request_path, "");
        let mut headers = HeaderMap::new();
        for (name, value) in [
            ("OK-ACCESS-KEY", self.api_key.reveal().as_str()),
            ("OK-ACCESS-SIGN", signature.as_str()),
            ("OK-ACCESS-TIMESTAMP", timestamp.as_str()),
            ("OK-ACCESS-PASSPHRASE", self.passphrase.reveal().as_str()),
        ] {
            let value = HeaderValue::from_str(value)
                .map_err(|e| ProviderError::RestRequestError(format!("Invalid {name} header. {e}")))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    /// The query string is part of what OKX signs, so it is built here rather than by the HTTP client.
    async fn deposit_history(&self, query: &str) -> Result<Vec<OkxDeposit>, ProviderError> {
        let request_path = format!("{DEPOSIT_HISTORY}?{query}");
        let headers = self.signed_headers(&Method::GET, &request_path)?;
        let response = self
            .client
            .rest_query::<OkxResponse<OkxDeposit>, ()>(Method::GET, &request_path, &[], headers, None)
            .await?;
        if response.code != "0" {
            return Err(ProviderError::ApiError(format!("OKX error {}: {}", response.code, response.msg)));
        }
        Ok(response.data)
    }

    pub async fn fetch_deposits(&self, address: &str, since: DateTime<Utc>) -> Result<Vec<Transfer>, ProviderError> {
        // `before` returns records newer than the given timestamp
        let query = format!("ccy={}&before={}&limit=100", self.currency, since.timestamp_millis() - 1);
        let deposits = self.deposit_history(&query).await?;
        let transfers = deposits
            .into_iter()
            .filter(|d| d.state == DEPOSIT_CREDITED && d.to == address)
            .map(deposit_to_transfer)
            .collect::<Result<Vec<_>, _>>()?;
        trace!("🔌️ OKX returned {} credited deposits to {address}", transfers.len());
        Ok(transfers)
    }

    pub async fn fetch_deposit(&self, hash: &str) -> Result<Transfer, ProviderError> {
        let query = format!("ccy={}&txId={hash}", self.currency);
        let deposit = self
            .deposit_history(&query)
            .await?
            .into_iter()
            .find(|d| d.tx_id == hash)
            .ok_or_else(|| ProviderError::NotFound(format!("Deposit {hash}")))?;
        deposit_to_transfer(deposit)
    }
}

fn deposit_to_transfer(deposit: OkxDeposit) -> Result<Transfer, ProviderError> {
    let ts = deposit.ts.parse::<i64>().map_err(|e| ProviderError::JsonError(format!("Invalid timestamp {}. {e}", deposit.ts)))?;
    let status = if deposit.state == DEPOSIT_CREDITED { TransferStatus::Confirmed } else { TransferStatus::Pending };
    Ok(Transfer {
        amount: parse_decimal(&deposit.amt)?,
        currency: currency_code(&deposit.ccy),
        timestamp: from_millis(ts)?,
        hash: deposit.tx_id,
        from: deposit.from,
        to: deposit.to,
        block_number: None,
        status,
    })
}

#[async_trait]
impl TransferSource for OkxDepositSource {
    fn name(&self) -> &'static str {
        "okx"
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

    /// Deposit addresses can be on any chain OKX supports. Only reject the obviously malformed.
    fn validate_address(&self, address: &str) -> bool {
        let len = address.len();
        (20..=128).contains(&len) && address.chars().all(|c| c.is_ascii_alphanumeric() || c == ':' || c == '_')
    }
}
