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
    data_objects::{SolscanResponse, SolscanTransaction, SplTransfer},
    helpers::{from_secs, is_solana_address, parse_base_units, parse_decimal},
    ProviderError,
};

/// USDT mint on Solana mainnet.
pub const USDT_SPL_MINT: &str = "Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB";
const PAGE_SIZE: &str = "50";

/// The SPL token a [`SolanaSource`] watches.
#[derive(Debug, Clone)]
pub struct SplToken {
    pub mint: String,
    pub symbol: String,
}

impl Default for SplToken {
    fn default() -> Self {
        Self { mint: USDT_SPL_MINT.to_string(), symbol: "USDT".to_string() }
    }
}

/// Watches incoming SPL token transfers through the Solscan public API.
#[derive(Clone)]
pub struct SolanaSource {
    client: RestClient,
    token: SplToken,
}

impl SolanaSource {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        if !config.api_key.is_empty() {
            let key = HeaderValue::from_str(config.api_key.reveal())
                .map_err(|e| ProviderError::Initialization(format!("Invalid Solscan API key. {e}")))?;
            headers.insert("token", key);
        }
        let client = RestClient::new(&config.endpoint, headers)?;
        Ok(Self { client, token: SplToken::default() })
    }

    pub fn with_token(mut self, token: SplToken) -> Self {
        self.token = token;
        self
    }

    fn is_watched(&self, transfer: &SplTransfer) -> bool {
        if transfer.token_address.is_empty() {
            transfer.symbol.eq_ignore_ascii_case(&self.token.symbol)
        } else {
            transfer.token_address == self.token.mint
        }
    }

    pub async fn fetch_transfers(&self, address: &str, since: DateTime<Utc>) -> Result<Vec<Transfer>, ProviderError> {
        let params = [("account", address), ("limit", PAGE_SIZE)];
        let response = self.client.get::<SolscanResponse<SplTransfer>>("/account/splTransfers", &params).await?;
        let since = since.timestamp();
        let transfers = response
            .data
            .into_iter()
            .filter(|t| t.block_time >= since && t.to == address && self.is_watched(t))
            .map(|t| spl_to_transfer(t, &self.token))
            .collect::<Result<Vec<_>, _>>()?;
        trace!("🔌️ Solscan returned {} transfers to {address}", transfers.len());
        Ok(transfers)
    }

    pub async fn fetch_transfer(&self, hash: &str) -> Result<Transfer, ProviderError> {
        let path = format!("/transaction/{hash}");
        let tx = self.client.get::<SolscanTransaction>(&path, &[]).await.map_err(|e| match e {
            ProviderError::QueryError { status: 404, .. } => ProviderError::NotFound(format!("Transaction {hash}")),
            e => e,
        })?;
        transaction_to_transfer(tx, &self.token)
    }
}

fn is_final(status: &str) -> bool {
    status.is_empty() || status.eq_ignore_ascii_case("success") || status.eq_ignore_ascii_case("finalized")
}

fn spl_to_transfer(t: SplTransfer, token: &SplToken) -> Result<Transfer, ProviderError> {
    let status = if is_final(&t.status) { TransferStatus::Confirmed } else { TransferStatus::Pending };
    let symbol = if t.symbol.is_empty() { token.symbol.as_str() } else { t.symbol.as_str() };
    Ok(Transfer {
        amount: parse_decimal(&t.amount.to_string())?,
        currency: currency_code(symbol),
        timestamp: from_secs(t.block_time)?,
        hash: t.signature,
        from: t.from,
        to: t.to,
        block_number: None,
        status,
    })
}

fn transaction_to_transfer(tx: SolscanTransaction, token: &SplToken) -> Result<Transfer, ProviderError> {
    let status = if is_final(&tx.status) { TransferStatus::Confirmed } else { TransferStatus::Pending };
    let movement = tx
        .token_transfers
        .into_iter()
        .find(|t| t.token.address == token.mint)
        .ok_or_else(|| ProviderError::NotFound(format!("{} transfer in {}", token.symbol, tx.tx_hash)))?;
    Ok(Transfer {
        amount: parse_base_units(&movement.amount, movement.token.decimals)?,
        currency: currency_code(&token.symbol),
        timestamp: from_secs(tx.block_time)?,
        hash: tx.tx_hash,
        from: movement.source_owner,
        to: movement.destination_owner,
        block_number: None,
        status,
    })
}

#[async_trait]
impl TransferSource for SolanaSource {
    fn name(&self) -> &'static str {
        "solscan"
    }

    async fn get_transfers(&self, address: &str, since: DateTime<Utc>) -> Result<Vec<Transfer>, SourceError> {
        Ok(self.fetch_transfers(address, since).await?)
    }

    async fn get_transfer(&self, hash: &str) -> Result<Transfer, SourceError> {
        Ok(self.fetch_transfer(hash).await?)
    }

    fn validate_address(&self, address: &str) -> bool {
        is_solana_address(address)
    }
}
