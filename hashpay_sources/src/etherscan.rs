use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hashpay_engine::{
    db_types::{currency_code, Transfer, TransferStatus},
    SourceError,
    TransferSource,
};
use log::*;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use crate::{
    api::RestClient,
    config::ProviderConfig,
    data_objects::{BlockHeader, ExplorerResponse, ProxyResponse, TokenTx, TxReceipt},
    helpers::{from_secs, is_evm_address, parse_base_units, parse_hex_base_units, parse_hex_u64, topic_to_evm_address},
    ProviderError,
};

/// keccak256("Transfer(address,address,uint256)")
const TRANSFER_TOPIC: &str = "0xddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef";
const PAGE_SIZE: &str = "100";

/// The ERC-20 style token an [`EtherscanSource`] watches.
#[derive(Debug, Clone)]
pub struct TokenContract {
    pub contract: String,
    pub symbol: String,
    pub decimals: u32,
}

impl TokenContract {
    pub fn new(contract: &str, symbol: &str, decimals: u32) -> Self {
        Self { contract: contract.to_ascii_lowercase(), symbol: currency_code(symbol), decimals }
    }

    /// Binance-peg USDT on BNB Smart Chain.
    pub fn bsc_usdt() -> Self {
        Self::new("0x55d398326f99059fF775485246999027B3197955", "USDT", 18)
    }

    pub fn ethereum_usdt() -> Self {
        Self::new("0xdAC17F958D2ee523a2206206994597C13D831ec7", "USDT", 6)
    }

    pub fn polygon_usdt() -> Self {
        Self::new("0xc2132D05D31c914a87C6611C10748AEb04B58e8F", "USDT", 6)
    }
}

/// Watches incoming token transfers through an Etherscan-compatible explorer API (Etherscan, BscScan, PolygonScan).
#[derive(Clone)]
pub struct EtherscanSource {
    name: &'static str,
    client: RestClient,
    api_key: String,
    token: TokenContract,
}

impl EtherscanSource {
    pub fn new(name: &'static str, config: &ProviderConfig, token: TokenContract) -> Result<Self, ProviderError> {
        let client = RestClient::new(&config.endpoint, HeaderMap::new())?;
        Ok(Self { name, client, api_key: config.api_key.reveal().clone(), token })
    }

    async fn query<T: DeserializeOwned>(&self, params: &[(&str, &str)]) -> Result<T, ProviderError> {
        let mut params = params.to_vec();
        if !self.api_key.is_empty() {
            params.push(("apikey", self.api_key.as_str()));
        }
        self.client.get::<T>("/api", &params).await
    }

    pub async fn fetch_transfers(&self, address: &str, since: DateTime<Utc>) -> Result<Vec<Transfer>, ProviderError> {
        let params = [
            ("module", "account"),
            ("action", "tokentx"),
            ("contractaddress", self.token.contract.as_str()),
            ("address", address),
            ("page", "1"),
            ("offset", PAGE_SIZE),
            ("sort", "desc"),
        ];
        let response = self.query::<ExplorerResponse>(&params).await?;
        let txs = token_txs(response)?;
        let transfers = txs
            .into_iter()
            .filter(|tx| tx.to.eq_ignore_ascii_case(address))
            .map(token_tx_to_transfer)
            .filter(|t| t.as_ref().map(|t| t.timestamp >= since).unwrap_or(true))
            .collect::<Result<Vec<_>, _>>()?;
        trace!("🔌️ {} returned {} transfers to {address}", self.name, transfers.len());
        Ok(transfers)
    }

    pub async fn fetch_transfer(&self, hash: &str) -> Result<Transfer, ProviderError> {
        let params = [("module", "proxy"), ("action", "eth_getTransactionReceipt"), ("txhash", hash)];
        let receipt = self
            .query::<ProxyResponse<TxReceipt>>(&params)
            .await?
            .result
            .ok_or_else(|| ProviderError::NotFound(format!("Transfer {hash}")))?;
        let block = receipt.block_number.clone();
        let params = [("module", "proxy"), ("action", "eth_getBlockByNumber"), ("tag", block.as_str()), ("boolean", "false")];
        let header = self
            .query::<ProxyResponse<BlockHeader>>(&params)
            .await?
            .result
            .ok_or_else(|| ProviderError::NotFound(format!("Block {block}")))?;
        let timestamp = from_secs(parse_hex_u64(&header.timestamp)? as i64)?;
        receipt_to_transfer(hash, receipt, timestamp, &self.token)
    }
}

/// Explorers answer "No transactions found" with a failure status. That is an empty page, not an error.
fn token_txs(response: ExplorerResponse) -> Result<Vec<TokenTx>, ProviderError> {
    if response.status == "1" {
        return serde_json::from_value(response.result).map_err(|e| ProviderError::JsonError(e.to_string()));
    }
    if response.message.starts_with("No transactions found") {
        return Ok(Vec::new());
    }
    let detail = response.result.as_str().map(str::to_string).unwrap_or_else(|| response.result.to_string());
    Err(ProviderError::ApiError(format!("{}. {detail}", response.message)))
}

fn token_tx_to_transfer(tx: TokenTx) -> Result<Transfer, ProviderError> {
    let decimals = tx
        .token_decimal
        .parse::<u32>()
        .map_err(|e| ProviderError::JsonError(format!("Invalid token decimals {}. {e}", tx.token_decimal)))?;
    let timestamp = tx
        .time_stamp
        .parse::<i64>()
        .map_err(|e| ProviderError::JsonError(format!("Invalid timestamp {}. {e}", tx.time_stamp)))?;
    Ok(Transfer {
        amount: parse_base_units(&tx.value, decimals)?,
        currency: currency_code(&tx.token_symbol),
        block_number: tx.block_number.parse::<u64>().ok(),
        timestamp: from_secs(timestamp)?,
        hash: tx.hash,
        from: tx.from,
        to: tx.to,
        status: TransferStatus::Confirmed,
    })
}

fn receipt_to_transfer(
    hash: &str,
    receipt: TxReceipt,
    timestamp: DateTime<Utc>,
    token: &TokenContract,
) -> Result<Transfer, ProviderError> {
    let log = receipt
        .logs
        .iter()
        .find(|l| {
            l.address.eq_ignore_ascii_case(&token.contract) &&
                l.topics.len() == 3 &&
                l.topics[0].eq_ignore_ascii_case(TRANSFER_TOPIC)
        })
        .ok_or_else(|| ProviderError::NotFound(format!("{} transfer in {hash}", token.symbol)))?;
    let status = match receipt.status.as_deref() {
        Some("0x1") | None => TransferStatus::Confirmed,
        _ => TransferStatus::Pending,
    };
    Ok(Transfer {
        hash: hash.to_string(),
        from: topic_to_evm_address(&log.topics[1])?,
        to: topic_to_evm_address(&log.topics[2])?,
        amount: parse_hex_base_units(&log.data, token.decimals)?,
        currency: token.symbol.clone(),
        block_number: parse_hex_u64(&receipt.block_number).ok(),
        timestamp,
        status,
    })
}

#[async_trait]
impl TransferSource for EtherscanSource {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn get_transfers(&self, address: &str, since: DateTime<Utc>) -> Result<Vec<Transfer>, SourceError> {
        Ok(self.fetch_transfers(address, since).await?)
    }

    async fn get_transfer(&self, hash: &str) -> Result<Transfer, SourceError> {
        Ok(self.fetch_transfer(hash).await?)
    }

    fn validate_address(&self, address: &str) -> bool {
        is_evm_address(address)
    }
}
