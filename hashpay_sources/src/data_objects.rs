//! Wire formats of the provider APIs. Only the fields the adapters read are modelled.
use serde::Deserialize;

//--------------------------------------       TronGrid        ---------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct TronGridResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenInfo {
    pub symbol: String,
    pub address: String,
    pub decimals: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Trc20Transfer {
    pub transaction_id: String,
    pub token_info: TokenInfo,
    pub block_timestamp: i64,
    pub from: String,
    pub to: String,
    #[serde(rename = "type")]
    pub transfer_type: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TronEvent {
    pub block_number: Option<u64>,
    pub block_timestamp: i64,
    pub contract_address: String,
    pub event_name: String,
    pub result: TronEventResult,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TronEventResult {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub value: String,
}

//--------------------------------------       Etherscan       ---------------------------------------------------------
/// Etherscan-family explorers wrap every response in `status`/`message`/`result`. On failure `result` is a string.
#[derive(Debug, Clone, Deserialize)]
pub struct ExplorerResponse {
    pub status: String,
    pub message: String,
    pub result: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenTx {
    pub block_number: String,
    pub time_stamp: String,
    pub hash: String,
    pub from: String,
    pub to: String,
    pub value: String,
    pub token_symbol: String,
    pub token_decimal: String,
}

/// JSON-RPC proxy responses (`module=proxy`).
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyResponse<T> {
    pub result: Option<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxReceipt {
    pub block_number: String,
    pub status: Option<String>,
    pub logs: Vec<ReceiptLog>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptLog {
    pub address: String,
    pub topics: Vec<String>,
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockHeader {
    pub timestamp: String,
}

//--------------------------------------          OKX          ---------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct OkxResponse<T> {
    pub code: String,
    #[serde(default)]
    pub msg: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OkxDeposit {
    pub ccy: String,
    #[serde(default)]
    pub chain: String,
    pub amt: String,
    #[serde(default)]
    pub from: String,
    pub to: String,
    pub tx_id: String,
    pub ts: String,
    pub state: String,
}

//--------------------------------------        Solscan        ---------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct SolscanResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// One row of `/account/splTransfers`. `amount` is already scaled by the token's decimals.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplTransfer {
    pub signature: String,
    pub block_time: i64,
    #[serde(default)]
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub token_address: String,
    pub amount: serde_json::Number,
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolscanTransaction {
    pub tx_hash: String,
    pub block_time: i64,
    #[serde(default)]
    pub status: String,
    #[serde(default = "Vec::new")]
    pub token_transfers: Vec<SolscanTokenTransfer>,
}

/// Token movements inside a transaction. `amount` is in base units.
#[derive(Debug, Clone, Deserialize)]
pub struct SolscanTokenTransfer {
    #[serde(default)]
    pub source_owner: String,
    pub destination_owner: String,
    pub amount: String,
    pub token: SolscanToken,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SolscanToken {
    pub address: String,
    #[serde(default)]
    pub symbol: String,
    pub decimals: u32,
}

//--------------------------------------      TON Center       ---------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct JettonTransfers {
    #[serde(default = "Vec::new", alias = "jetton_transfers")]
    pub transfers: Vec<JettonTransfer>,
}

/// A Jetton transfer. `amount` is in base units; `source` and `destination` are the owners' addresses.
#[derive(Debug, Clone, Deserialize)]
pub struct JettonTransfer {
    #[serde(default)]
    pub source: String,
    pub destination: String,
    pub amount: String,
    pub jetton_master: String,
    pub transaction_hash: String,
    #[serde(alias = "transaction_now")]
    pub transaction_time: i64,
    #[serde(default)]
    pub transaction_aborted: bool,
}

//--------------------------------------        Binance        ---------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BinanceDeposit {
    pub amount: String,
    pub coin: String,
    #[serde(default)]
    pub network: String,
    pub status: i32,
    pub address: String,
    pub tx_id: String,
    pub insert_time: i64,
}

//--------------------------------------         Rates         ---------------------------------------------------------
#[derive(Debug, Clone, Deserialize)]
pub struct BinanceTicker {
    pub symbol: String,
    pub price: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BinanceError {
    pub code: i64,
    pub msg: String,
}
