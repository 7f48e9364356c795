use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use hpg_common::Secret;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(String);

impl From<String> for ConversionError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Canonical representation of a currency or token symbol: trimmed and upper-case.
pub fn currency_code(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}

//--------------------------------------        OrderId        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub const PREFIX: &'static str = "PAY";

    /// Generates a fresh, unguessable order id: `PAY` followed by 8 random bytes in hex.
    pub fn random() -> Self {
        let bytes: [u8; 8] = rand::random();
        let hex = bytes.iter().map(|b| format!("{b:02x}")).collect::<String>();
        Self(format!("{}{hex}", Self::PREFIX))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl FromStr for OrderId {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ConversionError("An order id cannot be empty".into()));
        }
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for OrderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------          Chain          -------------------------------------------------------
/// Identifies the ledger a transfer source watches, e.g. `TRON`, `BSC` or `OKX`. Always upper-case.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Chain(String);

impl Chain {
    pub fn new(id: &str) -> Self {
        Self(currency_code(id))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for Chain {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Chain {
    fn from(value: String) -> Self {
        Self::new(&value)
    }
}

impl Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// Waiting for a matching transfer.
    Pending,
    /// A transfer (or a manual review) settled the order.
    Paid,
    /// The order timed out before it was paid.
    Expired,
    /// The order was rejected administratively.
    Failed,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Pending => write!(f, "Pending"),
            OrderStatusType::Paid => write!(f, "Paid"),
            OrderStatusType::Expired => write!(f, "Expired"),
            OrderStatusType::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Paid" => Ok(Self::Paid),
            "Expired" => Ok(Self::Expired),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------    PaymentMethod      ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PaymentMethod {
    /// Direct on-chain transfer to a watched address.
    #[default]
    Blockchain,
    /// Deposit into an exchange account.
    Exchange,
}

impl Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentMethod::Blockchain => write!(f, "Blockchain"),
            PaymentMethod::Exchange => write!(f, "Exchange"),
        }
    }
}

impl FromStr for PaymentMethod {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Blockchain" => Ok(Self::Blockchain),
            "Exchange" => Ok(Self::Exchange),
            s => Err(ConversionError(format!("Invalid payment method: {s}"))),
        }
    }
}

//--------------------------------------      Settlement       ---------------------------------------------------------
/// How the customer has chosen to pay: the exact amount and currency expected at the given address on the given chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settlement {
    pub amount: Decimal,
    pub currency: String,
    pub chain: Chain,
    pub address: String,
    pub method: PaymentMethod,
}

//--------------------------------------        Order       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub merchant_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub settlement: Option<Settlement>,
    pub status: OrderStatusType,
    pub tx_hash: Option<String>,
    pub memo: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn is_pending(&self) -> bool {
        self.status == OrderStatusType::Pending
    }

    /// True when the order can no longer be paid at `now`, whether or not the expiry sweep has run yet.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.status == OrderStatusType::Expired || (self.is_pending() && self.expires_at <= now)
    }
}

//--------------------------------------        NewOrder       ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub merchant_id: Option<String>,
    pub amount: Decimal,
    pub currency: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    pub fn new(amount: Decimal, currency: &str, created_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            order_id: OrderId::random(),
            merchant_id: None,
            amount,
            currency: currency_code(currency),
            expires_at,
            created_at,
        }
    }

    pub fn with_merchant(mut self, merchant_id: &str) -> Self {
        self.merchant_id = Some(merchant_id.to_string());
        self
    }
}

//--------------------------------------   TransferStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferStatus {
    #[default]
    Confirmed,
    Pending,
}

impl Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferStatus::Confirmed => write!(f, "Confirmed"),
            TransferStatus::Pending => write!(f, "Pending"),
        }
    }
}

//--------------------------------------       Transfer        ---------------------------------------------------------
/// A transfer as observed on an external ledger. Amounts and currency symbols are already normalised by the source
/// that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub amount: Decimal,
    pub currency: String,
    pub block_number: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub status: TransferStatus,
}

impl Transfer {
    pub fn is_confirmed(&self) -> bool {
        self.status == TransferStatus::Confirmed
    }

    /// `0x` hex addresses are compared case-insensitively, since they are routinely served in mixed case. Every other
    /// format (base58, base64) is case-sensitive.
    pub fn is_destined_for(&self, address: &str) -> bool {
        if is_hex_address(&self.to) && is_hex_address(address) {
            self.to.eq_ignore_ascii_case(address)
        } else {
            self.to == address
        }
    }
}

fn is_hex_address(address: &str) -> bool {
    address.starts_with("0x") || address.starts_with("0X")
}

//--------------------------------------     PaymentProof      ---------------------------------------------------------
/// The evidence used to mark an order as paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentProof {
    /// A transfer observed by a registered source.
    Transfer { chain: Chain, transfer: Transfer },
    /// An operator vouched for the payment after a manual review.
    Manual { tx_hash: String, reviewer: String },
}

impl PaymentProof {
    pub fn tx_hash(&self) -> &str {
        match self {
            PaymentProof::Transfer { transfer, .. } => transfer.hash.as_str(),
            PaymentProof::Manual { tx_hash, .. } => tx_hash.as_str(),
        }
    }
}

//--------------------------------------   NotificationKind    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationKind {
    /// A human-readable message for the operators.
    Alert,
    /// JSON POST to the merchant's callback URL.
    Callback,
    /// JSON POST to the merchant's notify URL.
    Webhook,
}

impl Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationKind::Alert => write!(f, "Alert"),
            NotificationKind::Callback => write!(f, "Callback"),
            NotificationKind::Webhook => write!(f, "Webhook"),
        }
    }
}

impl FromStr for NotificationKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Alert" => Ok(Self::Alert),
            "Callback" => Ok(Self::Callback),
            "Webhook" => Ok(Self::Webhook),
            s => Err(ConversionError(format!("Invalid notification kind: {s}"))),
        }
    }
}

//--------------------------------------  NotificationStatus   ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NotificationStatus {
    Pending,
    Sent,
    /// Gave up after too many failed attempts. Terminal.
    Dead,
}

impl Display for NotificationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationStatus::Pending => write!(f, "Pending"),
            NotificationStatus::Sent => write!(f, "Sent"),
            NotificationStatus::Dead => write!(f, "Dead"),
        }
    }
}

impl FromStr for NotificationStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Sent" => Ok(Self::Sent),
            "Dead" => Ok(Self::Dead),
            s => Err(ConversionError(format!("Invalid notification status: {s}"))),
        }
    }
}

//--------------------------------------     Notification      ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub order_id: OrderId,
    pub kind: NotificationKind,
    pub target: String,
    pub payload: String,
    pub status: NotificationStatus,
    pub retry_count: i64,
    pub next_retry: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub order_id: OrderId,
    pub kind: NotificationKind,
    pub target: String,
    pub payload: String,
    pub next_retry: DateTime<Utc>,
}

/// The outcome of one delivery attempt, as written back to storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationUpdate {
    pub status: NotificationStatus,
    pub retry_count: i64,
    pub next_retry: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
}

//--------------------------------------       Merchant        ---------------------------------------------------------
/// A merchant site. Paid orders belonging to a merchant are reported to its callback and notify URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merchant {
    pub id: String,
    pub name: String,
    pub api_key: Secret<String>,
    pub callback_url: Option<String>,
    pub notify_url: Option<String>,
}

//--------------------------------------      SourceKind       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    #[default]
    Chain,
    Exchange,
}

impl SourceKind {
    pub fn payment_method(&self) -> PaymentMethod {
        match self {
            SourceKind::Chain => PaymentMethod::Blockchain,
            SourceKind::Exchange => PaymentMethod::Exchange,
        }
    }
}

impl Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Chain => write!(f, "Chain"),
            SourceKind::Exchange => write!(f, "Exchange"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Chain" => Ok(Self::Chain),
            "Exchange" => Ok(Self::Exchange),
            s => Err(ConversionError(format!("Invalid source kind: {s}"))),
        }
    }
}

//--------------------------------------     SourceConfig      ---------------------------------------------------------
/// A row of the source registration table. Describes which adapter to build for a chain at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub chain: Chain,
    pub kind: SourceKind,
    /// Adapter family, e.g. `trongrid`, `etherscan` or `okx`.
    pub provider: String,
    pub endpoint: String,
    pub api_key: Secret<String>,
    pub api_secret: Secret<String>,
    pub passphrase: Secret<String>,
    pub enabled: bool,
}
