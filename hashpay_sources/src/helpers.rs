use std::sync::OnceLock;

use base64::encode;
use chrono::{DateTime, TimeZone, Utc};
use hmac::{Hmac, Mac};
use regex::Regex;
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};

use crate::ProviderError;

/// Explorers report token amounts as integer strings in the token's smallest unit. Converts `"13890000"` with 6
/// decimals into `13.89`.
pub fn parse_base_units(value: &str, decimals: u32) -> Result<Decimal, ProviderError> {
    let raw = value.trim();
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(ProviderError::InvalidAmount(format!("'{value}' is not an integer amount")));
    }
    let units = raw
        .parse::<i128>()
        .map_err(|e| ProviderError::InvalidAmount(format!("Invalid amount value: {value}. {e}.")))?;
    let amount = Decimal::try_from_i128_with_scale(units, decimals)
        .map_err(|e| ProviderError::InvalidAmount(format!("Invalid amount value: {value}. {e}.")))?;
    Ok(amount.normalize())
}

/// Exchanges report decimal amounts as strings, e.g. `"13.89"`.
pub fn parse_decimal(value: &str) -> Result<Decimal, ProviderError> {
    value
        .trim()
        .parse::<Decimal>()
        .map_err(|e| ProviderError::InvalidAmount(format!("Invalid amount value: {value}. {e}.")))
}

pub fn from_millis(millis: i64) -> Result<DateTime<Utc>, ProviderError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| ProviderError::JsonError(format!("{millis} is not a valid timestamp")))
}

pub fn from_secs(secs: i64) -> Result<DateTime<Utc>, ProviderError> {
    Utc.timestamp_opt(secs, 0).single().ok_or_else(|| ProviderError::JsonError(format!("{secs} is not a valid timestamp")))
}

/// Parses a `0x`-prefixed hex quantity, as returned by JSON-RPC proxies.
pub fn parse_hex_u64(value: &str) -> Result<u64, ProviderError> {
    let digits = value.trim().trim_start_matches("0x");
    u64::from_str_radix(digits, 16).map_err(|e| ProviderError::JsonError(format!("Invalid hex quantity {value}. {e}")))
}

fn decode_hex(value: &str) -> Result<Vec<u8>, ProviderError> {
    let digits = value.trim().trim_start_matches("0x");
    if digits.len() % 2 != 0 {
        return Err(ProviderError::JsonError(format!("Odd-length hex string: {value}")));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|e| ProviderError::JsonError(format!("Invalid hex string {value}. {e}")))
        })
        .collect()
}

/// Integer amounts in base units, hex encoded. Used for ERC-20 `Transfer` log data.
pub fn parse_hex_base_units(value: &str, decimals: u32) -> Result<Decimal, ProviderError> {
    let digits = value.trim().trim_start_matches("0x").trim_start_matches('0');
    if digits.is_empty() {
        return Ok(Decimal::ZERO);
    }
    let units = u128::from_str_radix(digits, 16)
        .map_err(|e| ProviderError::InvalidAmount(format!("Invalid amount value: {value}. {e}.")))?;
    parse_base_units(&units.to_string(), decimals)
}

/// The address in an indexed event topic: the last 20 of its 32 bytes.
pub fn topic_to_evm_address(topic: &str) -> Result<String, ProviderError> {
    let digits = topic.trim().trim_start_matches("0x");
    if digits.len() < 40 {
        return Err(ProviderError::JsonError(format!("{topic} does not hold an address")));
    }
    Ok(format!("0x{}", digits[digits.len() - 40..].to_ascii_lowercase()))
}

const BASE58_ALPHABET: &[u8] = b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

fn base58_encode(bytes: &[u8]) -> String {
    let mut digits: Vec<u8> = Vec::with_capacity(bytes.len() * 138 / 100 + 1);
    for byte in bytes {
        let mut carry = u32::from(*byte);
        for digit in digits.iter_mut() {
            carry += u32::from(*digit) << 8;
            *digit = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }
    let zeros = bytes.iter().take_while(|b| **b == 0).count();
    std::iter::repeat(b'1')
        .take(zeros)
        .chain(digits.iter().rev().map(|d| BASE58_ALPHABET[*d as usize]))
        .map(char::from)
        .collect()
}

/// TRON event logs carry hex addresses, with or without the `41` network prefix. Converts them into the base58check
/// form used everywhere else.
pub fn hex_to_tron_address(value: &str) -> Result<String, ProviderError> {
    let mut bytes = decode_hex(value)?;
    match bytes.len() {
        20 => bytes.insert(0, 0x41),
        21 if bytes[0] == 0x41 => {},
        _ => return Err(ProviderError::JsonError(format!("{value} is not a TRON address"))),
    }
    let checksum = Sha256::digest(Sha256::digest(&bytes));
    bytes.extend_from_slice(&checksum[..4]);
    Ok(base58_encode(&bytes))
}

fn tron_address_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^T[1-9A-HJ-NP-Za-km-z]{33}$").ok()).as_ref()
}

fn evm_address_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").ok()).as_ref()
}

fn solana_address_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[1-9A-HJ-NP-Za-km-z]{32,44}$").ok()).as_ref()
}

fn ton_address_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(-?[0-9]+:[0-9a-fA-F]{64}|[A-Za-z0-9_+/-]{48})$").ok()).as_ref()
}

/// Base58check-shaped TRON address. The checksum is not verified.
pub fn is_tron_address(address: &str) -> bool {
    tron_address_regex().map(|re| re.is_match(address)).unwrap_or(false)
}

/// `0x` followed by 40 hex digits. Mixed-case checksums are not verified.
pub fn is_evm_address(address: &str) -> bool {
    evm_address_regex().map(|re| re.is_match(address)).unwrap_or(false)
}

/// A base58 public key of 32 to 44 characters.
pub fn is_solana_address(address: &str) -> bool {
    solana_address_regex().map(|re| re.is_match(address)).unwrap_or(false)
}

/// Raw `workchain:hex` or 48-character user-friendly TON address. The user-friendly checksum is not verified.
pub fn is_ton_address(address: &str) -> bool {
    ton_address_regex().map(|re| re.is_match(address)).unwrap_or(false)
}

/// The `signature` parameter Binance expects on signed endpoints: hex(HMAC-SHA256(secret, query string)).
pub fn binance_signature(secret: &str, query: &str) -> String {
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::default(),
    };
    mac.update(query.as_bytes());
    mac.finalize().into_bytes().iter().map(|b| format!("{b:02x}")).collect()
}

/// The signature OKX expects in `OK-ACCESS-SIGN`: base64(HMAC-SHA256(secret, timestamp + method + path + body)).
pub fn okx_signature(secret: &str, timestamp: &str, method: &str, request_path: &str, body: &str) -> String {
    let mut mac = match Hmac::<Sha256>::new_from_slice(secret.as_bytes()) {
        Ok(mac) => mac,
        // HMAC accepts keys of any length
        Err(_) => return String::default(),
    };
    mac.update(timestamp.as_bytes());
    mac.update(method.as_bytes());
    mac.update(request_path.as_bytes());
    mac.update(body.as_bytes());
    encode(mac.finalize().into_bytes())
}

/// ISO-8601 with millisecond precision, as required by `OK-ACCESS-TIMESTAMP`.
pub fn okx_timestamp(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}
