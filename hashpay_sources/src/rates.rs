use std::collections::HashMap;

use async_trait::async_trait;
use hashpay_engine::{db_types::currency_code, RateSource, RateSourceError};
use log::*;
use reqwest::header::{HeaderMap, HeaderValue};
use rust_decimal::Decimal;

use crate::{
    api::RestClient,
    config::ProviderConfig,
    data_objects::{BinanceError, BinanceTicker},
    helpers::parse_decimal,
    ProviderError,
};

/// Binance error code for an unknown trading pair.
const INVALID_SYMBOL: i64 = -1121;

/// Spot prices from the Binance ticker. A rate for `from`/`to` is the price of the `{to}{from}` pair, i.e. how many
/// `from` one `to` costs.
#[derive(Clone)]
pub struct BinanceRateSource {
    client: RestClient,
}

impl BinanceRateSource {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let client = RestClient::new(&config.endpoint, HeaderMap::new())?;
        Ok(Self { client })
    }

    pub fn symbol(from: &str, to: &str) -> String {
        format!("{}{}", currency_code(to), currency_code(from))
    }
}

fn binance_failure(from: &str, to: &str, e: ProviderError) -> RateSourceError {
    if let ProviderError::QueryError { message, .. } = &e {
        if let Ok(err) = serde_json::from_str::<BinanceError>(message) {
            if err.code == INVALID_SYMBOL {
                return RateSourceError::UnsupportedPair { from: from.to_string(), to: to.to_string() };
            }
            return RateSourceError::Unavailable(format!("Binance error {}: {}", err.code, err.msg));
        }
    }
    e.into()
}

#[async_trait]
impl RateSource for BinanceRateSource {
    fn name(&self) -> &'static str {
        "binance"
    }

    async fn fetch_rate(&self, from: &str, to: &str) -> Result<Decimal, RateSourceError> {
        let symbol = Self::symbol(from, to);
        let ticker = self
            .client
            .get::<BinanceTicker>("/api/v3/ticker/price", &[("symbol", symbol.as_str())])
            .await
            .map_err(|e| binance_failure(from, to, e))?;
        trace!("💱️ Binance quotes {} at {}", ticker.symbol, ticker.price);
        Ok(parse_decimal(&ticker.price)?)
    }
}

/// Prices from the CoinGecko `simple/price` endpoint. Only coins with a known CoinGecko id can be quoted.
#[derive(Clone)]
pub struct CoinGeckoRateSource {
    client: RestClient,
    coin_ids: HashMap<String, String>,
}

impl CoinGeckoRateSource {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        if !config.api_key.is_empty() {
            let key = HeaderValue::from_str(config.api_key.reveal())
                .map_err(|e| ProviderError::Initialization(format!("Invalid CoinGecko API key. {e}")))?;
            headers.insert("x-cg-demo-api-key", key);
        }
        let client = RestClient::new(&config.endpoint, headers)?;
        let coin_ids = [
            ("USDT", "tether"),
            ("USDC", "usd-coin"),
            ("TRX", "tron"),
            ("TON", "the-open-network"),
            ("ETH", "ethereum"),
            ("BNB", "binancecoin"),
            ("SOL", "solana"),
        ]
        .into_iter()
        .map(|(symbol, id)| (symbol.to_string(), id.to_string()))
        .collect();
        Ok(Self { client, coin_ids })
    }

    pub fn coin_id(&self, symbol: &str) -> Option<&str> {
        self.coin_ids.get(&currency_code(symbol)).map(String::as_str)
    }
}

/// `{"tether": {"cny": 7.19}}`
fn extract_price(
    prices: &HashMap<String, HashMap<String, f64>>,
    coin: &str,
    vs: &str,
) -> Result<Decimal, RateSourceError> {
    let price = prices
        .get(coin)
        .and_then(|p| p.get(vs))
        .ok_or_else(|| RateSourceError::InvalidResponse(format!("No {coin}/{vs} price in the response")))?;
    Decimal::try_from(*price)
        .map(|d| d.round_dp(8).normalize())
        .map_err(|e| RateSourceError::InvalidResponse(format!("{price} is not a usable price. {e}")))
}

#[async_trait]
impl RateSource for CoinGeckoRateSource {
    fn name(&self) -> &'static str {
        "coingecko"
    }

    async fn fetch_rate(&self, from: &str, to: &str) -> Result<Decimal, RateSourceError> {
        let coin = self
            .coin_id(to)
            .ok_or_else(|| RateSourceError::UnsupportedPair { from: from.to_string(), to: to.to_string() })?;
        let vs = from.trim().to_ascii_lowercase();
        let prices = self
            .client
            .get::<HashMap<String, HashMap<String, f64>>>("/api/v3/simple/price", &[
                ("ids", coin),
                ("vs_currencies", vs.as_str()),
            ])
            .await?;
        extract_price(&prices, coin, &vs)
    }
}

#[cfg(test)]
mod test {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn binance_symbols() {
        assert_eq!(BinanceRateSource::symbol("usdt", "btc"), "BTCUSDT");
        let ticker: BinanceTicker = serde_json::from_str(r#"{"symbol": "BTCUSDT", "price": "37000.12000000"}"#).unwrap();
        assert_eq!(parse_decimal(&ticker.price).unwrap(), dec!(37000.12));
    }

    #[test]
    fn binance_errors() {
        let invalid = ProviderError::QueryError {
            status: 400,
            message: r#"{"code": -1121, "msg": "Invalid symbol."}"#.into(),
        };
        assert!(matches!(binance_failure("CNY", "USDT", invalid), RateSourceError::UnsupportedPair { .. }));
        let limited = ProviderError::QueryError { status: 429, message: r#"{"code": -1003, "msg": "Too many requests"}"#.into() };
        assert!(matches!(binance_failure("CNY", "USDT", limited), RateSourceError::Unavailable(_)));
        assert!(matches!(binance_failure("CNY", "USDT", ProviderError::Timeout), RateSourceError::Timeout(_)));
    }

    #[test]
    fn coingecko_prices() {
        let source = CoinGeckoRateSource::new(&ProviderConfig::new("https://api.coingecko.com")).unwrap();
        assert_eq!(source.coin_id("usdt"), Some("tether"));
        assert_eq!(source.coin_id("DOGE"), None);
        let prices: HashMap<String, HashMap<String, f64>> = serde_json::from_str(r#"{"tether": {"cny": 7.19}}"#).unwrap();
        assert_eq!(extract_price(&prices, "tether", "cny").unwrap(), dec!(7.19));
        assert!(matches!(extract_price(&prices, "tether", "usd"), Err(RateSourceError::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn unknown_coins_are_unsupported() {
        let source = CoinGeckoRateSource::new(&ProviderConfig::new("https://api.coingecko.com")).unwrap();
        let err = source.fetch_rate("CNY", "DOGE").await.unwrap_err();
        assert!(matches!(err, RateSourceError::UnsupportedPair { .. }));
    }
}
