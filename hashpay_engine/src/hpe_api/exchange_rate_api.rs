//! `ExchangeRateApi` quotes the rate between two currencies by asking every registered [`RateSource`] concurrently
//! and averaging the answers.
//!
//! Quotes are cached per ordered currency pair for a fixed time-to-live (5 minutes by default). An expired entry is
//! never served: the next read refreshes it synchronously. When no source can answer, a rate of 1 is returned so that
//! order flows can continue. That fallback is logged and is never cached.
use std::{collections::HashMap, fmt::Debug, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use log::*;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use crate::{
    db_types::currency_code,
    hpe_api::exchange_objects::{ExchangeRate, RateOrigin, RateQuote, RateSource, RateSourceError},
};

pub const DEFAULT_RATE_TTL_SECS: i64 = 300;
pub const DEFAULT_RATE_SOURCE_TIMEOUT: Duration = Duration::from_secs(5);

type PairKey = (String, String);

pub struct ExchangeRateApi {
    sources: RwLock<Vec<Arc<dyn RateSource>>>,
    cache: RwLock<HashMap<PairKey, ExchangeRate>>,
    ttl: chrono::Duration,
    source_timeout: Duration,
}

impl Debug for ExchangeRateApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ExchangeRateApi (ttl: {}s)", self.ttl.num_seconds())
    }
}

impl Default for ExchangeRateApi {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeRateApi {
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
            cache: RwLock::new(HashMap::new()),
            ttl: chrono::Duration::seconds(DEFAULT_RATE_TTL_SECS),
            source_timeout: DEFAULT_RATE_SOURCE_TIMEOUT,
        }
    }

    pub fn with_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_source_timeout(mut self, timeout: Duration) -> Self {
        self.source_timeout = timeout;
        self
    }

    pub async fn register_source(&self, source: Arc<dyn RateSource>) {
        info!("💱️ Rate source {} registered", source.name());
        self.sources.write().await.push(source);
    }

    pub async fn source_count(&self) -> usize {
        self.sources.read().await.len()
    }

    /// The rate between `from` and `to`. Never fails; see [`Self::fetch_rate`] to find out how the value was obtained.
    pub async fn get_rate(&self, from: &str, to: &str) -> Decimal {
        self.fetch_rate(from, to).await.value()
    }

    pub async fn fetch_rate(&self, from: &str, to: &str) -> RateQuote {
        self.fetch_rate_at(from, to, Utc::now()).await
    }

    /// As [`Self::fetch_rate`], with cache freshness judged against `now`.
    pub async fn fetch_rate_at(&self, from: &str, to: &str, now: DateTime<Utc>) -> RateQuote {
        let from = currency_code(from);
        let to = currency_code(to);
        if from == to {
            let rate = ExchangeRate::new(&from, &to, Decimal::ONE, now);
            return RateQuote { rate, origin: RateOrigin::Identity };
        }
        let key = (from.clone(), to.clone());
        if let Some(cached) = self.cache.read().await.get(&key) {
            if cached.is_fresh(now, self.ttl) {
                trace!("💱️ Cache hit for {from}/{to}: {}", cached.rate);
                return RateQuote { rate: cached.clone(), origin: RateOrigin::Cached };
            }
            trace!("💱️ Cached rate for {from}/{to} is stale");
        }
        match self.aggregate(&from, &to).await {
            Ok((value, count)) => {
                let rate = ExchangeRate::new(&from, &to, value, now);
                debug!("💱️ {from}/{to} is {value}, averaged over {count} sources");
                self.cache.write().await.insert(key, rate.clone());
                RateQuote { rate, origin: RateOrigin::Aggregated(count) }
            },
            Err(e) => {
                warn!("💱️ {e}. Falling back to a rate of 1 for {from}/{to}. This value is not cached.");
                let rate = ExchangeRate::new(&from, &to, Decimal::ONE, now);
                RateQuote { rate, origin: RateOrigin::Fallback }
            },
        }
    }

    /// Drops the cached rate for the pair, so that the next read goes to the sources.
    pub async fn invalidate(&self, from: &str, to: &str) {
        let key = (currency_code(from), currency_code(to));
        if self.cache.write().await.remove(&key).is_some() {
            debug!("💱️ Cached rate for {}/{} invalidated", key.0, key.1);
        }
    }

    /// Queries every source concurrently and returns the mean of the successful answers, with the number of answers.
    async fn aggregate(&self, from: &str, to: &str) -> Result<(Decimal, usize), RateSourceError> {
        let sources = self.sources.read().await.clone();
        let timeout = self.source_timeout;
        let requests = sources.iter().map(|source| async move {
            let result = match tokio::time::timeout(timeout, source.fetch_rate(from, to)).await {
                Ok(result) => result,
                Err(_) => Err(RateSourceError::Timeout(timeout)),
            };
            (source.name(), result)
        });
        let values = join_all(requests)
            .await
            .into_iter()
            .filter_map(|(name, result)| match result {
                Ok(v) if v > Decimal::ZERO => Some(v),
                Ok(v) => {
                    warn!("💱️ {name} quoted a non-positive rate ({v}) for {from}/{to}. Ignoring it.");
                    None
                },
                Err(e) => {
                    warn!("💱️ {name} could not quote {from}/{to}: {e}");
                    None
                },
            })
            .collect::<Vec<Decimal>>();
        let count = values.len();
        let sum = values.into_iter().sum::<Decimal>();
        match sum.checked_div(Decimal::from(count)) {
            Some(mean) if count > 0 => Ok((mean, count)),
            _ => Err(RateSourceError::NoRateAvailable { from: from.to_string(), to: to.to_string() }),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use rust_decimal_macros::dec;

    use super::*;
    use crate::hpe_api::exchange_objects::MockRateSource;

    fn fixed(name: &'static str, value: Decimal) -> MockRateSource {
        let mut source = MockRateSource::new();
        source.expect_name().return_const(name);
        source.expect_fetch_rate().returning(move |_, _| Ok(value));
        source
    }

    fn failing(name: &'static str) -> MockRateSource {
        let mut source = MockRateSource::new();
        source.expect_name().return_const(name);
        source.expect_fetch_rate().returning(|_, _| Err(RateSourceError::Unavailable("HTTP 503".into())));
        source
    }

    #[tokio::test]
    async fn same_currency_is_parity() {
        let api = ExchangeRateApi::new();
        let quote = api.fetch_rate("usdt", "USDT").await;
        assert_eq!(quote.value(), Decimal::ONE);
        assert_eq!(quote.origin, RateOrigin::Identity);
    }

    #[tokio::test]
    async fn rates_are_averaged() {
        let api = ExchangeRateApi::new();
        api.register_source(Arc::new(fixed("a", dec!(7.0)))).await;
        api.register_source(Arc::new(fixed("b", dec!(7.4)))).await;
        let quote = api.fetch_rate("CNY", "USDT").await;
        assert_eq!(quote.value(), dec!(7.2));
        assert_eq!(quote.origin, RateOrigin::Aggregated(2));
    }

    #[tokio::test]
    async fn failing_sources_are_ignored() {
        let api = ExchangeRateApi::new();
        api.register_source(Arc::new(fixed("a", dec!(7.0)))).await;
        api.register_source(Arc::new(failing("b"))).await;
        api.register_source(Arc::new(fixed("c", dec!(0)))).await;
        let quote = api.fetch_rate("CNY", "USDT").await;
        assert_eq!(quote.value(), dec!(7.0));
        assert_eq!(quote.origin, RateOrigin::Aggregated(1));
    }

    #[tokio::test]
    async fn no_answers_fall_back_to_one_without_caching() {
        let api = ExchangeRateApi::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c2 = calls.clone();
        let mut source = MockRateSource::new();
        source.expect_name().return_const("down");
        source.expect_fetch_rate().returning(move |_, _| {
            c2.fetch_add(1, Ordering::SeqCst);
            Err(RateSourceError::Unavailable("connection refused".into()))
        });
        api.register_source(Arc::new(source)).await;
        let quote = api.fetch_rate("CNY", "USDT").await;
        assert!(quote.is_fallback());
        assert_eq!(quote.value(), Decimal::ONE);
        let _ = api.fetch_rate("CNY", "USDT").await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cached_rates_expire_after_the_ttl() {
        let api = ExchangeRateApi::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let c2 = calls.clone();
        let mut source = MockRateSource::new();
        source.expect_name().return_const("counting");
        source.expect_fetch_rate().returning(move |_, _| {
            let n = c2.fetch_add(1, Ordering::SeqCst);
            Ok(if n == 0 { dec!(7.2) } else { dec!(7.3) })
        });
        api.register_source(Arc::new(source)).await;
        let t0 = Utc::now();

        let first = api.fetch_rate_at("CNY", "USDT", t0).await;
        assert_eq!(first.value(), dec!(7.2));
        let cached = api.fetch_rate_at("CNY", "USDT", t0 + chrono::Duration::seconds(299)).await;
        assert_eq!(cached.origin, RateOrigin::Cached);
        assert_eq!(cached.value(), dec!(7.2));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let refreshed = api.fetch_rate_at("CNY", "USDT", t0 + chrono::Duration::seconds(301)).await;
        assert_eq!(refreshed.origin, RateOrigin::Aggregated(1));
        assert_eq!(refreshed.value(), dec!(7.3));
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // The reverse pair is a separate cache entry
        let _ = api.fetch_rate_at("USDT", "CNY", t0 + chrono::Duration::seconds(302)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        api.invalidate("cny", "usdt").await;
        let _ = api.fetch_rate_at("CNY", "USDT", t0 + chrono::Duration::seconds(303)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn ttl_is_configurable() {
        let api = ExchangeRateApi::new().with_ttl(chrono::Duration::seconds(10));
        api.register_source(Arc::new(fixed("a", dec!(7.2)))).await;
        assert_eq!(api.source_count().await, 1);
        let t0 = Utc::now();
        let _ = api.fetch_rate_at("CNY", "USDT", t0).await;
        assert_eq!(api.fetch_rate_at("CNY", "USDT", t0 + chrono::Duration::seconds(9)).await.origin, RateOrigin::Cached);
        let refreshed = api.fetch_rate_at("CNY", "USDT", t0 + chrono::Duration::seconds(11)).await;
        assert_eq!(refreshed.origin, RateOrigin::Aggregated(1));
    }

    #[tokio::test]
    async fn slow_sources_time_out() {
        struct Slow;

        #[async_trait::async_trait]
        impl RateSource for Slow {
            fn name(&self) -> &'static str {
                "slow"
            }

            async fn fetch_rate(&self, _from: &str, _to: &str) -> Result<Decimal, RateSourceError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(dec!(100))
            }
        }

        let api = ExchangeRateApi::new().with_source_timeout(Duration::from_millis(50));
        api.register_source(Arc::new(Slow)).await;
        api.register_source(Arc::new(fixed("fast", dec!(7.4)))).await;
        let quote = api.fetch_rate("CNY", "USDT").await;
        assert_eq!(quote.value(), dec!(7.4));
    }
}
