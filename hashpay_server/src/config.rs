use std::{env, str::FromStr, time::Duration};

use hashpay_engine::{
    hpe_api::{notification_api::DEFAULT_ALERT_TARGET, order_flow_api::DEFAULT_ORDER_TIMEOUT_SECS},
    reconciliation::scheduler::DEFAULT_POLL_INTERVAL,
    MatchPolicy,
};
use hpg_common::{parse_list, parse_seconds};
use log::*;
use rust_decimal::Decimal;

const DEFAULT_HP_DATABASE_URL: &str = "sqlite://data/hashpay_store.db";
const DEFAULT_EXPIRY_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_NOTIFY_INTERVAL: Duration = Duration::from_secs(60);
/// Percent
const DEFAULT_MATCH_TOLERANCE: Decimal = Decimal::ONE;
const DEFAULT_RATE_SOURCES: &str = "binance,coingecko";
const DEFAULT_MAX_CONNECTIONS: u32 = 25;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Time between reconciliation cycles.
    pub poll_interval: Duration,
    /// Time between runs of the order expiry worker.
    pub expiry_interval: Duration,
    /// Time between runs of the notification delivery worker.
    pub notify_interval: Duration,
    /// How long a new order stays payable.
    pub order_timeout: chrono::Duration,
    pub match_policy: MatchPolicy,
    /// The relative amount tolerance as a fraction, i.e. 0.01 for the 1% configured in `HP_MATCH_TOLERANCE`.
    pub match_tolerance: Decimal,
    /// Operator alerts are POSTed here. When `None`, alerts are only written to the log.
    pub alert_webhook_url: Option<String>,
    pub alert_target: String,
    /// Names of the exchange rate sources to query, in lower case.
    pub rate_sources: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_HP_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            poll_interval: DEFAULT_POLL_INTERVAL,
            expiry_interval: DEFAULT_EXPIRY_INTERVAL,
            notify_interval: DEFAULT_NOTIFY_INTERVAL,
            order_timeout: chrono::Duration::seconds(DEFAULT_ORDER_TIMEOUT_SECS),
            match_policy: MatchPolicy::default(),
            match_tolerance: DEFAULT_MATCH_TOLERANCE / Decimal::ONE_HUNDRED,
            alert_webhook_url: None,
            alert_target: DEFAULT_ALERT_TARGET.to_string(),
            rate_sources: parse_list(DEFAULT_RATE_SOURCES),
        }
    }
}

impl ServerConfig {
    pub fn new(database_url: &str) -> Self {
        Self { database_url: database_url.to_string(), ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        Self::from_vars(|name| env::var(name).ok())
    }

    /// Builds the configuration from a variable lookup. Missing values take their defaults; invalid ones are logged
    /// and also take their defaults.
    pub fn from_vars<F>(var: F) -> Self
    where F: Fn(&str) -> Option<String> {
        let defaults = Self::default();
        let database_url = var("HP_DATABASE_URL").filter(|s| !s.trim().is_empty()).unwrap_or_else(|| {
            warn!("🪛️ HP_DATABASE_URL is not set. Using the default, {DEFAULT_HP_DATABASE_URL}.");
            DEFAULT_HP_DATABASE_URL.to_string()
        });
        let poll_interval = interval(&var, "HP_POLL_INTERVAL", defaults.poll_interval);
        let expiry_interval = interval(&var, "HP_EXPIRY_INTERVAL", defaults.expiry_interval);
        let notify_interval = interval(&var, "HP_NOTIFY_INTERVAL", defaults.notify_interval);
        let order_timeout = interval(&var, "HP_ORDER_TIMEOUT", Duration::from_secs(DEFAULT_ORDER_TIMEOUT_SECS as u64));
        let order_timeout = chrono::Duration::from_std(order_timeout).unwrap_or_else(|e| {
            warn!("🪛️ HP_ORDER_TIMEOUT is out of range. {e}. Using the default.");
            defaults.order_timeout
        });
        let match_policy = var("HP_MATCH_POLICY")
            .map(|s| {
                MatchPolicy::from_str(&s).unwrap_or_else(|e| {
                    warn!("🪛️ {e}. Using the default match policy, {}.", defaults.match_policy);
                    defaults.match_policy
                })
            })
            .unwrap_or(defaults.match_policy);
        let match_tolerance = var("HP_MATCH_TOLERANCE")
            .map(|s| parse_tolerance(&s).unwrap_or_else(|e| {
                warn!("🪛️ {e} Using the default tolerance of {DEFAULT_MATCH_TOLERANCE}%.");
                defaults.match_tolerance
            }))
            .unwrap_or(defaults.match_tolerance);
        let alert_webhook_url = var("HP_ALERT_WEBHOOK_URL").filter(|s| !s.trim().is_empty());
        if alert_webhook_url.is_none() {
            info!("🪛️ HP_ALERT_WEBHOOK_URL is not set. Operator alerts will only be logged.");
        }
        let alert_target =
            var("HP_ALERT_TARGET").filter(|s| !s.trim().is_empty()).unwrap_or_else(|| defaults.alert_target.clone());
        let rate_sources = var("HP_RATE_SOURCES").map(|s| parse_list(&s)).unwrap_or_else(|| defaults.rate_sources.clone());
        if rate_sources.is_empty() {
            warn!("🪛️ No exchange rate sources are configured. Every conversion will use the fallback rate of 1.");
        }
        Self {
            database_url,
            max_connections: defaults.max_connections,
            poll_interval,
            expiry_interval,
            notify_interval,
            order_timeout,
            match_policy,
            match_tolerance,
            alert_webhook_url,
            alert_target,
            rate_sources,
        }
    }
}

fn interval<F>(var: &F, name: &str, default: Duration) -> Duration
where F: Fn(&str) -> Option<String> {
    match var(name) {
        Some(s) => parse_seconds(&s).unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e}. Using the default, {default:?}, instead.");
            default
        }),
        None => default,
    }
}

/// Parses a percentage (`1`, `0.5`, `2%`) into a fraction. It must lie strictly between 0 and 100.
fn parse_tolerance(value: &str) -> Result<Decimal, String> {
    let trimmed = value.trim();
    let digits = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
    let percent = Decimal::from_str(digits).map_err(|e| format!("{value} is not a valid HP_MATCH_TOLERANCE. {e}."))?;
    if percent <= Decimal::ZERO || percent >= Decimal::ONE_HUNDRED {
        return Err(format!("HP_MATCH_TOLERANCE must be between 0 and 100 percent, not {percent}."));
    }
    Ok(percent / Decimal::ONE_HUNDRED)
}
