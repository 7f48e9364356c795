use hashpay_engine::db_types::SourceConfig;
use hpg_common::Secret;
use log::*;

pub const DEFAULT_TRONGRID_URL: &str = "https://api.trongrid.io";
pub const DEFAULT_ETHERSCAN_URL: &str = "https://api.etherscan.io";
pub const DEFAULT_BSCSCAN_URL: &str = "https://api.bscscan.com";
pub const DEFAULT_POLYGONSCAN_URL: &str = "https://api.polygonscan.com";
pub const DEFAULT_OKX_URL: &str = "https://www.okx.com";
pub const DEFAULT_SOLSCAN_URL: &str = "https://public-api.solscan.io";
pub const DEFAULT_TONCENTER_URL: &str = "https://toncenter.com";
pub const DEFAULT_BINANCE_URL: &str = "https://api.binance.com";
pub const DEFAULT_COINGECKO_URL: &str = "https://api.coingecko.com";

/// Connection details for one provider. Built from a stored source registration, or from the environment for rate
/// sources.
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub endpoint: String,
    pub api_key: Secret<String>,
    pub api_secret: Secret<String>,
    pub passphrase: Secret<String>,
}

impl ProviderConfig {
    pub fn new(endpoint: &str) -> Self {
        Self { endpoint: endpoint.to_string(), ..Default::default() }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Secret::new(api_key.to_string());
        self
    }

    /// Uses the stored endpoint, or `default_endpoint` when none was registered.
    pub fn from_source_config(config: &SourceConfig, default_endpoint: &str) -> Self {
        let endpoint = if config.endpoint.trim().is_empty() {
            debug!("🪛️ No endpoint registered for {}. Using {default_endpoint}", config.chain);
            default_endpoint.to_string()
        } else {
            config.endpoint.trim().to_string()
        };
        Self {
            endpoint,
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            passphrase: config.passphrase.clone(),
        }
    }

    /// Reads `{prefix}_URL` and `{prefix}_API_KEY`, e.g. `HP_COINGECKO_URL`.
    pub fn new_from_env_or_default(prefix: &str, default_endpoint: &str) -> Self {
        let endpoint = std::env::var(format!("{prefix}_URL")).unwrap_or_else(|_| default_endpoint.to_string());
        let api_key = Secret::new(std::env::var(format!("{prefix}_API_KEY")).unwrap_or_default());
        Self { endpoint, api_key, ..Default::default() }
    }

    pub fn has_exchange_credentials(&self) -> bool {
        !(self.api_key.is_empty() || self.api_secret.is_empty() || self.passphrase.is_empty())
    }
}
