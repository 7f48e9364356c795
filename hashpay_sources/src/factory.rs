use std::sync::Arc;

use hashpay_engine::{db_types::SourceConfig, RateSource, TransferSource};
use log::*;

use crate::{
    config::{
        ProviderConfig,
        DEFAULT_BINANCE_URL,
        DEFAULT_BSCSCAN_URL,
        DEFAULT_COINGECKO_URL,
        DEFAULT_ETHERSCAN_URL,
        DEFAULT_OKX_URL,
        DEFAULT_POLYGONSCAN_URL,
        DEFAULT_SOLSCAN_URL,
        DEFAULT_TONCENTER_URL,
        DEFAULT_TRONGRID_URL,
    },
    binance::BinanceDepositSource,
    etherscan::{EtherscanSource, TokenContract},
    okx::OkxDepositSource,
    rates::{BinanceRateSource, CoinGeckoRateSource},
    solana::SolanaSource,
    ton::TonSource,
    tron::TronGridSource,
    ProviderError,
};

/// Builds the adapter a stored source registration asks for.
pub fn build_transfer_source(config: &SourceConfig) -> Result<Arc<dyn TransferSource>, ProviderError> {
    let provider = config.provider.trim().to_ascii_lowercase();
    debug!("🔌️ Building {provider} transfer source for {}", config.chain);
    let source: Arc<dyn TransferSource> = match provider.as_str() {
        "trongrid" | "tron" => {
            Arc::new(TronGridSource::new(&ProviderConfig::from_source_config(config, DEFAULT_TRONGRID_URL))?)
        },
        "etherscan" => Arc::new(EtherscanSource::new(
            "etherscan",
            &ProviderConfig::from_source_config(config, DEFAULT_ETHERSCAN_URL),
            TokenContract::ethereum_usdt(),
        )?),
        "bscscan" => Arc::new(EtherscanSource::new(
            "bscscan",
            &ProviderConfig::from_source_config(config, DEFAULT_BSCSCAN_URL),
            TokenContract::bsc_usdt(),
        )?),
        "polygonscan" => Arc::new(EtherscanSource::new(
            "polygonscan",
            &ProviderConfig::from_source_config(config, DEFAULT_POLYGONSCAN_URL),
            TokenContract::polygon_usdt(),
        )?),
        "solscan" | "solana" => {
            Arc::new(SolanaSource::new(&ProviderConfig::from_source_config(config, DEFAULT_SOLSCAN_URL))?)
        },
        "toncenter" | "ton" => {
            Arc::new(TonSource::new(&ProviderConfig::from_source_config(config, DEFAULT_TONCENTER_URL))?)
        },
        "okx" => Arc::new(OkxDepositSource::new(&ProviderConfig::from_source_config(config, DEFAULT_OKX_URL))?),
        "binance" => {
            Arc::new(BinanceDepositSource::new(&ProviderConfig::from_source_config(config, DEFAULT_BINANCE_URL))?)
        },
        other => return Err(ProviderError::UnknownProvider(other.to_string())),
    };
    Ok(source)
}

/// Builds a rate source by name. Endpoints and keys can be overridden with `HP_<NAME>_URL` and `HP_<NAME>_API_KEY`.
pub fn build_rate_source(name: &str) -> Result<Arc<dyn RateSource>, ProviderError> {
    let name = name.trim().to_ascii_lowercase();
    let source: Arc<dyn RateSource> = match name.as_str() {
        "binance" => {
            Arc::new(BinanceRateSource::new(&ProviderConfig::new_from_env_or_default("HP_BINANCE", DEFAULT_BINANCE_URL))?)
        },
        "coingecko" => Arc::new(CoinGeckoRateSource::new(&ProviderConfig::new_from_env_or_default(
            "HP_COINGECKO",
            DEFAULT_COINGECKO_URL,
        ))?),
        other => return Err(ProviderError::UnknownProvider(other.to_string())),
    };
    Ok(source)
}

#[cfg(test)]
mod test {
    use hashpay_engine::db_types::{Chain, SourceKind};
    use hpg_common::Secret;

    use super::*;

    fn registration(provider: &str) -> SourceConfig {
        SourceConfig {
            chain: Chain::new("BSC"),
            kind: SourceKind::Chain,
            provider: provider.into(),
            endpoint: String::default(),
            api_key: Secret::from("key"),
            api_secret: Secret::default(),
            passphrase: Secret::default(),
            enabled: true,
        }
    }

    #[test]
    fn transfer_sources_by_provider() {
        assert_eq!(build_transfer_source(&registration("TronGrid")).unwrap().name(), "trongrid");
        assert_eq!(build_transfer_source(&registration("bscscan")).unwrap().name(), "bscscan");
        assert_eq!(build_transfer_source(&registration("polygonscan")).unwrap().name(), "polygonscan");
        let err = build_transfer_source(&registration("okx")).err().unwrap();
        assert!(matches!(err, ProviderError::MissingCredentials(_)));
        assert_eq!(build_transfer_source(&registration("Solana")).unwrap().name(), "solscan");
        assert_eq!(build_transfer_source(&registration("ton")).unwrap().name(), "toncenter");
        let err = build_transfer_source(&registration("binance")).err().unwrap();
        assert!(matches!(err, ProviderError::MissingCredentials(_)));
        let mut exchange = registration("binance");
        exchange.kind = SourceKind::Exchange;
        exchange.api_secret = Secret::from("secret");
        let source = build_transfer_source(&exchange).unwrap();
        assert_eq!(source.name(), "binance");
        assert_eq!(source.kind(), SourceKind::Exchange);
        let err = build_transfer_source(&registration("blockchair")).err().unwrap();
        assert!(matches!(err, ProviderError::UnknownProvider(ref p) if p == "blockchair"));
    }

    #[test]
    fn rate_sources_by_name() {
        assert_eq!(build_rate_source("Binance").unwrap().name(), "binance");
        assert_eq!(build_rate_source(" coingecko").unwrap().name(), "coingecko");
        assert!(build_rate_source("kraken").is_err());
    }
}
