//! Provider adapters for the HashPay reconciliation engine.
//!
//! * Transfer sources: [`TronGridSource`] (TRC-20 on TRON), [`EtherscanSource`] (ERC-20 style tokens via Etherscan,
//!   BscScan or PolygonScan), [`SolanaSource`] (SPL tokens via Solscan), [`TonSource`] (Jettons via TON Center),
//!   plus [`OkxDepositSource`] and [`BinanceDepositSource`] for exchange deposits.
//! * Rate sources: [`BinanceRateSource`] and [`CoinGeckoRateSource`].
//! * [`HttpNotifier`], the HTTP [`hashpay_engine::NotificationDispatcher`].
//!
//! Use [`build_transfer_source`] and [`build_rate_source`] to construct them from configuration.
mod api;
mod binance;
mod config;
mod error;
mod etherscan;
mod factory;
mod notifier;
mod okx;
mod rates;
mod solana;
mod ton;
mod tron;

pub mod data_objects;
pub mod helpers;

pub use api::{RestClient, DEFAULT_TIMEOUT};
pub use binance::BinanceDepositSource;
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use etherscan::{EtherscanSource, TokenContract};
pub use factory::{build_rate_source, build_transfer_source};
pub use notifier::HttpNotifier;
pub use okx::OkxDepositSource;
pub use rates::{BinanceRateSource, CoinGeckoRateSource};
pub use solana::{SolanaSource, SplToken, USDT_SPL_MINT};
pub use ton::{Jetton, TonSource, USDT_JETTON_MASTER};
pub use tron::{Trc20Token, TronGridSource, USDT_TRC20_CONTRACT};
