use std::sync::Arc;

use hashpay_engine::{
    traits::SourceConfigManagement,
    ExchangeRateApi,
    NotificationApi,
    NotificationQueue,
    OrderFlowApi,
    ReconciliationScheduler,
    SchedulerConfig,
    SourceRegistry,
    SqliteDatabase,
};
use hashpay_sources::{build_rate_source, build_transfer_source, HttpNotifier};
use log::*;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    expiry_worker::start_expiry_worker,
    hooks::create_audit_event_handlers,
    notification_worker::start_notification_worker,
};

/// A running engine: the reconciliation scheduler plus the expiry and notification workers.
pub struct HashPayServer {
    pub ledger: Arc<OrderFlowApi<SqliteDatabase>>,
    pub scheduler: Arc<ReconciliationScheduler<SqliteDatabase>>,
    pub notifications: Arc<NotificationApi<SqliteDatabase>>,
    token: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

impl HashPayServer {
    /// Stops the scheduler and both workers, waiting for any run in progress to finish.
    pub async fn shutdown(self) {
        info!("🚀️ Shutting down");
        self.token.cancel();
        self.scheduler.stop().await;
        for worker in self.workers {
            if let Err(e) = worker.await {
                warn!("🕰️ A worker did not shut down cleanly. {e}");
            }
        }
        info!("🚀️ All workers stopped");
    }
}

/// Runs until Ctrl-C is received.
pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let server = start_server(config).await?;
    tokio::signal::ctrl_c().await?;
    server.shutdown().await;
    Ok(())
}

pub async fn start_server(config: ServerConfig) -> Result<HashPayServer, ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections).await?;
    db.migrate().await?;
    start_with_database(config, db).await
}

pub async fn start_with_database(config: ServerConfig, db: SqliteDatabase) -> Result<HashPayServer, ServerError> {
    let rates = Arc::new(ExchangeRateApi::new());
    for name in &config.rate_sources {
        match build_rate_source(name) {
            Ok(source) => rates.register_source(source).await,
            Err(e) => warn!("🪛️ Skipping rate source {name}. {e}"),
        }
    }
    let sources = SourceRegistry::new();
    let registered = register_transfer_sources(&db, &sources).await?;
    if registered == 0 {
        warn!("🔌️ No transfer sources are registered. No payments will be detected.");
    }

    let handlers = create_audit_event_handlers();
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let queue = NotificationQueue::new(db.clone()).with_alert_target(&config.alert_target);
    let ledger = OrderFlowApi::new(db, rates, sources, producers)
        .with_notifications(queue.clone())
        .with_order_timeout(config.order_timeout);
    let ledger = Arc::new(ledger);

    let scheduler_config = SchedulerConfig::default()
        .with_poll_interval(config.poll_interval)
        .with_policy(config.match_policy)
        .with_tolerance(config.match_tolerance);
    let scheduler = Arc::new(ReconciliationScheduler::new(Arc::clone(&ledger), scheduler_config));
    scheduler.start().await;

    let notifier = HttpNotifier::new(config.alert_webhook_url.clone())?;
    let notifications = Arc::new(NotificationApi::new(queue, Arc::new(notifier)));

    let token = CancellationToken::new();
    let workers = vec![
        start_expiry_worker(Arc::clone(&ledger), config.expiry_interval, token.clone()),
        start_notification_worker(Arc::clone(&notifications), config.notify_interval, token.clone()),
    ];
    info!(
        "🚀️ HashPay is running. Polling every {:?} with the {} policy and {}% tolerance",
        config.poll_interval,
        config.match_policy,
        config.match_tolerance * rust_decimal::Decimal::ONE_HUNDRED
    );
    Ok(HashPayServer { ledger, scheduler, notifications, token, workers })
}

/// Builds an adapter for every enabled row of the source registration table. A row that cannot be built is logged and
/// skipped, so one bad registration does not take the other chains down with it.
pub async fn register_transfer_sources(db: &SqliteDatabase, registry: &SourceRegistry) -> Result<usize, ServerError> {
    let configs = db.fetch_source_configs().await?;
    let mut count = 0;
    for config in configs {
        match build_transfer_source(&config) {
            Ok(source) => {
                registry.register(config.chain.clone(), source).await;
                count += 1;
            },
            Err(e) => warn!("🔌️ Could not build the {} source for {}. {e}", config.provider, config.chain),
        }
    }
    Ok(count)
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use hashpay_engine::{
        db_types::{Chain, OrderStatusType, SourceConfig, SourceKind},
        test_utils::prepare_env::{prepare_test_env, random_db_path},
    };
    use hpg_common::Secret;
    use rust_decimal_macros::dec;

    use super::*;

    fn registration(chain: &str, provider: &str) -> SourceConfig {
        SourceConfig {
            chain: Chain::new(chain),
            kind: SourceKind::Chain,
            provider: provider.into(),
            endpoint: String::default(),
            api_key: Secret::default(),
            api_secret: Secret::default(),
            passphrase: Secret::default(),
            enabled: true,
        }
    }

    #[tokio::test]
    async fn sources_are_built_from_registrations() {
        let db = prepare_test_env(&random_db_path()).await;
        db.upsert_source_config(&registration("TRON", "trongrid")).await.unwrap();
        db.upsert_source_config(&registration("BSC", "bscscan")).await.unwrap();
        db.upsert_source_config(&registration("SOL", "solscan")).await.unwrap();
        // Unknown providers and exchanges without credentials are skipped
        db.upsert_source_config(&registration("BTC", "blockchair")).await.unwrap();
        db.upsert_source_config(&registration("OKX", "okx")).await.unwrap();
        let registry = SourceRegistry::new();
        assert_eq!(register_transfer_sources(&db, &registry).await.unwrap(), 3);
        assert_eq!(registry.chains().await, vec![Chain::new("BSC"), Chain::new("SOL"), Chain::new("TRON")]);
    }

    #[tokio::test]
    async fn workers_run_and_shut_down() {
        let url = random_db_path();
        let db = prepare_test_env(&url).await;
        let mut config = ServerConfig::new(&url);
        config.rate_sources = Vec::new();
        config.poll_interval = Duration::from_millis(50);
        config.expiry_interval = Duration::from_millis(50);
        config.notify_interval = Duration::from_millis(50);
        config.order_timeout = chrono::Duration::milliseconds(1);
        let server = start_with_database(config, db).await.unwrap();
        assert!(server.scheduler.is_running().await);

        let order = server.ledger.create_order(dec!(10), "USDT", None).await.unwrap();
        let mut expired = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if server.ledger.fetch_order(&order.order_id).await.unwrap().status == OrderStatusType::Expired {
                expired = true;
                break;
            }
        }
        assert!(expired, "the expiry worker did not expire the order");

        let scheduler = Arc::clone(&server.scheduler);
        server.shutdown().await;
        assert!(!scheduler.is_running().await);
    }
}
