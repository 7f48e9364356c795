use std::sync::Arc;

use hashpay_engine::{
    events::EventProducers,
    test_utils::prepare_env::{prepare_test_env, random_db_path, tear_down},
    ExchangeRateApi,
    OrderFlowApi,
    ReconciliationScheduler,
    SchedulerConfig,
    SourceRegistry,
    SqliteDatabase,
};

/// Everything the reconciliation tests need, wired together the way the server wires it.
pub struct TestSystem {
    pub db: SqliteDatabase,
    pub rates: Arc<ExchangeRateApi>,
    pub sources: SourceRegistry,
    pub ledger: Arc<OrderFlowApi<SqliteDatabase>>,
    pub scheduler: ReconciliationScheduler<SqliteDatabase>,
}

impl TestSystem {
    pub async fn new() -> Self {
        Self::with_config(SchedulerConfig::default(), EventProducers::default()).await
    }

    pub async fn with_config(config: SchedulerConfig, producers: EventProducers) -> Self {
        let db = prepare_test_env(&random_db_path()).await;
        let rates = Arc::new(ExchangeRateApi::new());
        let sources = SourceRegistry::new();
        let ledger = Arc::new(OrderFlowApi::new(db.clone(), Arc::clone(&rates), sources.clone(), producers));
        let scheduler = ReconciliationScheduler::new(Arc::clone(&ledger), config);
        Self { db, rates, sources, ledger, scheduler }
    }

    pub async fn tear_down(self) {
        self.scheduler.stop().await;
        tear_down(&self.db).await;
    }
}
