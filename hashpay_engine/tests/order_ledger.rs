use std::{
    future::Future,
    pin::Pin,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::Utc;
use hashpay_engine::{
    db_types::{Chain, Merchant, NotificationKind, OrderId, OrderStatusType, PaymentMethod, SourceKind, Transfer},
    events::{EventHandlers, EventHooks, OrderAnnulledEvent, OrderPaidEvent},
    traits::MerchantManagement,
    ConfirmOutcome,
    ErrorCategory,
    OrderFlowError,
    SchedulerConfig,
    SourceError,
    TransferSource,
};
use hpg_common::Secret;
use rust_decimal_macros::dec;

use crate::support::{
    fakes::{transfer, FakeSource, FixedRate},
    prepare_env::TestSystem,
};

mod support;

const ADDRESS: &str = "TLedgerTestAddress00000000000001";

async fn tron_system() -> TestSystem {
    let system = TestSystem::new().await;
    system.rates.register_source(Arc::new(FixedRate::new("fixed", dec!(7.2)))).await;
    system.sources.register(Chain::new("TRON"), Arc::new(FakeSource::new())).await;
    system
}

#[tokio::test]
async fn orders_start_pending() {
    let system = tron_system().await;
    let order = system.ledger.create_order(dec!(88.5), "cny", None).await.unwrap();
    assert!(order.order_id.as_str().starts_with(OrderId::PREFIX));
    assert_eq!(order.currency, "CNY");
    assert_eq!(order.status, OrderStatusType::Pending);
    assert!(order.settlement.is_none());
    assert_eq!(order.expires_at - order.created_at, system.ledger.order_timeout());
    let fetched = system.ledger.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(fetched, order);
    system.tear_down().await;
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let system = tron_system().await;
    let err = system.ledger.create_order(dec!(0), "CNY", None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::InvalidAmount(_)));
    assert_eq!(err.category(), ErrorCategory::InvalidInput);
    let err = system.ledger.create_order(dec!(10), " ", None).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::InvalidInput(_)));

    let missing = OrderId::from("PAY0000000000000000");
    let err = system.ledger.fetch_order(&missing).await.unwrap_err();
    assert_eq!(err.category(), ErrorCategory::NotFound);
    let err = system.ledger.select_method(&missing, &Chain::new("TRON"), "USDT", ADDRESS).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::OrderNotFound(_)));

    let order = system.ledger.create_order(dec!(10), "CNY", None).await.unwrap();
    // The fake TRON source only accepts addresses that start with a 'T'
    let err = system.ledger.select_method(&order.order_id, &Chain::new("TRON"), "USDT", "0xabc").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::InvalidAddress { .. }));
    let err = system.ledger.select_method(&order.order_id, &Chain::new("TRON"), "USDT", " ").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::InvalidInput(_)));

    // Confirming before a method has been chosen is refused
    let err = system.ledger.confirm_payment(&order.order_id, &transfer("0x1", ADDRESS, dec!(1.39))).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::InvalidInput(_)));
    system.tear_down().await;
}

#[tokio::test]
async fn method_is_selected_once() {
    let system = tron_system().await;
    let order = system.ledger.create_order(dec!(100), "CNY", None).await.unwrap();
    let order = system.ledger.select_method(&order.order_id, &Chain::new("tron"), "usdt", ADDRESS).await.unwrap();
    let settlement = order.settlement.clone().unwrap();
    assert_eq!(settlement.amount, dec!(13.888889));
    assert_eq!(settlement.currency, "USDT");
    assert_eq!(settlement.chain, Chain::new("TRON"));
    assert_eq!(settlement.address, ADDRESS);
    assert_eq!(settlement.method, PaymentMethod::Blockchain);

    let err = system.ledger.select_method(&order.order_id, &Chain::new("TRON"), "USDT", ADDRESS).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::MethodAlreadySelected(_)));
    assert_eq!(err.category(), ErrorCategory::InvalidState);
    system.tear_down().await;
}

#[tokio::test]
async fn exchange_sources_select_the_exchange_method() {
    let system = tron_system().await;
    #[derive(Clone)]
    struct Exchange(FakeSource);
    #[async_trait::async_trait]
    impl TransferSource for Exchange {
        fn name(&self) -> &'static str {
            "exchange"
        }

        fn kind(&self) -> SourceKind {
            SourceKind::Exchange
        }

        async fn get_transfers(
            &self,
            address: &str,
            since: chrono::DateTime<Utc>,
        ) -> Result<Vec<Transfer>, SourceError> {
            self.0.get_transfers(address, since).await
        }

        async fn get_transfer(&self, hash: &str) -> Result<Transfer, SourceError> {
            self.0.get_transfer(hash).await
        }

        fn validate_address(&self, address: &str) -> bool {
            !address.is_empty()
        }
    }
    system.sources.register(Chain::new("OKX"), Arc::new(Exchange(FakeSource::new()))).await;
    let order = system.ledger.create_order(dec!(5), "USDT", None).await.unwrap();
    let order = system.ledger.select_method(&order.order_id, &Chain::new("OKX"), "USDT", "uid-1234").await.unwrap();
    assert_eq!(order.settlement.unwrap().method, PaymentMethod::Exchange);
    system.tear_down().await;
}

#[tokio::test]
async fn unknown_chains_fall_back_to_blockchain() {
    let system = tron_system().await;
    let order = system.ledger.create_order(dec!(5), "USDT", None).await.unwrap();
    let order = system.ledger.select_method(&order.order_id, &Chain::new("ETH"), "USDT", "0xdead").await.unwrap();
    assert_eq!(order.settlement.unwrap().method, PaymentMethod::Blockchain);
    system.tear_down().await;
}

#[tokio::test]
async fn missing_rates_price_at_parity() {
    let system = TestSystem::new().await;
    system.rates.register_source(Arc::new(FixedRate::failing("down"))).await;
    let order = system.ledger.create_order(dec!(42), "CNY", None).await.unwrap();
    let order = system.ledger.select_method(&order.order_id, &Chain::new("TRON"), "USDT", ADDRESS).await.unwrap();
    assert_eq!(order.settlement.unwrap().amount, dec!(42));
    system.tear_down().await;
}

#[tokio::test]
async fn confirmation_is_idempotent() {
    let system = tron_system().await;
    let order = system.ledger.create_order(dec!(100), "CNY", None).await.unwrap();
    system.ledger.select_method(&order.order_id, &Chain::new("TRON"), "USDT", ADDRESS).await.unwrap();
    let t = transfer("0xpaid", ADDRESS, dec!(13.89));

    let outcome = system.ledger.confirm_payment(&order.order_id, &t).await.unwrap();
    assert!(outcome.is_new());
    let paid = outcome.into_order();
    assert_eq!(paid.status, OrderStatusType::Paid);
    assert_eq!(paid.tx_hash.as_deref(), Some("0xpaid"));
    assert_eq!(system.ledger.fetch_notifications(&order.order_id).await.unwrap().len(), 1);

    // Again, with the same and with a different transfer. Nothing changes.
    let outcome = system.ledger.confirm_payment(&order.order_id, &t).await.unwrap();
    assert!(matches!(outcome, ConfirmOutcome::AlreadyPaid(_)));
    let outcome =
        system.ledger.confirm_payment(&order.order_id, &transfer("0xother", ADDRESS, dec!(13.89))).await.unwrap();
    assert!(!outcome.is_new());
    assert_eq!(outcome.order().tx_hash.as_deref(), Some("0xpaid"));
    let outcome = system.ledger.confirm_manually(&order.order_id, "0xmanual", "alice").await.unwrap();
    assert!(!outcome.is_new());

    let order = system.ledger.fetch_order(&order.order_id).await.unwrap();
    assert_eq!(order.paid_at, paid.paid_at);
    assert_eq!(system.ledger.fetch_notifications(&order.order_id).await.unwrap().len(), 1);
    system.tear_down().await;
}

#[tokio::test]
async fn orders_past_their_deadline_cannot_be_confirmed() {
    let system = tron_system().await;
    let order = system.ledger.create_order(dec!(100), "CNY", None).await.unwrap();
    system.ledger.select_method(&order.order_id, &Chain::new("TRON"), "USDT", ADDRESS).await.unwrap();
    let t = transfer("0xlate", ADDRESS, dec!(13.89));
    // The sweep has not run, but the deadline has passed
    let later = order.expires_at + chrono::Duration::seconds(1);
    let err = system.ledger.confirm_payment_at(&order.order_id, &t, later).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::OrderExpired(_)));
    assert!(system.ledger.fetch_order(&order.order_id).await.unwrap().is_pending());

    assert_eq!(system.ledger.expire_orders_at(later).await.unwrap(), 1);
    assert_eq!(system.ledger.expire_orders_at(later).await.unwrap(), 0);
    let err = system.ledger.confirm_manually(&order.order_id, "0xlate", "alice").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::OrderExpired(_)));
    system.tear_down().await;
}

#[tokio::test]
async fn expiry_only_touches_overdue_pending_orders() {
    let system = tron_system().await;
    let stale = system.ledger.create_order(dec!(1), "USDT", None).await.unwrap();
    let paid = system.ledger.create_order(dec!(2), "USDT", None).await.unwrap();
    system.ledger.select_method(&paid.order_id, &Chain::new("TRON"), "USDT", ADDRESS).await.unwrap();
    system.ledger.confirm_payment(&paid.order_id, &transfer("0xp", ADDRESS, dec!(2))).await.unwrap();

    let soon = Utc::now() + chrono::Duration::seconds(60);
    assert_eq!(system.ledger.expire_orders_at(soon).await.unwrap(), 0);
    let later = stale.expires_at + chrono::Duration::seconds(1);
    assert_eq!(system.ledger.expire_orders_at(later).await.unwrap(), 1);
    assert_eq!(system.ledger.fetch_order(&stale.order_id).await.unwrap().status, OrderStatusType::Expired);
    assert_eq!(system.ledger.fetch_order(&paid.order_id).await.unwrap().status, OrderStatusType::Paid);
    system.tear_down().await;
}

#[tokio::test]
async fn manual_confirmation() {
    let system = tron_system().await;
    let order = system.ledger.create_order(dec!(100), "CNY", None).await.unwrap();
    let err = system.ledger.confirm_manually(&order.order_id, "  ", "alice").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::InvalidInput(_)));

    // No payment method is needed for a manual confirmation
    let outcome = system.ledger.confirm_manually(&order.order_id, "0xreviewed", "alice").await.unwrap();
    assert!(outcome.is_new());
    assert_eq!(outcome.order().tx_hash.as_deref(), Some("0xreviewed"));

    // The same hash cannot be used twice
    let other = system.ledger.create_order(dec!(100), "CNY", None).await.unwrap();
    let err = system.ledger.confirm_manually(&other.order_id, "0xreviewed", "bob").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::TransferAlreadyClaimed { .. }));
    system.tear_down().await;
}

#[tokio::test]
async fn failed_orders_are_final() {
    let system = tron_system().await;
    let order = system.ledger.create_order(dec!(100), "CNY", None).await.unwrap();
    system.ledger.select_method(&order.order_id, &Chain::new("TRON"), "USDT", ADDRESS).await.unwrap();
    let failed = system.ledger.fail_order(&order.order_id, "Customer cancelled").await.unwrap();
    assert_eq!(failed.status, OrderStatusType::Failed);
    assert_eq!(failed.memo.as_deref(), Some("Customer cancelled"));

    let err = system.ledger.confirm_payment(&order.order_id, &transfer("0xf", ADDRESS, dec!(13.89))).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::OrderNotPending { status: OrderStatusType::Failed, .. }));
    let err = system.ledger.fail_order(&order.order_id, "again").await.unwrap_err();
    assert!(matches!(err, OrderFlowError::OrderNotPending { .. }));
    let err = system.ledger.select_method(&order.order_id, &Chain::new("TRON"), "USDT", ADDRESS).await.unwrap_err();
    assert!(matches!(err, OrderFlowError::OrderNotPending { .. }));
    system.tear_down().await;
}

#[tokio::test]
async fn paid_orders_notify_the_merchant() {
    let system = tron_system().await;
    let merchant = Merchant {
        id: "shop-1".into(),
        name: "Shop One".into(),
        api_key: Secret::new("k3y".to_string()),
        callback_url: Some("https://shop.example/callback".into()),
        notify_url: None,
    };
    system.db.upsert_merchant(&merchant).await.unwrap();
    let order = system.ledger.create_order(dec!(100), "CNY", Some("shop-1")).await.unwrap();
    system.ledger.select_method(&order.order_id, &Chain::new("TRON"), "USDT", ADDRESS).await.unwrap();
    system.ledger.confirm_payment(&order.order_id, &transfer("0xm", ADDRESS, dec!(13.89))).await.unwrap();

    let notifications = system.ledger.fetch_notifications(&order.order_id).await.unwrap();
    let kinds = notifications.iter().map(|n| n.kind).collect::<Vec<_>>();
    assert_eq!(kinds, vec![NotificationKind::Alert, NotificationKind::Callback]);
    assert_eq!(notifications[1].target, "https://shop.example/callback");
    let payload: serde_json::Value = serde_json::from_str(&notifications[1].payload).unwrap();
    assert_eq!(payload["order_id"], order.order_id.as_str());
    assert_eq!(payload["tx_hash"], "0xm");
    system.tear_down().await;
}

#[tokio::test]
async fn stats_count_every_state() {
    let system = tron_system().await;
    let a = system.ledger.create_order(dec!(10), "USDT", None).await.unwrap();
    let b = system.ledger.create_order(dec!(20), "USDT", None).await.unwrap();
    let c = system.ledger.create_order(dec!(30), "CNY", None).await.unwrap();
    system.ledger.create_order(dec!(40), "CNY", None).await.unwrap();
    system.ledger.confirm_manually(&a.order_id, "0xa", "alice").await.unwrap();
    system.ledger.confirm_manually(&b.order_id, "0xb", "alice").await.unwrap();
    system.ledger.fail_order(&c.order_id, "fraud").await.unwrap();

    let stats = system.ledger.order_stats().await.unwrap();
    assert_eq!(stats.pending, 1);
    assert_eq!(stats.paid, 2);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.expired, 0);
    assert_eq!(stats.total(), 4);
    assert_eq!(stats.paid_volume, vec![("USDT".to_string(), dec!(30))]);
    system.tear_down().await;
}

#[tokio::test]
async fn hooks_fire_on_paid_and_annulled_orders() {
    let paid = Arc::new(Mutex::new(Vec::<OrderId>::new()));
    let annulled = Arc::new(Mutex::new(Vec::<(OrderId, OrderStatusType)>::new()));
    let mut hooks = EventHooks::default();
    let p = Arc::clone(&paid);
    hooks.on_order_paid(move |ev: OrderPaidEvent| {
        let p = Arc::clone(&p);
        Box::pin(async move {
            p.lock().unwrap().push(ev.order.order_id);
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let a = Arc::clone(&annulled);
    hooks.on_order_annulled(move |ev: OrderAnnulledEvent| {
        let a = Arc::clone(&a);
        Box::pin(async move {
            a.lock().unwrap().push((ev.order.order_id, ev.status));
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(16, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let system = TestSystem::with_config(SchedulerConfig::default(), producers).await;
    let to_pay = system.ledger.create_order(dec!(1), "USDT", None).await.unwrap();
    let to_fail = system.ledger.create_order(dec!(1), "USDT", None).await.unwrap();
    let to_expire = system.ledger.create_order(dec!(1), "USDT", None).await.unwrap();
    system.ledger.confirm_manually(&to_pay.order_id, "0xhook", "alice").await.unwrap();
    system.ledger.confirm_manually(&to_pay.order_id, "0xhook", "alice").await.unwrap();
    system.ledger.fail_order(&to_fail.order_id, "test").await.unwrap();
    system.ledger.expire_orders_at(to_expire.expires_at).await.unwrap();

    for _ in 0..50 {
        if paid.lock().unwrap().len() == 1 && annulled.lock().unwrap().len() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(*paid.lock().unwrap(), vec![to_pay.order_id.clone()]);
    let mut annulled = annulled.lock().unwrap().clone();
    annulled.sort_by_key(|(_, status)| status.to_string());
    assert_eq!(annulled, vec![
        (to_expire.order_id.clone(), OrderStatusType::Expired),
        (to_fail.order_id.clone(), OrderStatusType::Failed)
    ]);
    system.tear_down().await;
}
