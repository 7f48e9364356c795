//! `SqliteDatabase` is a concrete implementation of a HashPay engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module. Multi-statement writes run inside a single transaction.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::{migrate, SqlitePool};

use super::{
    db::{db_url, merchants, new_pool, notifications, orders, source_configs, transfers},
    SqliteDatabaseError,
};
use crate::{
    db_types::{
        Chain,
        Merchant,
        NewNotification,
        NewOrder,
        Notification,
        NotificationUpdate,
        Order,
        OrderId,
        OrderStatusType,
        PaymentProof,
        Settlement,
        SourceConfig,
    },
    traits::{
        ConfirmOutcome,
        MerchantManagement,
        NotificationManagement,
        OrderManagement,
        OrderStats,
        PaymentGatewayDatabase,
        PaymentGatewayError,
        SourceConfigManagement,
    },
};

/// Manual confirmations for orders without a settlement are recorded against this pseudo-chain.
pub const MANUAL_CHAIN: &str = "MANUAL";

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object, using the URL in `HP_DATABASE_URL`.
    pub async fn new(max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date with the embedded migrations.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order_by_order_id(&self, order_id: &OrderId) -> Result<Option<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_order_id(order_id, &mut conn).await
    }

    async fn fetch_payable_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_payable_orders(now, &mut conn).await
    }

    async fn set_settlement(
        &self,
        order_id: &OrderId,
        settlement: &Settlement,
        now: DateTime<Utc>,
    ) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::set_settlement(order_id, settlement, now, &mut tx).await?;
        tx.commit().await?;
        debug!(
            "🗃️ Order [{order_id}] will be settled with {} {} on {}",
            settlement.amount, settlement.currency, settlement.chain
        );
        Ok(order)
    }

    async fn mark_order_paid(
        &self,
        order_id: &OrderId,
        proof: &PaymentProof,
        paid_at: DateTime<Utc>,
        notifications: &[NewNotification],
    ) -> Result<ConfirmOutcome, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        // Writing first makes the transaction take the write lock up front. A deferred transaction that reads first
        // fails with SQLITE_BUSY, rather than waiting, if another connection commits in between.
        let paid = match orders::mark_paid(order_id, proof.tx_hash(), paid_at, &mut tx).await? {
            Some(order) => order,
            None => {
                let order = orders::fetch_order_by_order_id(order_id, &mut tx)
                    .await?
                    .ok_or_else(|| PaymentGatewayError::OrderNotFound(order_id.clone()))?;
                return match order.status {
                    OrderStatusType::Paid => {
                        trace!("🗃️ Order [{order_id}] is already paid. Nothing to do.");
                        Ok(ConfirmOutcome::AlreadyPaid(order))
                    },
                    status => Err(PaymentGatewayError::OrderNotPending { order_id: order_id.clone(), status }),
                };
            },
        };
        let chain = match proof {
            PaymentProof::Transfer { chain, .. } => chain.clone(),
            PaymentProof::Manual { .. } => {
                paid.settlement.as_ref().map(|s| s.chain.clone()).unwrap_or_else(|| Chain::new(MANUAL_CHAIN))
            },
        };
        // Dropping the transaction on the early return rolls back the status change
        if let Some(claimed_by) = transfers::claimed_by(&chain, proof.tx_hash(), &mut tx).await? {
            return Err(PaymentGatewayError::TransferAlreadyClaimed { tx_hash: proof.tx_hash().to_string(), claimed_by });
        }
        transfers::insert_settling_transfer(&chain, order_id, proof, paid_at, &mut tx).await?;
        for notification in notifications {
            notifications::insert_notification(notification.clone(), paid_at, &mut tx).await?;
        }
        tx.commit().await?;
        debug!(
            "🗃️ Order [{order_id}] marked as paid by {} on {chain}. {} notifications queued.",
            proof.tx_hash(),
            notifications.len()
        );
        Ok(ConfirmOutcome::Confirmed(paid))
    }

    async fn mark_order_failed(
        &self,
        order_id: &OrderId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Order, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::mark_failed(order_id, reason, now, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn expire_orders(&self, now: DateTime<Utc>) -> Result<Vec<Order>, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let expired = orders::expire_orders(now, &mut tx).await?;
        tx.commit().await?;
        if !expired.is_empty() {
            debug!("🗃️ {} orders expired", expired.len());
        }
        Ok(expired)
    }

    async fn fetch_claimed_transfers(
        &self,
        chain: &Chain,
        hashes: &[String],
    ) -> Result<Vec<String>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        transfers::fetch_claimed(chain, hashes, &mut conn).await
    }

    async fn fetch_order_stats(&self) -> Result<OrderStats, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        orders::order_stats(&mut conn).await
    }
}

impl NotificationManagement for SqliteDatabase {
    async fn insert_notification(&self, notification: NewNotification) -> Result<Notification, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let notification = notifications::insert_notification(notification, Utc::now(), &mut tx).await?;
        tx.commit().await?;
        Ok(notification)
    }

    async fn fetch_due_notifications(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Notification>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        notifications::fetch_due(now, limit, &mut conn).await
    }

    async fn fetch_notifications_for_order(&self, order_id: &OrderId) -> Result<Vec<Notification>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        notifications::fetch_for_order(order_id, &mut conn).await
    }

    async fn update_notification(
        &self,
        id: i64,
        update: NotificationUpdate,
    ) -> Result<Notification, PaymentGatewayError> {
        let mut tx = self.pool.begin().await?;
        let notification = notifications::update_notification(id, update, &mut tx).await?;
        tx.commit().await?;
        Ok(notification)
    }
}

impl MerchantManagement for SqliteDatabase {
    async fn fetch_merchant(&self, id: &str) -> Result<Option<Merchant>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        merchants::fetch_merchant(id, &mut conn).await
    }

    async fn upsert_merchant(&self, merchant: &Merchant) -> Result<(), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        merchants::upsert_merchant(merchant, &mut conn).await
    }
}

impl SourceConfigManagement for SqliteDatabase {
    async fn fetch_source_configs(&self) -> Result<Vec<SourceConfig>, PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        source_configs::fetch_enabled(&mut conn).await
    }

    async fn upsert_source_config(&self, config: &SourceConfig) -> Result<(), PaymentGatewayError> {
        let mut conn = self.pool.acquire().await?;
        source_configs::upsert(config, &mut conn).await
    }
}

impl PaymentGatewayDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&self) -> Result<(), PaymentGatewayError> {
        self.pool.close().await;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use chrono::Duration;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::{
        db_types::{NotificationKind, NotificationStatus, PaymentMethod, SourceKind, Transfer, TransferStatus},
        test_utils::prepare_env::{prepare_test_env, random_db_path},
    };

    async fn new_db() -> SqliteDatabase {
        let url = random_db_path();
        prepare_test_env(&url).await
    }

    fn settlement(address: &str) -> Settlement {
        Settlement {
            amount: dec!(13.888889),
            currency: "USDT".into(),
            chain: Chain::new("TRON"),
            address: address.into(),
            method: PaymentMethod::Blockchain,
        }
    }

    fn transfer(hash: &str, to: &str) -> Transfer {
        Transfer {
            hash: hash.into(),
            from: "TSender".into(),
            to: to.into(),
            amount: dec!(13.89),
            currency: "USDT".into(),
            block_number: Some(42),
            timestamp: Utc::now(),
            status: TransferStatus::Confirmed,
        }
    }

    fn callback(order_id: &OrderId, now: DateTime<Utc>) -> NewNotification {
        NewNotification {
            order_id: order_id.clone(),
            kind: NotificationKind::Callback,
            target: "https://shop.example/cb".into(),
            payload: "{}".into(),
            next_retry: now,
        }
    }

    async fn pending_order(db: &SqliteDatabase, address: &str) -> Order {
        let now = Utc::now();
        let order = db.insert_order(NewOrder::new(dec!(100), "cny", now, now + Duration::minutes(30))).await.unwrap();
        db.set_settlement(&order.order_id, &settlement(address), now).await.unwrap()
    }

    #[tokio::test]
    async fn insert_and_fetch_order() {
        let db = new_db().await;
        let now = Utc::now();
        let new_order = NewOrder::new(dec!(100.50), "cny", now, now + Duration::minutes(30)).with_merchant("shop1");
        let order = db.insert_order(new_order.clone()).await.unwrap();
        assert_eq!(order.status, OrderStatusType::Pending);
        assert_eq!(order.amount, dec!(100.50));
        assert_eq!(order.currency, "CNY");
        assert_eq!(order.merchant_id.as_deref(), Some("shop1"));
        assert!(order.settlement.is_none());
        let fetched = db.fetch_order_by_order_id(&order.order_id).await.unwrap().unwrap();
        assert_eq!(fetched, order);
        let err = db.insert_order(new_order).await.unwrap_err();
        assert!(matches!(err, PaymentGatewayError::OrderAlreadyExists(_)));
        assert!(db.fetch_order_by_order_id(&OrderId::from("PAYnope")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn settlement_can_only_be_set_once() {
        let db = new_db().await;
        let order = pending_order(&db, "TAddr1").await;
        assert_eq!(order.settlement, Some(settlement("TAddr1")));
        let err = db.set_settlement(&order.order_id, &settlement("TAddr2"), Utc::now()).await.unwrap_err();
        assert!(matches!(err, PaymentGatewayError::SettlementAlreadySet(_)));
        let err = db.set_settlement(&OrderId::from("PAYmissing"), &settlement("TAddr2"), Utc::now()).await.unwrap_err();
        assert!(matches!(err, PaymentGatewayError::OrderNotFound(_)));
    }

    #[tokio::test]
    async fn payable_orders_exclude_expired_and_unselected() {
        let db = new_db().await;
        let now = Utc::now();
        let live = pending_order(&db, "TAddr1").await;
        let _no_method = db.insert_order(NewOrder::new(dec!(5), "CNY", now, now + Duration::minutes(30))).await.unwrap();
        let stale = db.insert_order(NewOrder::new(dec!(5), "CNY", now, now - Duration::seconds(1))).await.unwrap();
        db.set_settlement(&stale.order_id, &settlement("TAddr1"), now).await.unwrap();
        let payable = db.fetch_payable_orders(now).await.unwrap();
        assert_eq!(payable.len(), 1);
        assert_eq!(payable[0].order_id, live.order_id);
    }

    #[tokio::test]
    async fn paying_an_order_is_idempotent() {
        let db = new_db().await;
        let order = pending_order(&db, "TAddr1").await;
        let proof = PaymentProof::Transfer { chain: Chain::new("TRON"), transfer: transfer("0xhash1", "TAddr1") };
        let paid_at = Utc::now();
        let result = db.mark_order_paid(&order.order_id, &proof, paid_at, &[]).await.unwrap();
        assert!(result.is_new());
        let paid = result.into_order();
        assert_eq!(paid.status, OrderStatusType::Paid);
        assert_eq!(paid.tx_hash.as_deref(), Some("0xhash1"));
        assert_eq!(paid.paid_at.map(|t| t.timestamp_millis()), Some(paid_at.timestamp_millis()));

        let again = db.mark_order_paid(&order.order_id, &proof, Utc::now(), &[]).await.unwrap();
        assert!(!again.is_new());
        assert_eq!(again.order().paid_at, paid.paid_at);
    }

    #[tokio::test]
    async fn writes_are_visible_to_other_connections() {
        let db = new_db().await;
        let other = SqliteDatabase::new_with_url(db.url(), 1).await.unwrap();
        let now = Utc::now();
        let order = db.insert_order(NewOrder::new(dec!(7), "CNY", now, now + Duration::minutes(30))).await.unwrap();
        let seen = other.fetch_order_by_order_id(&order.order_id).await.unwrap();
        assert_eq!(seen, Some(order.clone()));

        let n = db.insert_notification(callback(&order.order_id, now)).await.unwrap();
        let seen = other.fetch_notifications_for_order(&order.order_id).await.unwrap();
        assert_eq!(seen.len(), 1);
        let update = NotificationUpdate {
            status: NotificationStatus::Sent,
            retry_count: 0,
            next_retry: None,
            last_error: None,
            sent_at: Some(now),
        };
        db.update_notification(n.id, update).await.unwrap();
        let seen = other.fetch_notifications_for_order(&order.order_id).await.unwrap();
        assert_eq!(seen[0].status, NotificationStatus::Sent);
        assert!(other.fetch_due_notifications(now, 10).await.unwrap().is_empty());
        other.close().await.unwrap();
    }

    #[tokio::test]
    async fn notifications_are_queued_with_the_payment() {
        let db = new_db().await;
        let now = Utc::now();
        let order = pending_order(&db, "TAddr1").await;
        let proof = PaymentProof::Transfer { chain: Chain::new("TRON"), transfer: transfer("0xn1", "TAddr1") };
        db.mark_order_paid(&order.order_id, &proof, now, &[callback(&order.order_id, now)]).await.unwrap();
        let queued = db.fetch_notifications_for_order(&order.order_id).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].status, NotificationStatus::Pending);

        // A failure to queue rolls the whole payment back
        let order = pending_order(&db, "TAddr1").await;
        sqlx::query("DROP TABLE notifications").execute(db.pool()).await.unwrap();
        let proof = PaymentProof::Transfer { chain: Chain::new("TRON"), transfer: transfer("0xn2", "TAddr1") };
        let result = db.mark_order_paid(&order.order_id, &proof, now, &[callback(&order.order_id, now)]).await;
        assert!(result.is_err());
        let order = db.fetch_order_by_order_id(&order.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatusType::Pending);
        assert!(order.tx_hash.is_none());
        assert!(db.fetch_claimed_transfers(&Chain::new("TRON"), &["0xn2".to_string()]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn a_transfer_settles_at_most_one_order() {
        let db = new_db().await;
        let first = pending_order(&db, "TAddr1").await;
        let second = pending_order(&db, "TAddr1").await;
        let proof = PaymentProof::Transfer { chain: Chain::new("TRON"), transfer: transfer("0xdup", "TAddr1") };
        db.mark_order_paid(&first.order_id, &proof, Utc::now(), &[]).await.unwrap();
        let err = db.mark_order_paid(&second.order_id, &proof, Utc::now(), &[]).await.unwrap_err();
        match err {
            PaymentGatewayError::TransferAlreadyClaimed { tx_hash, claimed_by } => {
                assert_eq!(tx_hash, "0xdup");
                assert_eq!(claimed_by, first.order_id);
            },
            e => panic!("Unexpected error: {e}"),
        }
        let second = db.fetch_order_by_order_id(&second.order_id).await.unwrap().unwrap();
        assert_eq!(second.status, OrderStatusType::Pending);
        let claimed = db
            .fetch_claimed_transfers(&Chain::new("TRON"), &["0xdup".to_string(), "0xother".to_string()])
            .await
            .unwrap();
        assert_eq!(claimed, vec!["0xdup".to_string()]);
        assert!(db.fetch_claimed_transfers(&Chain::new("BSC"), &["0xdup".to_string()]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn terminal_orders_never_change() {
        let db = new_db().await;
        let now = Utc::now();
        let order = pending_order(&db, "TAddr1").await;
        let failed = db.mark_order_failed(&order.order_id, "Fraud suspected", now).await.unwrap();
        assert_eq!(failed.status, OrderStatusType::Failed);
        assert_eq!(failed.memo.as_deref(), Some("Fraud suspected"));

        let proof = PaymentProof::Manual { tx_hash: "0xmanual".into(), reviewer: "alice".into() };
        let err = db.mark_order_paid(&order.order_id, &proof, now, &[]).await.unwrap_err();
        assert!(matches!(err, PaymentGatewayError::OrderNotPending { status: OrderStatusType::Failed, .. }));
        let err = db.mark_order_failed(&order.order_id, "again", now).await.unwrap_err();
        assert!(matches!(err, PaymentGatewayError::OrderNotPending { .. }));
        assert!(db.expire_orders(now + Duration::hours(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn expiry_sweep_only_touches_overdue_pending_orders() {
        let db = new_db().await;
        let now = Utc::now();
        let overdue = db.insert_order(NewOrder::new(dec!(1), "CNY", now, now - Duration::seconds(1))).await.unwrap();
        let live = db.insert_order(NewOrder::new(dec!(1), "CNY", now, now + Duration::minutes(5))).await.unwrap();
        let expired = db.expire_orders(now).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].order_id, overdue.order_id);
        assert_eq!(expired[0].status, OrderStatusType::Expired);
        let live = db.fetch_order_by_order_id(&live.order_id).await.unwrap().unwrap();
        assert_eq!(live.status, OrderStatusType::Pending);
        assert!(db.expire_orders(now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn order_stats() {
        let db = new_db().await;
        let now = Utc::now();
        let a = pending_order(&db, "TAddr1").await;
        let _b = pending_order(&db, "TAddr1").await;
        let proof = PaymentProof::Manual { tx_hash: "0xm".into(), reviewer: "bob".into() };
        db.mark_order_paid(&a.order_id, &proof, now, &[]).await.unwrap();
        let stats = db.fetch_order_stats().await.unwrap();
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.paid, 1);
        assert_eq!(stats.total(), 2);
        assert_eq!(stats.paid_volume, vec![("CNY".to_string(), dec!(100))]);
    }

    #[tokio::test]
    async fn notification_queue_lifecycle() {
        let db = new_db().await;
        let now = Utc::now();
        let order = pending_order(&db, "TAddr1").await;
        let n = db
            .insert_notification(NewNotification {
                order_id: order.order_id.clone(),
                kind: NotificationKind::Callback,
                target: "https://shop.example/cb".into(),
                payload: "{}".into(),
                next_retry: now,
            })
            .await
            .unwrap();
        assert_eq!(n.status, NotificationStatus::Pending);
        assert_eq!(n.retry_count, 0);
        assert_eq!(db.fetch_due_notifications(now, 10).await.unwrap().len(), 1);
        assert!(db.fetch_due_notifications(now - Duration::seconds(1), 10).await.unwrap().is_empty());

        let retry_at = now + Duration::seconds(300);
        let update = NotificationUpdate {
            status: NotificationStatus::Pending,
            retry_count: 1,
            next_retry: Some(retry_at),
            last_error: Some("HTTP 500".into()),
            sent_at: None,
        };
        let n = db.update_notification(n.id, update).await.unwrap();
        assert_eq!(n.retry_count, 1);
        assert!(db.fetch_due_notifications(now, 10).await.unwrap().is_empty());
        assert_eq!(db.fetch_due_notifications(retry_at, 10).await.unwrap().len(), 1);

        let sent = NotificationUpdate {
            status: NotificationStatus::Sent,
            retry_count: 1,
            next_retry: None,
            last_error: None,
            sent_at: Some(retry_at),
        };
        let n = db.update_notification(n.id, sent.clone()).await.unwrap();
        assert_eq!(n.status, NotificationStatus::Sent);
        let err = db.update_notification(n.id, sent.clone()).await.unwrap_err();
        assert!(matches!(err, PaymentGatewayError::NotificationClosed(_)));
        let err = db.update_notification(9999, sent).await.unwrap_err();
        assert!(matches!(err, PaymentGatewayError::NotificationNotFound(9999)));
        assert_eq!(db.fetch_notifications_for_order(&order.order_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn merchants_and_source_configs() {
        let db = new_db().await;
        let merchant = Merchant {
            id: "shop1".into(),
            name: "Shop One".into(),
            api_key: "key-1".into(),
            callback_url: Some("https://shop.example/cb".into()),
            notify_url: None,
        };
        db.upsert_merchant(&merchant).await.unwrap();
        assert_eq!(db.fetch_merchant("shop1").await.unwrap(), Some(merchant.clone()));
        let renamed = Merchant { name: "Shop 1".into(), ..merchant };
        db.upsert_merchant(&renamed).await.unwrap();
        assert_eq!(db.fetch_merchant("shop1").await.unwrap().unwrap().name, "Shop 1");
        assert!(db.fetch_merchant("shop2").await.unwrap().is_none());

        sqlx::query(
            "INSERT INTO source_configs (chain, kind, provider, endpoint, api_key, enabled) VALUES ('tron', 'Chain', \
             'TronGrid', 'https://api.trongrid.io', 'k', 1), ('OKX', 'Exchange', 'okx', '', '', 0)",
        )
        .execute(db.pool())
        .await
        .unwrap();
        let configs = db.fetch_source_configs().await.unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].chain, Chain::new("TRON"));
        assert_eq!(configs[0].provider, "trongrid");
        assert_eq!(configs[0].api_key.reveal(), "k");

        let mut okx = configs[0].clone();
        okx.chain = Chain::new("OKX");
        okx.kind = SourceKind::Exchange;
        okx.provider = "OKX".into();
        db.upsert_source_config(&okx).await.unwrap();
        let configs = db.fetch_source_configs().await.unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].chain, Chain::new("OKX"));
        assert_eq!(configs[0].kind, SourceKind::Exchange);
        assert_eq!(configs[0].provider, "okx");
    }
}
