//! Notification delivery.
//!
//! Notifications are written to storage first and delivered later by [`NotificationApi::process_due`], which the
//! server calls on a timer. Nothing is sent inline, so a slow or broken receiver can never hold up order processing.
//!
//! A failed attempt is rescheduled with a linear backoff (see [`RetryPolicy`]). After the maximum number of attempts
//! the notification is marked `Dead` and is never attempted again.
use std::{fmt::Debug, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use hpg_common::Secret;
use log::*;

use crate::{
    db_types::{
        NewNotification,
        Notification,
        NotificationKind,
        NotificationStatus,
        NotificationUpdate,
        Order,
        OrderId,
    },
    hpe_api::notification_objects::{
        paid_order_alert,
        CallbackPayload,
        DeliveryError,
        DeliveryReport,
        DeliveryRequest,
        NotificationDispatcher,
        RetryPolicy,
    },
    traits::{PaymentGatewayDatabase, PaymentGatewayError},
};

pub const DEFAULT_ALERT_TARGET: &str = "operators";
pub const DEFAULT_BATCH_SIZE: i64 = 50;
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// The enqueueing half of notification delivery. This is all the order ledger needs, and it is cheap to clone.
#[derive(Clone)]
pub struct NotificationQueue<B> {
    db: B,
    alert_target: String,
}

impl<B> Debug for NotificationQueue<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotificationQueue (alerts to {})", self.alert_target)
    }
}

impl<B> NotificationQueue<B> {
    pub fn new(db: B) -> Self {
        Self { db, alert_target: DEFAULT_ALERT_TARGET.to_string() }
    }

    /// Sets the target recorded on operator alerts.
    pub fn with_alert_target(mut self, target: &str) -> Self {
        self.alert_target = target.to_string();
        self
    }

    pub fn alert_target(&self) -> &str {
        self.alert_target.as_str()
    }
}

impl<B> NotificationQueue<B>
where B: PaymentGatewayDatabase
{
    /// Persists a `Pending` notification that is due immediately.
    pub async fn enqueue(
        &self,
        order_id: &OrderId,
        kind: NotificationKind,
        target: &str,
        payload: String,
    ) -> Result<Notification, PaymentGatewayError> {
        let notification = NewNotification {
            order_id: order_id.clone(),
            kind,
            target: target.to_string(),
            payload,
            next_retry: Utc::now(),
        };
        let notification = self.db.insert_notification(notification).await?;
        trace!("📨️ {kind} #{} for order [{order_id}] queued for {target}", notification.id);
        Ok(notification)
    }

    /// Queues the standard set of notifications for a freshly paid order. See [`Self::paid_order_notifications`].
    pub async fn enqueue_for_paid_order(&self, order: &Order) -> Result<Vec<Notification>, PaymentGatewayError> {
        let mut queued = Vec::with_capacity(3);
        for notification in self.paid_order_notifications(order, Utc::now()).await? {
            queued.push(self.db.insert_notification(notification).await?);
        }
        debug!("📨️ {} notifications queued for paid order [{}]", queued.len(), order.order_id);
        Ok(queued)
    }

    /// Builds, without storing them, the notifications for a paid order: an alert for the operators and, when the
    /// order belongs to a merchant, a callback and/or webhook to the URLs the merchant registered. All of them are due
    /// at `now`.
    pub async fn paid_order_notifications(
        &self,
        order: &Order,
        now: DateTime<Utc>,
    ) -> Result<Vec<NewNotification>, PaymentGatewayError> {
        let new = |kind, target: &str, payload: String| NewNotification {
            order_id: order.order_id.clone(),
            kind,
            target: target.to_string(),
            payload,
            next_retry: now,
        };
        let mut notifications = vec![new(NotificationKind::Alert, &self.alert_target, paid_order_alert(order))];
        let Some(merchant_id) = order.merchant_id.as_deref() else {
            return Ok(notifications);
        };
        let Some(merchant) = self.db.fetch_merchant(merchant_id).await? else {
            warn!("📨️ Order [{}] belongs to unknown merchant '{merchant_id}'. No callbacks queued.", order.order_id);
            return Ok(notifications);
        };
        let payload = CallbackPayload::for_order(order, now);
        let payload = serde_json::to_string(&payload).map_err(|e| {
            PaymentGatewayError::InvalidRecord(format!("Could not serialize callback for {}: {e}", order.order_id))
        })?;
        if let Some(url) = merchant.callback_url.as_deref() {
            notifications.push(new(NotificationKind::Callback, url, payload.clone()));
        }
        if let Some(url) = merchant.notify_url.as_deref() {
            notifications.push(new(NotificationKind::Webhook, url, payload));
        }
        Ok(notifications)
    }
}

/// `NotificationApi` queues notifications and delivers the ones that are due through a [`NotificationDispatcher`].
pub struct NotificationApi<B> {
    queue: NotificationQueue<B>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    policy: RetryPolicy,
    batch_size: i64,
    delivery_timeout: Duration,
}

impl<B> Debug for NotificationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NotificationApi ({:?}, batch size {})", self.policy, self.batch_size)
    }
}

impl<B> NotificationApi<B> {
    pub fn new(queue: NotificationQueue<B>, dispatcher: Arc<dyn NotificationDispatcher>) -> Self {
        Self {
            queue,
            dispatcher,
            policy: RetryPolicy::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    pub fn queue(&self) -> &NotificationQueue<B> {
        &self.queue
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

impl<B> NotificationApi<B>
where B: PaymentGatewayDatabase
{
    pub async fn enqueue(
        &self,
        order_id: &OrderId,
        kind: NotificationKind,
        target: &str,
        payload: String,
    ) -> Result<Notification, PaymentGatewayError> {
        self.queue.enqueue(order_id, kind, target, payload).await
    }

    pub async fn enqueue_for_paid_order(&self, order: &Order) -> Result<Vec<Notification>, PaymentGatewayError> {
        self.queue.enqueue_for_paid_order(order).await
    }

    /// Attempts every notification that is due now. See [`Self::process_due_at`].
    pub async fn process_due(&self) -> Result<DeliveryReport, PaymentGatewayError> {
        self.process_due_at(Utc::now()).await
    }

    /// Attempts one batch of the `Pending` notifications with `next_retry <= now`, and records the outcome of each.
    ///
    /// Only the initial fetch can fail the whole call. A failed delivery, or a failure to record its outcome, is
    /// logged and counted in the report and the rest of the batch carries on.
    pub async fn process_due_at(&self, now: DateTime<Utc>) -> Result<DeliveryReport, PaymentGatewayError> {
        let due = self.queue.db.fetch_due_notifications(now, self.batch_size).await?;
        let mut report = DeliveryReport::default();
        if due.is_empty() {
            trace!("📨️ No notifications are due");
            return Ok(report);
        }
        for notification in due {
            report.attempted += 1;
            let outcome = self.attempt(&notification).await;
            let update = self.next_state(&notification, outcome, now);
            match update.status {
                NotificationStatus::Sent => report.sent += 1,
                NotificationStatus::Dead => report.dead += 1,
                NotificationStatus::Pending => report.retried += 1,
            }
            if let Err(e) = self.queue.db.update_notification(notification.id, update).await {
                error!("📨️ Could not record the delivery outcome of notification #{}: {e}", notification.id);
                report.storage_errors += 1;
            }
        }
        debug!(
            "📨️ Delivery pass complete: {} attempted, {} sent, {} to retry, {} dead",
            report.attempted, report.sent, report.retried, report.dead
        );
        Ok(report)
    }

    async fn attempt(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let api_key = match notification.kind {
            NotificationKind::Alert => None,
            NotificationKind::Callback | NotificationKind::Webhook => self.merchant_api_key(&notification.order_id).await,
        };
        let request = DeliveryRequest::new(notification, api_key);
        match tokio::time::timeout(self.delivery_timeout, self.dispatcher.deliver(&request)).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.delivery_timeout)),
        }
    }

    fn next_state(
        &self,
        notification: &Notification,
        outcome: Result<(), DeliveryError>,
        now: DateTime<Utc>,
    ) -> NotificationUpdate {
        match outcome {
            Ok(()) => {
                info!("📨️ {} #{} for order [{}] delivered", notification.kind, notification.id, notification.order_id);
                NotificationUpdate {
                    status: NotificationStatus::Sent,
                    retry_count: notification.retry_count,
                    next_retry: None,
                    last_error: None,
                    sent_at: Some(now),
                }
            },
            Err(e) => {
                let retry_count = notification.retry_count + 1;
                if self.policy.is_exhausted(retry_count) {
                    warn!(
                        "📨️ {} #{} for order [{}] failed {retry_count} times and has been abandoned. Last error: {e}",
                        notification.kind, notification.id, notification.order_id
                    );
                    NotificationUpdate {
                        status: NotificationStatus::Dead,
                        retry_count,
                        next_retry: None,
                        last_error: Some(e.to_string()),
                        sent_at: None,
                    }
                } else {
                    let next_retry = self.policy.next_retry(now, retry_count);
                    warn!(
                        "📨️ {} #{} for order [{}] failed (attempt {retry_count}): {e}. Retrying at {next_retry}",
                        notification.kind, notification.id, notification.order_id
                    );
                    NotificationUpdate {
                        status: NotificationStatus::Pending,
                        retry_count,
                        next_retry: Some(next_retry),
                        last_error: Some(e.to_string()),
                        sent_at: None,
                    }
                }
            },
        }
    }

    /// The API key of the merchant that owns the order, if there is one. Lookup failures are logged and the delivery
    /// goes ahead without a key.
    async fn merchant_api_key(&self, order_id: &OrderId) -> Option<Secret<String>> {
        let db = &self.queue.db;
        let merchant_id = match db.fetch_order_by_order_id(order_id).await {
            Ok(order) => order.and_then(|o| o.merchant_id)?,
            Err(e) => {
                warn!("📨️ Could not look up order [{order_id}] for its merchant: {e}");
                return None;
            },
        };
        match db.fetch_merchant(&merchant_id).await {
            Ok(merchant) => merchant.map(|m| m.api_key),
            Err(e) => {
                warn!("📨️ Could not look up merchant '{merchant_id}': {e}");
                None
            },
        }
    }
}
