use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
    db_types::{NewNotification, Notification, NotificationUpdate, OrderId},
    traits::PaymentGatewayError,
};

/// Storage for the outbound notification queue.
pub trait NotificationManagement {
    fn insert_notification(
        &self,
        notification: NewNotification,
    ) -> impl Future<Output = Result<Notification, PaymentGatewayError>> + Send;

    /// `Pending` notifications with `next_retry <= now`, earliest first, at most `limit` of them.
    fn fetch_due_notifications(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<Notification>, PaymentGatewayError>> + Send;

    fn fetch_notifications_for_order(
        &self,
        order_id: &OrderId,
    ) -> impl Future<Output = Result<Vec<Notification>, PaymentGatewayError>> + Send;

    /// Writes back the outcome of a delivery attempt. Only `Pending` notifications can be updated; `Sent` and `Dead`
    /// are final.
    fn update_notification(
        &self,
        id: i64,
        update: NotificationUpdate,
    ) -> impl Future<Output = Result<Notification, PaymentGatewayError>> + Send;
}
