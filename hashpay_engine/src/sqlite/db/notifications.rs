use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection};

use super::{from_millis, opt_from_millis, parse_field, to_millis};
use crate::{
    db_types::{NewNotification, Notification, NotificationUpdate, OrderId},
    traits::PaymentGatewayError,
};

#[derive(Debug, FromRow)]
struct NotificationRow {
    id: i64,
    order_id: String,
    kind: String,
    target: String,
    payload: String,
    status: String,
    retry_count: i64,
    next_retry: Option<i64>,
    last_error: Option<String>,
    created_at: i64,
    sent_at: Option<i64>,
}

impl TryFrom<NotificationRow> for Notification {
    type Error = PaymentGatewayError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(Notification {
            id: row.id,
            order_id: OrderId(row.order_id),
            kind: parse_field(&row.kind)?,
            target: row.target,
            payload: row.payload,
            status: parse_field(&row.status)?,
            retry_count: row.retry_count,
            next_retry: opt_from_millis(row.next_retry)?,
            last_error: row.last_error,
            created_at: from_millis(row.created_at)?,
            sent_at: opt_from_millis(row.sent_at)?,
        })
    }
}

fn into_notifications(rows: Vec<NotificationRow>) -> Result<Vec<Notification>, PaymentGatewayError> {
    rows.into_iter().map(Notification::try_from).collect()
}

pub async fn insert_notification(
    notification: NewNotification,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Notification, PaymentGatewayError> {
    let row: NotificationRow = sqlx::query_as(
        r#"
            INSERT INTO notifications (order_id, kind, target, payload, status, retry_count, next_retry, created_at)
            VALUES ($1, $2, $3, $4, 'Pending', 0, $5, $6)
            RETURNING *;
        "#,
    )
    .bind(notification.order_id.as_str())
    .bind(notification.kind.to_string())
    .bind(notification.target.as_str())
    .bind(notification.payload.as_str())
    .bind(to_millis(notification.next_retry))
    .bind(to_millis(now))
    .fetch_one(&mut *conn)
    .await?;
    Notification::try_from(row)
}

pub async fn fetch_due(
    now: DateTime<Utc>,
    limit: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Notification>, PaymentGatewayError> {
    let rows: Vec<NotificationRow> = sqlx::query_as(
        r#"
            SELECT * FROM notifications
            WHERE status = 'Pending' AND next_retry <= $1
            ORDER BY next_retry ASC, id ASC
            LIMIT $2
        "#,
    )
    .bind(to_millis(now))
    .bind(limit)
    .fetch_all(&mut *conn)
    .await?;
    into_notifications(rows)
}

pub async fn fetch_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<Notification>, PaymentGatewayError> {
    let rows: Vec<NotificationRow> = sqlx::query_as("SELECT * FROM notifications WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(&mut *conn)
        .await?;
    into_notifications(rows)
}

pub async fn update_notification(
    id: i64,
    update: NotificationUpdate,
    conn: &mut SqliteConnection,
) -> Result<Notification, PaymentGatewayError> {
    let row: Option<NotificationRow> = sqlx::query_as(
        r#"
            UPDATE notifications SET status = $1, retry_count = $2, next_retry = $3, last_error = $4, sent_at = $5
            WHERE id = $6 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(update.status.to_string())
    .bind(update.retry_count)
    .bind(update.next_retry.map(to_millis))
    .bind(update.last_error.as_deref())
    .bind(update.sent_at.map(to_millis))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    match row {
        Some(row) => Notification::try_from(row),
        None => {
            let exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM notifications WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
            match exists {
                None => Err(PaymentGatewayError::NotificationNotFound(id)),
                Some(_) => Err(PaymentGatewayError::NotificationClosed(id)),
            }
        },
    }
}
