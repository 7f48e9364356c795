use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use log::{debug, trace};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqliteConnection};

use super::{from_millis, opt_from_millis, parse_decimal, parse_field, to_millis};
use crate::{
    db_types::{Chain, NewOrder, Order, OrderId, OrderStatusType, Settlement},
    traits::{OrderStats, PaymentGatewayError},
};

#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    order_id: String,
    merchant_id: Option<String>,
    amount: String,
    currency: String,
    settlement_amount: Option<String>,
    settlement_currency: Option<String>,
    chain: Option<String>,
    address: Option<String>,
    method: Option<String>,
    status: String,
    tx_hash: Option<String>,
    memo: Option<String>,
    expires_at: i64,
    paid_at: Option<i64>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<OrderRow> for Order {
    type Error = PaymentGatewayError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let settlement = match (row.settlement_amount, row.settlement_currency, row.chain, row.address, row.method) {
            (Some(amount), Some(currency), Some(chain), Some(address), Some(method)) => Some(Settlement {
                amount: parse_decimal(&amount)?,
                currency,
                chain: Chain::new(&chain),
                address,
                method: parse_field(&method)?,
            }),
            (None, None, None, None, None) => None,
            _ => {
                return Err(PaymentGatewayError::InvalidRecord(format!(
                    "Order {} has a partially populated settlement",
                    row.order_id
                )))
            },
        };
        Ok(Order {
            id: row.id,
            order_id: OrderId(row.order_id),
            merchant_id: row.merchant_id,
            amount: parse_decimal(&row.amount)?,
            currency: row.currency,
            settlement,
            status: parse_field(&row.status)?,
            tx_hash: row.tx_hash,
            memo: row.memo,
            expires_at: from_millis(row.expires_at)?,
            paid_at: opt_from_millis(row.paid_at)?,
            created_at: from_millis(row.created_at)?,
            updated_at: from_millis(row.updated_at)?,
        })
    }
}

fn into_orders(rows: Vec<OrderRow>) -> Result<Vec<Order>, PaymentGatewayError> {
    rows.into_iter().map(Order::try_from).collect()
}

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut tx` as the connection argument.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, PaymentGatewayError> {
    if fetch_order_by_order_id(&order.order_id, conn).await?.is_some() {
        return Err(PaymentGatewayError::OrderAlreadyExists(order.order_id));
    }
    let created_at = to_millis(order.created_at);
    let row: OrderRow = sqlx::query_as(
        r#"
            INSERT INTO orders (order_id, merchant_id, amount, currency, status, expires_at, created_at, updated_at)
            VALUES ($1, $2, $3, $4, 'Pending', $5, $6, $7)
            RETURNING *;
        "#,
    )
    .bind(order.order_id.as_str())
    .bind(order.merchant_id.as_deref())
    .bind(order.amount.to_string())
    .bind(order.currency.as_str())
    .bind(to_millis(order.expires_at))
    .bind(created_at)
    .bind(created_at)
    .fetch_one(&mut *conn)
    .await?;
    let order = Order::try_from(row)?;
    debug!("🗃️ Order [{}] inserted with id {}", order.order_id, order.id);
    Ok(order)
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let row: Option<OrderRow> = sqlx::query_as("SELECT * FROM orders WHERE order_id = $1")
        .bind(order_id.as_str())
        .fetch_optional(&mut *conn)
        .await?;
    row.map(Order::try_from).transpose()
}

/// Pending orders that carry a settlement and are still inside their payment window, in the order they were created.
pub async fn fetch_payable_orders(
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, PaymentGatewayError> {
    let rows: Vec<OrderRow> = sqlx::query_as(
        r#"
            SELECT * FROM orders
            WHERE status = 'Pending' AND expires_at > $1 AND settlement_amount IS NOT NULL
            ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(to_millis(now))
    .fetch_all(&mut *conn)
    .await?;
    trace!("🗃️ {} payable orders found", rows.len());
    into_orders(rows)
}

/// Works out why a conditional update on `order_id` touched no rows.
async fn diagnose_failed_transition(order_id: &OrderId, conn: &mut SqliteConnection) -> PaymentGatewayError {
    match fetch_order_by_order_id(order_id, conn).await {
        Ok(None) => PaymentGatewayError::OrderNotFound(order_id.clone()),
        Ok(Some(order)) if order.status != OrderStatusType::Pending => {
            PaymentGatewayError::OrderNotPending { order_id: order_id.clone(), status: order.status }
        },
        Ok(Some(_)) => PaymentGatewayError::SettlementAlreadySet(order_id.clone()),
        Err(e) => e,
    }
}

pub async fn set_settlement(
    order_id: &OrderId,
    settlement: &Settlement,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let row: Option<OrderRow> = sqlx::query_as(
        r#"
            UPDATE orders SET
                settlement_amount = $1,
                settlement_currency = $2,
                chain = $3,
                address = $4,
                method = $5,
                updated_at = $6
            WHERE order_id = $7 AND status = 'Pending' AND settlement_amount IS NULL
            RETURNING *;
        "#,
    )
    .bind(settlement.amount.to_string())
    .bind(settlement.currency.as_str())
    .bind(settlement.chain.as_str())
    .bind(settlement.address.as_str())
    .bind(settlement.method.to_string())
    .bind(to_millis(now))
    .bind(order_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    match row {
        Some(row) => Order::try_from(row),
        None => Err(diagnose_failed_transition(order_id, conn).await),
    }
}

/// Moves the order to `Paid` if, and only if, it is still `Pending`. Returns `None` if no row was updated.
pub async fn mark_paid(
    order_id: &OrderId,
    tx_hash: &str,
    paid_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, PaymentGatewayError> {
    let paid_at = to_millis(paid_at);
    let row: Option<OrderRow> = sqlx::query_as(
        r#"
            UPDATE orders SET status = 'Paid', tx_hash = $1, paid_at = $2, updated_at = $3
            WHERE order_id = $4 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(tx_hash)
    .bind(paid_at)
    .bind(paid_at)
    .bind(order_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    row.map(Order::try_from).transpose()
}

pub async fn mark_failed(
    order_id: &OrderId,
    reason: &str,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Order, PaymentGatewayError> {
    let row: Option<OrderRow> = sqlx::query_as(
        r#"
            UPDATE orders SET status = 'Failed', memo = $1, updated_at = $2
            WHERE order_id = $3 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(reason)
    .bind(to_millis(now))
    .bind(order_id.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    match row {
        Some(row) => Order::try_from(row),
        None => Err(diagnose_failed_transition(order_id, conn).await),
    }
}

pub async fn expire_orders(now: DateTime<Utc>, conn: &mut SqliteConnection) -> Result<Vec<Order>, PaymentGatewayError> {
    let now = to_millis(now);
    let rows: Vec<OrderRow> = sqlx::query_as(
        r#"
            UPDATE orders SET status = 'Expired', updated_at = $1
            WHERE status = 'Pending' AND expires_at <= $2
            RETURNING *;
        "#,
    )
    .bind(now)
    .bind(now)
    .fetch_all(&mut *conn)
    .await?;
    into_orders(rows)
}

pub async fn order_stats(conn: &mut SqliteConnection) -> Result<OrderStats, PaymentGatewayError> {
    let counts: Vec<(String, i64)> = sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status")
        .fetch_all(&mut *conn)
        .await?;
    let mut stats = OrderStats::default();
    for (status, count) in counts {
        match parse_field::<OrderStatusType>(&status)? {
            OrderStatusType::Pending => stats.pending = count,
            OrderStatusType::Paid => stats.paid = count,
            OrderStatusType::Expired => stats.expired = count,
            OrderStatusType::Failed => stats.failed = count,
        }
    }
    // Amounts are TEXT, so the volume is summed here rather than in SQL, where it would be coerced to a float.
    let paid: Vec<(String, String)> =
        sqlx::query_as("SELECT currency, amount FROM orders WHERE status = 'Paid'").fetch_all(&mut *conn).await?;
    let mut volume = BTreeMap::<String, Decimal>::new();
    for (currency, amount) in paid {
        *volume.entry(currency).or_default() += parse_decimal(&amount)?;
    }
    stats.paid_volume = volume.into_iter().collect();
    Ok(stats)
}
