use chrono::{DateTime, Utc};
use log::trace;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::to_millis;
use crate::{
    db_types::{Chain, OrderId, PaymentProof},
    traits::PaymentGatewayError,
};

/// Returns the order that the transfer `tx_hash` on `chain` has already settled, if any.
pub async fn claimed_by(
    chain: &Chain,
    tx_hash: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<OrderId>, PaymentGatewayError> {
    let order_id: Option<(String,)> = sqlx::query_as("SELECT order_id FROM transfers WHERE chain = $1 AND tx_hash = $2")
        .bind(chain.as_str())
        .bind(tx_hash)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(order_id.map(|(id,)| OrderId(id)))
}

pub async fn fetch_claimed(
    chain: &Chain,
    hashes: &[String],
    conn: &mut SqliteConnection,
) -> Result<Vec<String>, PaymentGatewayError> {
    if hashes.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT tx_hash FROM transfers WHERE chain = ");
    builder.push_bind(chain.as_str());
    builder.push(" AND tx_hash IN (");
    let mut list = builder.separated(", ");
    for hash in hashes {
        list.push_bind(hash.as_str());
    }
    list.push_unseparated(")");
    trace!("🗃️ Executing query: {}", builder.sql());
    let claimed: Vec<(String,)> = builder.build_query_as::<(String,)>().fetch_all(&mut *conn).await?;
    Ok(claimed.into_iter().map(|(h,)| h).collect())
}

/// Records the proof that settled `order_id`. The `(chain, tx_hash)` pair is unique, so a second attempt to use the
/// same transfer fails with [`PaymentGatewayError::TransferAlreadyClaimed`].
pub async fn insert_settling_transfer(
    chain: &Chain,
    order_id: &OrderId,
    proof: &PaymentProof,
    now: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), PaymentGatewayError> {
    let query = match proof {
        PaymentProof::Transfer { transfer, .. } => sqlx::query(
            r#"
                INSERT INTO transfers (chain, tx_hash, order_id, from_address, to_address, amount, currency,
                    block_number, observed_at, source, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'Matched', $10)
            "#,
        )
        .bind(chain.as_str())
        .bind(transfer.hash.as_str())
        .bind(order_id.as_str())
        .bind(transfer.from.as_str())
        .bind(transfer.to.as_str())
        .bind(transfer.amount.to_string())
        .bind(transfer.currency.as_str())
        .bind(transfer.block_number.and_then(|b| i64::try_from(b).ok()))
        .bind(to_millis(transfer.timestamp))
        .bind(to_millis(now)),
        PaymentProof::Manual { tx_hash, reviewer } => sqlx::query(
            r#"
                INSERT INTO transfers (chain, tx_hash, order_id, source, reviewer, created_at)
                VALUES ($1, $2, $3, 'Manual', $4, $5)
            "#,
        )
        .bind(chain.as_str())
        .bind(tx_hash.as_str())
        .bind(order_id.as_str())
        .bind(reviewer.as_str())
        .bind(to_millis(now)),
    };
    match query.execute(&mut *conn).await {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            let claimed_by = claimed_by(chain, proof.tx_hash(), conn).await?.unwrap_or_else(|| order_id.clone());
            Err(PaymentGatewayError::TransferAlreadyClaimed { tx_hash: proof.tx_hash().to_string(), claimed_by })
        },
        Err(e) => Err(e.into()),
    }
}
