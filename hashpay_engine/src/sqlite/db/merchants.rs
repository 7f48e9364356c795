use hpg_common::Secret;
use sqlx::{FromRow, SqliteConnection};

use crate::{db_types::Merchant, traits::PaymentGatewayError};

#[derive(Debug, FromRow)]
struct MerchantRow {
    id: String,
    name: String,
    api_key: String,
    callback_url: Option<String>,
    notify_url: Option<String>,
}

impl From<MerchantRow> for Merchant {
    fn from(row: MerchantRow) -> Self {
        Merchant {
            id: row.id,
            name: row.name,
            api_key: Secret::new(row.api_key),
            callback_url: row.callback_url.filter(|u| !u.trim().is_empty()),
            notify_url: row.notify_url.filter(|u| !u.trim().is_empty()),
        }
    }
}

pub async fn fetch_merchant(id: &str, conn: &mut SqliteConnection) -> Result<Option<Merchant>, PaymentGatewayError> {
    let row: Option<MerchantRow> =
        sqlx::query_as("SELECT * FROM merchants WHERE id = $1").bind(id).fetch_optional(&mut *conn).await?;
    Ok(row.map(Merchant::from))
}

pub async fn upsert_merchant(merchant: &Merchant, conn: &mut SqliteConnection) -> Result<(), PaymentGatewayError> {
    sqlx::query(
        r#"
            INSERT INTO merchants (id, name, api_key, callback_url, notify_url) VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                api_key = excluded.api_key,
                callback_url = excluded.callback_url,
                notify_url = excluded.notify_url
        "#,
    )
    .bind(merchant.id.as_str())
    .bind(merchant.name.as_str())
    .bind(merchant.api_key.reveal().as_str())
    .bind(merchant.callback_url.as_deref())
    .bind(merchant.notify_url.as_deref())
    .execute(&mut *conn)
    .await?;
    Ok(())
}
