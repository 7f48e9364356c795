use hpg_common::Secret;
use sqlx::{FromRow, SqliteConnection};

use super::parse_field;
use crate::{
    db_types::{Chain, SourceConfig},
    traits::PaymentGatewayError,
};

#[derive(Debug, FromRow)]
struct SourceConfigRow {
    chain: String,
    kind: String,
    provider: String,
    endpoint: String,
    api_key: String,
    api_secret: String,
    passphrase: String,
    enabled: bool,
}

impl TryFrom<SourceConfigRow> for SourceConfig {
    type Error = PaymentGatewayError;

    fn try_from(row: SourceConfigRow) -> Result<Self, Self::Error> {
        Ok(SourceConfig {
            chain: Chain::new(&row.chain),
            kind: parse_field(&row.kind)?,
            provider: row.provider.trim().to_ascii_lowercase(),
            endpoint: row.endpoint,
            api_key: Secret::new(row.api_key),
            api_secret: Secret::new(row.api_secret),
            passphrase: Secret::new(row.passphrase),
            enabled: row.enabled,
        })
    }
}

pub async fn fetch_enabled(conn: &mut SqliteConnection) -> Result<Vec<SourceConfig>, PaymentGatewayError> {
    let rows: Vec<SourceConfigRow> =
        sqlx::query_as("SELECT * FROM source_configs WHERE enabled = 1 ORDER BY chain").fetch_all(&mut *conn).await?;
    rows.into_iter().map(SourceConfig::try_from).collect()
}

pub async fn upsert(config: &SourceConfig, conn: &mut SqliteConnection) -> Result<(), PaymentGatewayError> {
    sqlx::query(
        r#"
            INSERT INTO source_configs (chain, kind, provider, endpoint, api_key, api_secret, passphrase, enabled)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (chain) DO UPDATE SET
                kind = excluded.kind,
                provider = excluded.provider,
                endpoint = excluded.endpoint,
                api_key = excluded.api_key,
                api_secret = excluded.api_secret,
                passphrase = excluded.passphrase,
                enabled = excluded.enabled
        "#,
    )
    .bind(config.chain.as_str())
    .bind(config.kind.to_string())
    .bind(config.provider.trim().to_ascii_lowercase())
    .bind(config.endpoint.as_str())
    .bind(config.api_key.reveal().as_str())
    .bind(config.api_secret.reveal().as_str())
    .bind(config.passphrase.reveal().as_str())
    .bind(config.enabled)
    .execute(&mut *conn)
    .await?;
    Ok(())
}
