//! # Settings Repository
//!
//! Store-wide key/value settings.
//!
//! ```text
//! key               value (TEXT)
//! ───────────────   ─────────────────────────────────────────
//! exchange_rate     scaled integer, 4 decimals (700000 = 70)
//! tax_rate_bps      integer basis points
//! store_name        free text
//! admin_key_hash    argon2 PHC string
//! ```

use chrono::Utc;
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::credentials::{hash_secret, verify_secret};
use crate::error::{DbError, DbResult};
use crate::repository::audit::{self, AuditEntry};
use dukan_core::{AuditAction, ExchangeRate, StoreSettings, TaxRate, DEFAULT_EXCHANGE_RATE};

pub const KEY_EXCHANGE_RATE: &str = "exchange_rate";
pub const KEY_TAX_RATE: &str = "tax_rate_bps";
pub const KEY_STORE_NAME: &str = "store_name";
pub const KEY_ADMIN_KEY_HASH: &str = "admin_key_hash";

const DEFAULT_STORE_NAME: &str = "Dukan";

pub(crate) async fn read(conn: &mut SqliteConnection, key: &str) -> DbResult<Option<String>> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?1")
        .bind(key)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(value)
}

pub(crate) async fn write(conn: &mut SqliteConnection, key: &str, value: &str) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// The current exchange rate, or the default when none was ever set.
pub(crate) async fn exchange_rate(conn: &mut SqliteConnection) -> DbResult<ExchangeRate> {
    match read(conn, KEY_EXCHANGE_RATE).await? {
        Some(raw) => {
            let scaled: i64 = raw
                .parse()
                .map_err(|_| DbError::Corrupt(format!("exchange_rate = '{raw}'")))?;
            ExchangeRate::try_from_scaled(scaled).map_err(|e| DbError::Corrupt(e.to_string()))
        }
        None => Ok(DEFAULT_EXCHANGE_RATE),
    }
}

pub(crate) async fn tax_rate(conn: &mut SqliteConnection) -> DbResult<TaxRate> {
    match read(conn, KEY_TAX_RATE).await? {
        Some(raw) => raw
            .parse::<u32>()
            .map(TaxRate::from_bps)
            .map_err(|_| DbError::Corrupt(format!("tax_rate_bps = '{raw}'"))),
        None => Ok(TaxRate::zero()),
    }
}

#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    pub async fn exchange_rate(&self) -> DbResult<ExchangeRate> {
        let mut conn = self.pool.acquire().await?;
        exchange_rate(&mut conn).await
    }

    /// Changes the current rate. Existing invoices keep their snapshot.
    pub async fn set_exchange_rate(
        &self,
        rate: ExchangeRate,
        user_id: Option<&str>,
    ) -> DbResult<ExchangeRate> {
        let mut tx = self.pool.begin().await?;
        let previous = exchange_rate(&mut tx).await?;
        write(&mut tx, KEY_EXCHANGE_RATE, &rate.scaled().to_string()).await?;
        audit::append(
            &mut tx,
            AuditEntry::new(AuditAction::ExchangeRateChanged, "settings", KEY_EXCHANGE_RATE)
                .details(json!({ "from": previous.as_f64(), "to": rate.as_f64() }))
                .by(user_id),
        )
        .await?;
        tx.commit().await?;

        info!(from = %previous, to = %rate, "Exchange rate changed");
        Ok(rate)
    }

    /// Stores `rate` only when no rate has been set yet. Returns whether it wrote.
    pub async fn init_exchange_rate(&self, rate: ExchangeRate) -> DbResult<bool> {
        let mut conn = self.pool.acquire().await?;
        if read(&mut conn, KEY_EXCHANGE_RATE).await?.is_some() {
            return Ok(false);
        }
        write(&mut conn, KEY_EXCHANGE_RATE, &rate.scaled().to_string()).await?;
        info!(rate = %rate, "Initial exchange rate stored");
        Ok(true)
    }

    pub async fn tax_rate(&self) -> DbResult<TaxRate> {
        let mut conn = self.pool.acquire().await?;
        tax_rate(&mut conn).await
    }

    pub async fn set_tax_rate(&self, rate: TaxRate) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        write(&mut conn, KEY_TAX_RATE, &rate.bps().to_string()).await
    }

    pub async fn set_store_name(&self, name: &str) -> DbResult<()> {
        let mut conn = self.pool.acquire().await?;
        write(&mut conn, KEY_STORE_NAME, name).await
    }

    pub async fn store_settings(&self) -> DbResult<StoreSettings> {
        let mut conn = self.pool.acquire().await?;
        let store_name = read(&mut conn, KEY_STORE_NAME)
            .await?
            .unwrap_or_else(|| DEFAULT_STORE_NAME.to_string());
        Ok(StoreSettings {
            store_name,
            exchange_rate: exchange_rate(&mut conn).await?,
            tax_rate: tax_rate(&mut conn).await?,
        })
    }

    /// Whether an admin key has been configured.
    pub async fn has_admin_key(&self) -> DbResult<bool> {
        let mut conn = self.pool.acquire().await?;
        Ok(read(&mut conn, KEY_ADMIN_KEY_HASH).await?.is_some())
    }

    /// Sets the admin key unconditionally (seeding, first run).
    pub async fn init_admin_key(&self, key: &str) -> DbResult<()> {
        let hash = hash_secret(key)?;
        let mut conn = self.pool.acquire().await?;
        write(&mut conn, KEY_ADMIN_KEY_HASH, &hash).await
    }

    /// Checks `key` against the stored hash. No stored key means no match.
    pub async fn verify_admin_key(&self, key: &str) -> DbResult<bool> {
        let mut conn = self.pool.acquire().await?;
        let valid = match read(&mut conn, KEY_ADMIN_KEY_HASH).await? {
            Some(hash) => verify_secret(key, &hash),
            None => false,
        };
        if !valid {
            warn!("Admin key verification failed");
        }
        Ok(valid)
    }

    /// Replaces the admin key. Returns `false` when `old_key` does not match.
    pub async fn rotate_admin_key(
        &self,
        old_key: &str,
        new_key: &str,
        user_id: Option<&str>,
    ) -> DbResult<bool> {
        if !self.verify_admin_key(old_key).await? {
            return Ok(false);
        }

        let hash = hash_secret(new_key)?;
        let mut tx = self.pool.begin().await?;
        write(&mut tx, KEY_ADMIN_KEY_HASH, &hash).await?;
        audit::append(
            &mut tx,
            AuditEntry::new(AuditAction::AdminKeyRotated, "settings", KEY_ADMIN_KEY_HASH)
                .by(user_id),
        )
        .await?;
        tx.commit().await?;

        info!("Admin key rotated");
        Ok(true)
    }
}
