//! # Audit Repository
//!
//! The audit trail is append-only. Entries are written inside the same
//! transaction as the change they describe, and the schema rejects UPDATE
//! and DELETE on `audit_logs` with a trigger.

use chrono::Utc;
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use dukan_core::{AuditAction, AuditLog};

/// An audit entry waiting to be written.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: AuditAction,
    pub entity: &'static str,
    pub entity_id: String,
    pub details: Value,
    pub user_id: Option<String>,
}

impl AuditEntry {
    pub fn new(action: AuditAction, entity: &'static str, entity_id: impl Into<String>) -> Self {
        AuditEntry {
            action,
            entity,
            entity_id: entity_id.into(),
            details: Value::Object(Default::default()),
            user_id: None,
        }
    }

    pub fn details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    pub fn by(mut self, user_id: Option<&str>) -> Self {
        self.user_id = user_id.map(str::to_string);
        self
    }
}

/// Writes an audit entry on an open connection or transaction.
pub(crate) async fn append(conn: &mut SqliteConnection, entry: AuditEntry) -> DbResult<AuditLog> {
    let log = AuditLog {
        id: Uuid::new_v4().to_string(),
        action: entry.action,
        entity: entry.entity.to_string(),
        entity_id: entry.entity_id,
        details: entry.details.to_string(),
        user_id: entry.user_id,
        created_at: Utc::now(),
    };

    debug!(
        action = ?log.action,
        entity = %log.entity,
        entity_id = %log.entity_id,
        "Appending audit entry"
    );

    sqlx::query(
        r#"
        INSERT INTO audit_logs (id, action, entity, entity_id, details, user_id, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(&log.id)
    .bind(log.action)
    .bind(&log.entity)
    .bind(&log.entity_id)
    .bind(&log.details)
    .bind(&log.user_id)
    .bind(log.created_at)
    .execute(&mut *conn)
    .await?;

    Ok(log)
}

/// Read access to the audit trail.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    pool: SqlitePool,
}

impl AuditRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AuditRepository { pool }
    }

    /// Records a standalone entry (outside any ledger transaction).
    pub async fn record(&self, entry: AuditEntry) -> DbResult<AuditLog> {
        let mut conn = self.pool.acquire().await?;
        append(&mut conn, entry).await
    }

    /// Lists entries newest first, optionally for one entity kind.
    pub async fn list(
        &self,
        entity: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> DbResult<Vec<AuditLog>> {
        let logs = sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, action, entity, entity_id, details, user_id, created_at
            FROM audit_logs
            WHERE (?1 IS NULL OR entity = ?1)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(entity)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }

    /// Entries for one entity, oldest first.
    pub async fn for_entity(&self, entity: &str, entity_id: &str) -> DbResult<Vec<AuditLog>> {
        let logs = sqlx::query_as::<_, AuditLog>(
            r#"
            SELECT id, action, entity, entity_id, details, user_id, created_at
            FROM audit_logs
            WHERE entity = ?1 AND entity_id = ?2
            ORDER BY created_at, rowid
            "#,
        )
        .bind(entity)
        .bind(entity_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(logs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig, DbError};
    use serde_json::json;

    #[tokio::test]
    async fn test_record_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.audit_logs();

        repo.record(
            AuditEntry::new(AuditAction::ExchangeRateChanged, "settings", "exchange_rate")
                .details(json!({ "from": 70.0, "to": 71.5 })),
        )
        .await
        .unwrap();
        repo.record(AuditEntry::new(AuditAction::CustomerCreated, "customer", "c-1"))
            .await
            .unwrap();

        let all = repo.list(None, 50, 0).await.unwrap();
        assert_eq!(all.len(), 2);

        let settings = repo.list(Some("settings"), 50, 0).await.unwrap();
        assert_eq!(settings.len(), 1);
        assert_eq!(settings[0].action, AuditAction::ExchangeRateChanged);
        let details: Value = serde_json::from_str(&settings[0].details).unwrap();
        assert_eq!(details["to"], json!(71.5));
    }

    #[tokio::test]
    async fn test_audit_log_is_append_only() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let log = db
            .audit_logs()
            .record(AuditEntry::new(AuditAction::CustomerCreated, "customer", "c-1"))
            .await
            .unwrap();

        let update = sqlx::query("UPDATE audit_logs SET entity = 'x' WHERE id = ?1")
            .bind(&log.id)
            .execute(db.pool())
            .await
            .map_err(DbError::from);
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM audit_logs WHERE id = ?1")
            .bind(&log.id)
            .execute(db.pool())
            .await
            .map_err(DbError::from);
        assert!(delete.is_err());

        assert_eq!(db.audit_logs().list(None, 10, 0).await.unwrap().len(), 1);
    }
}
