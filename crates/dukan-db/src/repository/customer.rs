//! # Customer Repository
//!
//! Customers and their running balances.
//!
//! Balances are only ever changed by ledger operations (sales, payments,
//! returns, deletions) through [`save_balance`]; the public update path
//! touches contact details and the credit limit only.

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::audit::{self, AuditEntry};
use dukan_core::ledger::CustomerBalance;
use dukan_core::validation::{
    validate_credit_limit, validate_email, validate_name, validate_optional_text, validate_phone,
    validate_search_query,
};
use dukan_core::{AuditAction, Customer, Money};

const CUSTOMER_COLUMNS: &str = r#"
    id, name, phone, email, address,
    credit_limit_usd, outstanding_balance_usd, outstanding_balance_afn,
    notes, created_at, updated_at
"#;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCustomer {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub credit_limit_usd: Option<Money>,
    pub notes: Option<String>,
}

fn validate_contact(phone: Option<&str>, email: Option<&str>) -> DbResult<()> {
    if let Some(phone) = phone.filter(|p| !p.trim().is_empty()) {
        validate_phone(phone)?;
    }
    if let Some(email) = email.filter(|e| !e.trim().is_empty()) {
        validate_email(email)?;
    }
    Ok(())
}

fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// A partial customer update. `credit_limit_usd: Some(None)` removes the limit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerUpdate {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub credit_limit_usd: Option<Option<Money>>,
    pub notes: Option<String>,
}

pub(crate) async fn fetch(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
    let customer = sqlx::query_as::<_, Customer>(&format!(
        "SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(customer)
}

/// Persists a recomputed balance.
pub(crate) async fn save_balance(
    conn: &mut SqliteConnection,
    customer_id: &str,
    balance: CustomerBalance,
) -> DbResult<()> {
    debug!(
        customer_id = %customer_id,
        usd = %balance.usd,
        afn = ?balance.afn_fixed,
        "Saving customer balance"
    );

    let result = sqlx::query(
        r#"
        UPDATE customers
        SET outstanding_balance_usd = ?2, outstanding_balance_afn = ?3, updated_at = ?4
        WHERE id = ?1
        "#,
    )
    .bind(customer_id)
    .bind(balance.usd)
    .bind(balance.afn_fixed)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::not_found("Customer", customer_id));
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    pub async fn insert(&self, new: NewCustomer, user_id: Option<&str>) -> DbResult<Customer> {
        validate_name("name", &new.name, 200)?;
        validate_contact(new.phone.as_deref(), new.email.as_deref())?;
        validate_optional_text("address", new.address.as_deref(), 500)?;
        validate_credit_limit(new.credit_limit_usd)?;

        let now = Utc::now();
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: new.name.trim().to_string(),
            phone: blank_to_none(new.phone),
            email: blank_to_none(new.email),
            address: blank_to_none(new.address),
            credit_limit_usd: new.credit_limit_usd,
            outstanding_balance_usd: Money::zero(),
            outstanding_balance_afn: None,
            notes: blank_to_none(new.notes),
            created_at: now,
            updated_at: now,
        };

        debug!(name = %customer.name, "Inserting customer");

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO customers (
                id, name, phone, email, address,
                credit_limit_usd, outstanding_balance_usd, outstanding_balance_afn,
                notes, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(customer.credit_limit_usd)
        .bind(customer.outstanding_balance_usd)
        .bind(customer.outstanding_balance_afn)
        .bind(&customer.notes)
        .bind(customer.created_at)
        .bind(customer.updated_at)
        .execute(&mut *tx)
        .await?;

        audit::append(
            &mut tx,
            AuditEntry::new(AuditAction::CustomerCreated, "customer", &customer.id)
                .details(json!({
                    "name": customer.name,
                    "credit_limit_usd": customer.credit_limit_usd,
                }))
                .by(user_id),
        )
        .await?;
        tx.commit().await?;

        Ok(customer)
    }

    pub async fn update(
        &self,
        id: &str,
        changes: CustomerUpdate,
        user_id: Option<&str>,
    ) -> DbResult<Customer> {
        let mut tx = self.pool.begin().await?;
        let mut customer = fetch(&mut tx, id)
            .await?
            .ok_or_else(|| DbError::not_found("Customer", id))?;

        if let Some(name) = changes.name {
            validate_name("name", &name, 200)?;
            customer.name = name.trim().to_string();
        }
        validate_contact(changes.phone.as_deref(), changes.email.as_deref())?;
        if changes.phone.is_some() {
            customer.phone = blank_to_none(changes.phone);
        }
        if changes.email.is_some() {
            customer.email = blank_to_none(changes.email);
        }
        if changes.address.is_some() {
            validate_optional_text("address", changes.address.as_deref(), 500)?;
            customer.address = blank_to_none(changes.address);
        }
        if let Some(limit) = changes.credit_limit_usd {
            validate_credit_limit(limit)?;
            customer.credit_limit_usd = limit;
        }
        if changes.notes.is_some() {
            customer.notes = blank_to_none(changes.notes);
        }
        customer.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE customers SET
                name = ?2, phone = ?3, email = ?4, address = ?5,
                credit_limit_usd = ?6, notes = ?7, updated_at = ?8
            WHERE id = ?1
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(&customer.phone)
        .bind(&customer.email)
        .bind(&customer.address)
        .bind(customer.credit_limit_usd)
        .bind(&customer.notes)
        .bind(customer.updated_at)
        .execute(&mut *tx)
        .await?;

        audit::append(
            &mut tx,
            AuditEntry::new(AuditAction::CustomerUpdated, "customer", id)
                .details(json!({
                    "name": customer.name,
                    "credit_limit_usd": customer.credit_limit_usd,
                }))
                .by(user_id),
        )
        .await?;
        tx.commit().await?;

        Ok(customer)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        fetch(&mut conn, id).await
    }

    /// Lists customers by name, optionally filtered by name or phone.
    pub async fn list(&self, search: Option<&str>, limit: u32) -> DbResult<Vec<Customer>> {
        let pattern = match search.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => Some(format!("%{}%", validate_search_query(s)?)),
            None => None,
        };

        let customers = sqlx::query_as::<_, Customer>(&format!(
            r#"
            SELECT {CUSTOMER_COLUMNS}
            FROM customers
            WHERE (?1 IS NULL OR name LIKE ?1 OR phone LIKE ?1)
            ORDER BY name
            LIMIT ?2
            "#
        ))
        .bind(pattern)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(customers)
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use dukan_core::ExchangeRate;

    pub(crate) fn new_customer(name: &str) -> NewCustomer {
        NewCustomer {
            name: name.to_string(),
            phone: Some("+93 700 123 456".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();

        let c = repo.insert(new_customer("Ahmad"), None).await.unwrap();
        repo.insert(new_customer("Bashir"), None).await.unwrap();

        assert_eq!(c.outstanding_balance_usd, Money::zero());
        assert_eq!(repo.list(None, 50).await.unwrap().len(), 2);
        assert_eq!(repo.list(Some("ahm"), 50).await.unwrap().len(), 1);
        assert_eq!(repo.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_rejects_bad_phone() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let bad = NewCustomer {
            name: "X".into(),
            phone: Some("12".into()),
            ..Default::default()
        };
        let err = db.customers().insert(bad, None).await.unwrap_err();
        assert!(matches!(err, DbError::Core(_)));
    }

    #[tokio::test]
    async fn test_update_and_balance() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.customers();
        let c = repo.insert(new_customer("Karim"), None).await.unwrap();

        let updated = repo
            .update(
                &c.id,
                CustomerUpdate {
                    credit_limit_usd: Some(Some(Money::from_cents(50_000))),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.credit_limit_usd, Some(Money::from_cents(50_000)));

        let rate = ExchangeRate::from_scaled(700_000);
        let balance = c.balance().apply_debt(Money::from_cents(70_000), rate);
        let mut conn = db.pool().acquire().await.unwrap();
        save_balance(&mut conn, &c.id, balance).await.unwrap();
        drop(conn);

        let stored = repo.get_by_id(&c.id).await.unwrap().unwrap();
        assert_eq!(stored.outstanding_balance_usd.cents(), 1_000);
        assert_eq!(stored.outstanding_balance_afn, Some(Money::from_cents(70_000)));
    }
}
