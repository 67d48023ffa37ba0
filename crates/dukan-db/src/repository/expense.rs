//! # Expense Repository
//!
//! Shop running costs, recorded in AFN with a USD equivalent at the rate
//! current when they were entered.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::audit::{self, AuditEntry};
use crate::repository::settings;
use dukan_core::report::ExpenseTotals;
use dukan_core::validation::{validate_expense_amount, validate_name};
use dukan_core::{AuditAction, Expense, Money};

const EXPENSE_COLUMNS: &str = r#"
    id, description, category, amount_afn, amount_usd,
    exchange_rate, expense_date, user_id, created_at
"#;

#[derive(Debug, Clone, Deserialize)]
pub struct NewExpense {
    pub description: String,
    pub category: String,
    pub amount_afn: Money,
    /// Defaults to today.
    pub expense_date: Option<NaiveDate>,
}

/// Filters for [`ExpenseRepository::list`]. Dates are inclusive.
#[derive(Debug, Clone, Default)]
pub struct ExpenseFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub category: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ExpenseRepository {
    pool: SqlitePool,
}

impl ExpenseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ExpenseRepository { pool }
    }

    pub async fn create(&self, new: NewExpense, user_id: Option<&str>) -> DbResult<Expense> {
        validate_name("description", &new.description, 500)?;
        validate_name("category", &new.category, 50)?;
        validate_expense_amount(new.amount_afn)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let rate = settings::exchange_rate(&mut tx).await?;

        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            description: new.description.trim().to_string(),
            category: new.category.trim().to_lowercase(),
            amount_afn: new.amount_afn,
            amount_usd: rate.afn_to_usd(new.amount_afn),
            exchange_rate: rate,
            expense_date: new.expense_date.unwrap_or_else(|| now.date_naive()),
            user_id: user_id.map(str::to_string),
            created_at: now,
        };

        debug!(category = %expense.category, amount_afn = %expense.amount_afn, "Inserting expense");

        sqlx::query(
            r#"
            INSERT INTO expenses (
                id, description, category, amount_afn, amount_usd,
                exchange_rate, expense_date, user_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&expense.id)
        .bind(&expense.description)
        .bind(&expense.category)
        .bind(expense.amount_afn)
        .bind(expense.amount_usd)
        .bind(expense.exchange_rate)
        .bind(expense.expense_date)
        .bind(&expense.user_id)
        .bind(expense.created_at)
        .execute(&mut *tx)
        .await?;

        audit::append(
            &mut tx,
            AuditEntry::new(AuditAction::ExpenseCreated, "expense", &expense.id)
                .details(json!({
                    "description": expense.description,
                    "category": expense.category,
                    "amount_afn": expense.amount_afn,
                }))
                .by(user_id),
        )
        .await?;
        tx.commit().await?;

        Ok(expense)
    }

    /// Lists expenses newest first.
    pub async fn list(&self, filter: &ExpenseFilter) -> DbResult<Vec<Expense>> {
        let category = filter
            .category
            .as_deref()
            .map(|c| c.trim().to_lowercase())
            .filter(|c| !c.is_empty());

        let expenses = sqlx::query_as::<_, Expense>(&format!(
            r#"
            SELECT {EXPENSE_COLUMNS}
            FROM expenses
            WHERE (?1 IS NULL OR expense_date >= ?1)
              AND (?2 IS NULL OR expense_date <= ?2)
              AND (?3 IS NULL OR category = ?3)
            ORDER BY expense_date DESC, created_at DESC
            "#
        ))
        .bind(filter.from)
        .bind(filter.to)
        .bind(category)
        .fetch_all(&self.pool)
        .await?;
        Ok(expenses)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Expense>> {
        let expense = sqlx::query_as::<_, Expense>(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(expense)
    }

    pub async fn delete(&self, id: &str, user_id: Option<&str>) -> DbResult<Expense> {
        let mut tx = self.pool.begin().await?;

        let expense = sqlx::query_as::<_, Expense>(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expenses WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| DbError::not_found("Expense", id))?;

        sqlx::query("DELETE FROM expenses WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        audit::append(
            &mut tx,
            AuditEntry::new(AuditAction::ExpenseDeleted, "expense", id)
                .details(json!({
                    "description": expense.description,
                    "category": expense.category,
                    "amount_afn": expense.amount_afn,
                    "expense_date": expense.expense_date,
                }))
                .by(user_id),
        )
        .await?;
        tx.commit().await?;

        info!(expense_id = %id, "Expense deleted");
        Ok(expense)
    }

    /// Sums expenses dated within `[start, end)`.
    pub async fn totals(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<ExpenseTotals> {
        let (expenses_usd, expenses_afn) = sqlx::query_as::<_, (Money, Money)>(
            r#"
            SELECT COALESCE(SUM(amount_usd), 0), COALESCE(SUM(amount_afn), 0)
            FROM expenses
            WHERE expense_date >= ?1 AND expense_date < ?2
            "#,
        )
        .bind(start.date_naive())
        .bind(end.date_naive())
        .fetch_one(&self.pool)
        .await?;

        Ok(ExpenseTotals {
            expenses_usd,
            expenses_afn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use dukan_core::report::ReportPeriod;

    fn rent(amount_cents: i64, date: NaiveDate) -> NewExpense {
        NewExpense {
            description: "Shop rent".to_string(),
            category: "Rent".to_string(),
            amount_afn: Money::from_cents(amount_cents),
            expense_date: Some(date),
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[tokio::test]
    async fn test_create_list_and_totals() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.expenses();

        let e = repo.create(rent(700_000, d(2026, 3, 1)), None).await.unwrap();
        assert_eq!(e.category, "rent");
        assert_eq!(e.amount_usd.cents(), 10_000);

        repo.create(rent(350_000, d(2026, 3, 31)), None).await.unwrap();
        repo.create(rent(140_000, d(2026, 4, 1)), None).await.unwrap();

        let march = ExpenseFilter {
            from: Some(d(2026, 3, 1)),
            to: Some(d(2026, 3, 31)),
            category: Some("RENT".to_string()),
        };
        assert_eq!(repo.list(&march).await.unwrap().len(), 2);

        let bounds = ReportPeriod::Monthly { year: 2026, month: 3 }.bounds().unwrap();
        let totals = repo.totals(bounds.0, bounds.1).await.unwrap();
        assert_eq!(totals.expenses_afn.cents(), 1_050_000);
        assert_eq!(totals.expenses_usd.cents(), 15_000);
    }

    #[tokio::test]
    async fn test_rejects_non_positive_amount() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db.expenses().create(rent(0, d(2026, 1, 1)), None).await.unwrap_err();
        assert!(matches!(err, DbError::Core(_)));
    }

    #[tokio::test]
    async fn test_delete_is_audited() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let e = db.expenses().create(rent(10_000, d(2026, 1, 1)), None).await.unwrap();

        db.expenses().delete(&e.id, None).await.unwrap();
        assert!(db.expenses().get_by_id(&e.id).await.unwrap().is_none());

        let err = db.expenses().delete(&e.id, None).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));

        let logs = db.audit_logs().for_entity("expense", &e.id).await.unwrap();
        let actions: Vec<_> = logs.iter().map(|l| l.action).collect();
        assert_eq!(actions, vec![AuditAction::ExpenseCreated, AuditAction::ExpenseDeleted]);
    }
}
