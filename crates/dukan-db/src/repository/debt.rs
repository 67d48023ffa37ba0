//! # Debt Repository
//!
//! Debts are created by credit sales and paid down by customer payments
//! and returns. Their status is never stored: it is derived from the
//! remaining balance and due date at read time.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::error::DbResult;
use dukan_core::ledger::{DebtSummary, OpenDebt};
use dukan_core::{Debt, DebtStatus, Money, SETTLEMENT_TOLERANCE};

const DEBT_COLUMNS: &str = r#"
    id, invoice_id, customer_id,
    original_amount_afn, paid_amount_afn, remaining_balance_afn,
    due_date, notes, created_at, updated_at, settled_at
"#;

/// A debt with its status derived at `now`.
#[derive(Debug, Clone, Serialize)]
pub struct DebtRecord {
    #[serde(flatten)]
    pub debt: Debt,
    pub status: DebtStatus,
}

impl DebtRecord {
    pub fn at(debt: Debt, now: DateTime<Utc>) -> Self {
        let status = debt.status(now);
        DebtRecord { debt, status }
    }
}

/// Filters for [`DebtRepository::list`].
#[derive(Debug, Clone, Default)]
pub struct DebtFilter {
    pub customer_id: Option<String>,
    pub status: Option<DebtStatus>,
    /// Include settled debts. Implied when filtering for `SETTLED`.
    pub include_settled: bool,
}

pub(crate) async fn for_invoice(
    conn: &mut SqliteConnection,
    invoice_id: &str,
) -> DbResult<Option<Debt>> {
    let debt = sqlx::query_as::<_, Debt>(&format!(
        "SELECT {DEBT_COLUMNS} FROM debts WHERE invoice_id = ?1"
    ))
    .bind(invoice_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(debt)
}

/// Open debts of a customer in allocation order.
pub(crate) async fn open_for_customer(
    conn: &mut SqliteConnection,
    customer_id: &str,
) -> DbResult<Vec<OpenDebt>> {
    let debts = sqlx::query_as::<_, Debt>(&format!(
        r#"
        SELECT {DEBT_COLUMNS}
        FROM debts
        WHERE customer_id = ?1 AND remaining_balance_afn > ?2
        ORDER BY due_date, created_at
        "#
    ))
    .bind(customer_id)
    .bind(SETTLEMENT_TOLERANCE)
    .fetch_all(&mut *conn)
    .await?;
    Ok(debts.iter().map(OpenDebt::from).collect())
}

/// Inserts the debt for a credit sale.
pub(crate) async fn insert(conn: &mut SqliteConnection, debt: &Debt) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO debts (
            id, invoice_id, customer_id,
            original_amount_afn, paid_amount_afn, remaining_balance_afn,
            due_date, notes, created_at, updated_at, settled_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&debt.id)
    .bind(&debt.invoice_id)
    .bind(&debt.customer_id)
    .bind(debt.original_amount_afn)
    .bind(debt.paid_amount_afn)
    .bind(debt.remaining_balance_afn)
    .bind(debt.due_date)
    .bind(&debt.notes)
    .bind(debt.created_at)
    .bind(debt.updated_at)
    .bind(debt.settled_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Records `paid` against a debt and stamps `settled_at` once nothing is left.
pub(crate) async fn apply_payment(
    conn: &mut SqliteConnection,
    debt_id: &str,
    paid: Money,
) -> DbResult<()> {
    reduce(conn, debt_id, paid, true).await
}

/// Cancels `amount` of a debt without a payment (returned goods).
pub(crate) async fn write_off(
    conn: &mut SqliteConnection,
    debt_id: &str,
    amount: Money,
) -> DbResult<()> {
    reduce(conn, debt_id, amount, false).await
}

async fn reduce(
    conn: &mut SqliteConnection,
    debt_id: &str,
    amount: Money,
    is_payment: bool,
) -> DbResult<()> {
    let debt = sqlx::query_as::<_, Debt>(&format!("SELECT {DEBT_COLUMNS} FROM debts WHERE id = ?1"))
        .bind(debt_id)
        .fetch_one(&mut *conn)
        .await?;

    let amount = amount.min(debt.remaining_balance_afn).non_negative();
    let mut remaining = debt.remaining_balance_afn - amount;
    let paid = if is_payment {
        debt.paid_amount_afn + amount
    } else {
        debt.paid_amount_afn
    };

    let now = Utc::now();
    let settled_at = if remaining.exceeds_tolerance() {
        None
    } else {
        remaining = Money::zero();
        Some(debt.settled_at.unwrap_or(now))
    };

    sqlx::query(
        r#"
        UPDATE debts
        SET paid_amount_afn = ?2, remaining_balance_afn = ?3, settled_at = ?4, updated_at = ?5
        WHERE id = ?1
        "#,
    )
    .bind(debt_id)
    .bind(paid)
    .bind(remaining)
    .bind(settled_at)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DebtRepository {
    pool: SqlitePool,
}

impl DebtRepository {
    pub fn new(pool: SqlitePool) -> Self {
        DebtRepository { pool }
    }

    /// Lists debts by due date with their derived status.
    pub async fn list(&self, filter: &DebtFilter, now: DateTime<Utc>) -> DbResult<Vec<DebtRecord>> {
        let include_settled =
            filter.include_settled || filter.status == Some(DebtStatus::Settled);

        let debts = sqlx::query_as::<_, Debt>(&format!(
            r#"
            SELECT {DEBT_COLUMNS}
            FROM debts
            WHERE (?1 IS NULL OR customer_id = ?1)
              AND (?2 OR remaining_balance_afn > ?3)
            ORDER BY due_date, created_at
            "#
        ))
        .bind(filter.customer_id.as_deref())
        .bind(include_settled)
        .bind(SETTLEMENT_TOLERANCE)
        .fetch_all(&self.pool)
        .await?;

        Ok(debts
            .into_iter()
            .map(|d| DebtRecord::at(d, now))
            .filter(|r| filter.status.map_or(true, |s| r.status == s))
            .collect())
    }

    pub async fn for_customer(
        &self,
        customer_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<Vec<DebtRecord>> {
        let filter = DebtFilter {
            customer_id: Some(customer_id.to_string()),
            status: None,
            include_settled: true,
        };
        self.list(&filter, now).await
    }

    pub async fn for_invoice(&self, invoice_id: &str) -> DbResult<Option<Debt>> {
        let mut conn = self.pool.acquire().await?;
        for_invoice(&mut conn, invoice_id).await
    }

    /// Totals by derived status.
    pub async fn summary(&self, now: DateTime<Utc>) -> DbResult<DebtSummary> {
        let debts = sqlx::query_as::<_, Debt>(&format!("SELECT {DEBT_COLUMNS} FROM debts"))
            .fetch_all(&self.pool)
            .await?;
        Ok(DebtSummary::from_debts(&debts, now))
    }

    /// Open debts whose due date has passed at `now`.
    pub async fn overdue_count(&self, now: DateTime<Utc>) -> DbResult<i64> {
        // A debt is overdue once its whole due date has passed.
        let today: NaiveDate = now.date_naive();
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM debts WHERE remaining_balance_afn > ?1 AND due_date < ?2",
        )
        .bind(SETTLEMENT_TOLERANCE)
        .bind(today)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    pub async fn total_outstanding(&self) -> DbResult<Money> {
        let total = sqlx::query_scalar::<_, Money>(
            r#"
            SELECT COALESCE(SUM(remaining_balance_afn), 0)
            FROM debts WHERE remaining_balance_afn > ?1
            "#,
        )
        .bind(SETTLEMENT_TOLERANCE)
        .fetch_one(&self.pool)
        .await?;
        Ok(total)
    }
}
