//! # Report Repository
//!
//! Aggregation queries behind the dashboard and period reports. The sums
//! are done in SQL; profit arithmetic is in `dukan_core::report`.

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use crate::repository::{DebtRepository, ExpenseRepository, ProductRepository};
use dukan_core::report::{
    Dashboard, LowStockItem, PeriodReport, ReportPeriod, SalesTotals, StatusCounts,
};
use dukan_core::{InvoiceStatus, Money};

const LOW_STOCK_LIMIT: u32 = 20;

#[derive(Debug, FromRow)]
struct SalesRow {
    sales_usd: Money,
    sales_afn: Money,
    returns_usd: Money,
    returns_afn: Money,
    invoice_count: i64,
    paid: i64,
    partial: i64,
    unpaid: i64,
}

#[derive(Debug, Clone)]
pub struct ReportRepository {
    pool: SqlitePool,
}

impl ReportRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ReportRepository { pool }
    }

    /// Sales sums over invoices created within `[start, end)`.
    pub async fn sales_totals(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> DbResult<SalesTotals> {
        let row = sqlx::query_as::<_, SalesRow>(
            r#"
            SELECT
                COALESCE(SUM(total_usd), 0)    AS sales_usd,
                COALESCE(SUM(total_afn), 0)    AS sales_afn,
                COALESCE(SUM(returned_usd), 0) AS returns_usd,
                COALESCE(SUM(returned_afn), 0) AS returns_afn,
                COUNT(*)                       AS invoice_count,
                COALESCE(SUM(CASE WHEN status = ?3 THEN 1 ELSE 0 END), 0) AS paid,
                COALESCE(SUM(CASE WHEN status = ?4 THEN 1 ELSE 0 END), 0) AS partial,
                COALESCE(SUM(CASE WHEN status = ?5 THEN 1 ELSE 0 END), 0) AS unpaid
            FROM invoices
            WHERE created_at >= ?1 AND created_at < ?2
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(InvoiceStatus::Paid)
        .bind(InvoiceStatus::Partial)
        .bind(InvoiceStatus::Unpaid)
        .fetch_one(&self.pool)
        .await?;

        // Cost of the units the customer kept.
        let cogs_usd = sqlx::query_scalar::<_, Money>(
            r#"
            SELECT COALESCE(SUM(ii.unit_cost_usd * (ii.quantity - ii.returned_quantity)), 0)
            FROM invoice_items ii
            JOIN invoices i ON i.id = ii.invoice_id
            WHERE i.created_at >= ?1 AND i.created_at < ?2
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(SalesTotals {
            sales_usd: row.sales_usd,
            sales_afn: row.sales_afn,
            returns_usd: row.returns_usd,
            returns_afn: row.returns_afn,
            cogs_usd,
            invoice_count: row.invoice_count,
            statuses: StatusCounts {
                paid: row.paid,
                partial: row.partial,
                unpaid: row.unpaid,
            },
        })
    }

    /// Monthly, yearly or custom-range report.
    pub async fn period(&self, period: ReportPeriod) -> DbResult<PeriodReport> {
        let (start, end) = period.bounds()?;
        debug!(%start, %end, "Building period report");

        let sales = self.sales_totals(start, end).await?;
        let expenses = ExpenseRepository::new(self.pool.clone()).totals(start, end).await?;

        Ok(PeriodReport::build(period, (start, end), sales, expenses))
    }

    /// Landing-page figures at `now`.
    pub async fn dashboard(&self, now: DateTime<Utc>) -> DbResult<Dashboard> {
        let (start, end) = ReportPeriod::day_of(now).bounds()?;
        let today = self.sales_totals(start, end).await?;

        let debts = DebtRepository::new(self.pool.clone());
        let outstanding_debt_afn = debts.total_outstanding().await?;
        let overdue_debt_count = debts.overdue_count(now).await?;

        let customer_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM customers")
            .fetch_one(&self.pool)
            .await?;

        let low_stock = ProductRepository::new(self.pool.clone())
            .low_stock(LOW_STOCK_LIMIT)
            .await?
            .iter()
            .map(LowStockItem::from)
            .collect();

        Ok(Dashboard {
            today_sales_usd: today.sales_usd - today.returns_usd,
            today_sales_afn: today.sales_afn - today.returns_afn,
            today_invoice_count: today.invoice_count,
            outstanding_debt_afn,
            overdue_debt_count,
            customer_count,
            low_stock,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::customer::tests::new_customer;
    use crate::repository::product::tests::new_product;
    use crate::repository::{NewExpense, NewProduct, NewSale, SaleLineRequest};
    use crate::{Database, DbConfig};
    use chrono::{Datelike, Duration};
    use dukan_core::checkout::Tender;
    use dukan_core::returns::ReturnRequestLine;
    use dukan_core::{DiscountRate, PaymentMethod};

    fn one(product_id: &str, quantity: i64, tender: Tender) -> NewSale {
        NewSale {
            items: vec![SaleLineRequest { product_id: product_id.to_string(), quantity }],
            discount: DiscountRate::zero(),
            tender,
            method: PaymentMethod::Cash,
            notes: None,
            user_id: None,
        }
    }

    #[tokio::test]
    async fn test_period_report_profit() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        // $20 price, $12 cost
        let tea = db
            .products()
            .insert(
                NewProduct {
                    cost_usd: Money::from_cents(1_200),
                    ..new_product("TEA-500", 2_000, 10)
                },
                None,
            )
            .await
            .unwrap();
        let customer = db.customers().insert(new_customer("Zahra"), None).await.unwrap();

        let paid = db
            .sales()
            .create_sale(one(&tea.id, 2, Tender::cash(Money::from_cents(280_000))))
            .await
            .unwrap();
        let due = (Utc::now() + Duration::days(7)).date_naive();
        db.sales()
            .create_sale(one(
                &tea.id,
                1,
                Tender::cash(Money::zero()).for_customer(&customer.id).due(due),
            ))
            .await
            .unwrap();

        db.sales()
            .apply_return(
                &paid.invoice.id,
                &[ReturnRequestLine { item_id: paid.items[0].id.clone(), quantity: 1 }],
                None,
            )
            .await
            .unwrap();

        db.expenses()
            .create(
                NewExpense {
                    description: "Electricity".into(),
                    category: "utilities".into(),
                    amount_afn: Money::from_cents(70_000),
                    expense_date: None,
                },
                None,
            )
            .await
            .unwrap();

        let now = Utc::now();
        let report = db
            .reports()
            .period(ReportPeriod::Monthly { year: now.year(), month: now.month() })
            .await
            .unwrap();

        assert_eq!(report.invoice_count, 2);
        // 3 sold, 1 returned: $40 net sales, $24 cost
        assert_eq!(report.total_sales_usd.cents(), 4_000);
        assert_eq!(report.total_sales_afn.cents(), 280_000);
        assert_eq!(report.total_cogs_usd.cents(), 2_400);
        assert_eq!(report.gross_profit_usd.cents(), 1_600);
        assert_eq!(report.total_expenses_usd.cents(), 1_000);
        assert_eq!(report.net_profit_usd.cents(), 600);
        assert_eq!(report.statuses.paid, 1);
        assert_eq!(report.statuses.unpaid, 1);
    }

    #[tokio::test]
    async fn test_dashboard() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let tea = db.products().insert(new_product("TEA-500", 2_000, 6), None).await.unwrap();
        let customer = db.customers().insert(new_customer("Omid"), None).await.unwrap();

        let due = (Utc::now() + Duration::days(3)).date_naive();
        db.sales()
            .create_sale(one(
                &tea.id,
                4,
                Tender::cash(Money::from_cents(80_000)).for_customer(&customer.id).due(due),
            ))
            .await
            .unwrap();

        let dashboard = db.reports().dashboard(Utc::now()).await.unwrap();
        assert_eq!(dashboard.today_invoice_count, 1);
        assert_eq!(dashboard.today_sales_afn.cents(), 560_000);
        assert_eq!(dashboard.outstanding_debt_afn.cents(), 480_000);
        assert_eq!(dashboard.overdue_debt_count, 0);
        assert_eq!(dashboard.customer_count, 1);
        assert_eq!(dashboard.low_stock.len(), 1);
        assert_eq!(dashboard.low_stock[0].stock, 2);
    }
}
