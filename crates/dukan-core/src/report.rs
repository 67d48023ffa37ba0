//! # Report Module
//!
//! Calendar periods and profit arithmetic for the reporting endpoints.
//! Aggregation queries live in dukan-db; this module only resolves periods
//! and combines the sums.
//!
//! ```text
//! gross profit = sales (net of returns) - cost of goods kept
//! net profit   = gross profit - expenses
//! ```

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::Product;

/// A reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportPeriod {
    Monthly {
        year: i32,
        month: u32,
    },
    Yearly {
        year: i32,
    },
    /// Inclusive calendar dates.
    Range {
        #[ts(as = "String")]
        from: NaiveDate,
        #[ts(as = "String")]
        to: NaiveDate,
    },
}

fn start_of(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn invalid_period(reason: &str) -> ValidationError {
    ValidationError::InvalidFormat {
        field: "period".to_string(),
        reason: reason.to_string(),
    }
}

impl ReportPeriod {
    /// Resolves the period into a half-open `[start, end)` UTC range.
    ///
    /// ```rust
    /// use dukan_core::report::ReportPeriod;
    ///
    /// let (start, end) = ReportPeriod::Monthly { year: 2026, month: 12 }.bounds().unwrap();
    /// assert_eq!(start.to_rfc3339(), "2026-12-01T00:00:00+00:00");
    /// assert_eq!(end.to_rfc3339(), "2027-01-01T00:00:00+00:00");
    /// ```
    pub fn bounds(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), ValidationError> {
        match *self {
            ReportPeriod::Monthly { year, month } => {
                let first = NaiveDate::from_ymd_opt(year, month, 1)
                    .ok_or_else(|| invalid_period("month must be 1-12"))?;
                let next = if month == 12 {
                    NaiveDate::from_ymd_opt(year + 1, 1, 1)
                } else {
                    NaiveDate::from_ymd_opt(year, month + 1, 1)
                }
                .ok_or_else(|| invalid_period("year out of range"))?;
                Ok((start_of(first), start_of(next)))
            }
            ReportPeriod::Yearly { year } => {
                let first = NaiveDate::from_ymd_opt(year, 1, 1)
                    .ok_or_else(|| invalid_period("year out of range"))?;
                let next = NaiveDate::from_ymd_opt(year + 1, 1, 1)
                    .ok_or_else(|| invalid_period("year out of range"))?;
                Ok((start_of(first), start_of(next)))
            }
            ReportPeriod::Range { from, to } => {
                if to < from {
                    return Err(invalid_period("'to' is before 'from'"));
                }
                Ok((start_of(from), start_of(to) + Duration::days(1)))
            }
        }
    }

    /// The single day containing `now`.
    pub fn day_of(now: DateTime<Utc>) -> Self {
        let today = now.date_naive();
        ReportPeriod::Range { from: today, to: today }
    }
}

/// Invoice counts per status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatusCounts {
    pub paid: i64,
    pub partial: i64,
    pub unpaid: i64,
}

/// Sums over the invoices of a period, as produced by the aggregation query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SalesTotals {
    pub sales_usd: Money,
    pub sales_afn: Money,
    pub returns_usd: Money,
    pub returns_afn: Money,
    pub cogs_usd: Money,
    pub invoice_count: i64,
    pub statuses: StatusCounts,
}

/// Sums over the expenses of a period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExpenseTotals {
    pub expenses_usd: Money,
    pub expenses_afn: Money,
}

/// A finished period report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PeriodReport {
    pub period: ReportPeriod,
    #[ts(as = "String")]
    pub start: DateTime<Utc>,
    #[ts(as = "String")]
    pub end: DateTime<Utc>,
    pub invoice_count: i64,
    /// Sales net of returns.
    pub total_sales_usd: Money,
    pub total_sales_afn: Money,
    pub total_cogs_usd: Money,
    pub gross_profit_usd: Money,
    pub total_expenses_usd: Money,
    pub total_expenses_afn: Money,
    pub net_profit_usd: Money,
    pub statuses: StatusCounts,
}

impl PeriodReport {
    pub fn build(
        period: ReportPeriod,
        bounds: (DateTime<Utc>, DateTime<Utc>),
        sales: SalesTotals,
        expenses: ExpenseTotals,
    ) -> Self {
        let total_sales_usd = sales.sales_usd - sales.returns_usd;
        let gross_profit_usd = total_sales_usd - sales.cogs_usd;

        PeriodReport {
            period,
            start: bounds.0,
            end: bounds.1,
            invoice_count: sales.invoice_count,
            total_sales_usd,
            total_sales_afn: sales.sales_afn - sales.returns_afn,
            total_cogs_usd: sales.cogs_usd,
            gross_profit_usd,
            total_expenses_usd: expenses.expenses_usd,
            total_expenses_afn: expenses.expenses_afn,
            net_profit_usd: gross_profit_usd - expenses.expenses_usd,
            statuses: sales.statuses,
        }
    }
}

/// A product at or below its reorder level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LowStockItem {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub stock: i64,
    pub reorder_level: i64,
}

impl From<&Product> for LowStockItem {
    fn from(p: &Product) -> Self {
        LowStockItem {
            product_id: p.id.clone(),
            sku: p.sku.clone(),
            name: p.name.clone(),
            stock: p.stock,
            reorder_level: p.reorder_level,
        }
    }
}

/// The landing-page numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Dashboard {
    pub today_sales_usd: Money,
    pub today_sales_afn: Money,
    pub today_invoice_count: i64,
    pub outstanding_debt_afn: Money,
    pub overdue_debt_count: i64,
    pub customer_count: i64,
    pub low_stock: Vec<LowStockItem>,
}

// =============================================================================
// Unit Tests
// =============================================================================
