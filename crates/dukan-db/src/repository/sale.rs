//! # Sale Repository
//!
//! Invoices and everything that changes them after checkout.
//!
//! ## Checkout Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │    read rate + tax from settings                                        │
//! │    load products (active, enough stock) ──► CartLine[]                  │
//! │    load customer (if any)                                               │
//! │    dukan_core::checkout::checkout()  ──► CheckoutSummary                │
//! │    credit limit check (credit sales)                                    │
//! │    INSERT invoices        (INV-YYYYMMDD-NNNN)                           │
//! │    INSERT invoice_items   (snapshots) + UPDATE products.stock           │
//! │    INSERT payments        (if anything was tendered)                    │
//! │    INSERT debts           (if outstanding > 0.05)                       │
//! │    UPDATE customers       (debt / stored credit)                        │
//! │    INSERT audit_logs                                                    │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Any failure rolls the whole sale back: the transaction is dropped
//! without commit.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::audit::{self, AuditEntry};
use crate::repository::{customer, debt, product, settings};
use dukan_core::checkout::{checkout, price_cart, settle, CartLine, CheckoutSummary, Tender};
use dukan_core::ledger::{check_credit_limit, derive_invoice_status, InvoiceAmounts};
use dukan_core::returns::{
    plan_return, RefundPlan, ReturnContext, ReturnRequestLine, ReturnableLine,
};
use dukan_core::validation::{validate_cart_size, validate_due_date, validate_optional_text};
use dukan_core::{
    AuditAction, CoreError, Customer, Debt, DiscountRate, Invoice, InvoiceItem, InvoiceStatus,
    Money, Payment, PaymentKind, PaymentMethod,
};

const INVOICE_COLUMNS: &str = r#"
    id, invoice_number, customer_id, user_id, status,
    subtotal_usd, discount_rate, discount_usd, tax_usd, total_usd,
    subtotal_afn, discount_afn, tax_afn, total_afn,
    paid_usd, paid_afn, outstanding_usd, outstanding_afn,
    returned_usd, returned_afn, stored_credit_afn,
    exchange_rate, due_date, notes, created_at, updated_at
"#;

const ITEM_COLUMNS: &str = r#"
    id, invoice_id, product_id, sku_snapshot, name_snapshot,
    quantity, returned_quantity,
    unit_price_usd, unit_price_afn, unit_cost_usd,
    line_total_usd, line_total_afn, created_at
"#;

pub(crate) const PAYMENT_COLUMNS: &str = r#"
    id, customer_id, invoice_id, kind, method,
    amount_afn, amount_usd, exchange_rate, note, user_id, created_at
"#;

// =============================================================================
// Request / Response Types
// =============================================================================

/// One cart line as requested by the till.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleLineRequest {
    pub product_id: String,
    pub quantity: i64,
}

/// Everything needed to ring up a sale.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub items: Vec<SaleLineRequest>,
    pub discount: DiscountRate,
    pub tender: Tender,
    pub method: PaymentMethod,
    pub notes: Option<String>,
    pub user_id: Option<String>,
}

/// The result of a checkout.
#[derive(Debug, Clone, Serialize)]
pub struct SaleReceipt {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub payment: Option<Payment>,
    pub debt: Option<Debt>,
    /// Cash handed back to the customer.
    pub change_afn: Money,
    /// Overpayment banked on the customer's account.
    pub credit_afn: Money,
}

/// An invoice with its lines, payments and debt.
#[derive(Debug, Clone, Serialize)]
pub struct SaleDetail {
    pub invoice: Invoice,
    pub items: Vec<InvoiceItem>,
    pub payments: Vec<Payment>,
    pub debt: Option<Debt>,
}

/// The result of a return.
#[derive(Debug, Clone, Serialize)]
pub struct ReturnReceipt {
    pub invoice: Invoice,
    pub refund: RefundPlan,
    /// The cash refund row, when money was handed back.
    pub payment: Option<Payment>,
}

/// Filters for [`SaleRepository::list`]. Dates are a half-open `[from, to)` range.
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub customer_id: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub limit: u32,
}

// =============================================================================
// Shared Queries
// =============================================================================

pub(crate) async fn fetch_invoice(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<Invoice>> {
    let invoice = sqlx::query_as::<_, Invoice>(&format!(
        "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(invoice)
}

async fn fetch_items(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<Vec<InvoiceItem>> {
    let items = sqlx::query_as::<_, InvoiceItem>(&format!(
        "SELECT {ITEM_COLUMNS} FROM invoice_items WHERE invoice_id = ?1 ORDER BY rowid"
    ))
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(items)
}

async fn fetch_payments(conn: &mut SqliteConnection, invoice_id: &str) -> DbResult<Vec<Payment>> {
    let payments = sqlx::query_as::<_, Payment>(&format!(
        "SELECT {PAYMENT_COLUMNS} FROM payments WHERE invoice_id = ?1 ORDER BY created_at, rowid"
    ))
    .bind(invoice_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(payments)
}

/// Saves paid/outstanding/status after a payment or return.
pub(crate) async fn save_amounts(
    conn: &mut SqliteConnection,
    invoice_id: &str,
    amounts: &InvoiceAmounts,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE invoices
        SET paid_afn = ?2, paid_usd = ?3, outstanding_afn = ?4, outstanding_usd = ?5,
            status = ?6, updated_at = ?7
        WHERE id = ?1
        "#,
    )
    .bind(invoice_id)
    .bind(amounts.paid_afn)
    .bind(amounts.paid_usd)
    .bind(amounts.outstanding_afn)
    .bind(amounts.outstanding_usd)
    .bind(amounts.status)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub(crate) async fn insert_payment(conn: &mut SqliteConnection, payment: &Payment) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT INTO payments (
            id, customer_id, invoice_id, kind, method,
            amount_afn, amount_usd, exchange_rate, note, user_id, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
    )
    .bind(&payment.id)
    .bind(&payment.customer_id)
    .bind(&payment.invoice_id)
    .bind(payment.kind)
    .bind(payment.method)
    .bind(payment.amount_afn)
    .bind(payment.amount_usd)
    .bind(payment.exchange_rate)
    .bind(&payment.note)
    .bind(&payment.user_id)
    .bind(payment.created_at)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Next number of the day's sequence: `INV-20261018-0001`.
async fn next_invoice_number(conn: &mut SqliteConnection, now: DateTime<Utc>) -> DbResult<String> {
    let day = now.format("%Y%m%d").to_string();
    let seq = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO invoice_sequences (day, last_value) VALUES (?1, 1)
        ON CONFLICT(day) DO UPDATE SET last_value = last_value + 1
        RETURNING last_value
        "#,
    )
    .bind(&day)
    .fetch_one(&mut *conn)
    .await?;
    Ok(format!("INV-{day}-{seq:04}"))
}

/// Loads the cart's products, checking stock against the total quantity per product.
async fn cart_lines(
    conn: &mut SqliteConnection,
    items: &[SaleLineRequest],
) -> DbResult<Vec<CartLine>> {
    let mut lines = Vec::with_capacity(items.len());
    let mut requested: HashMap<&str, i64> = HashMap::new();
    for item in items {
        let product = product::fetch(&mut *conn, &item.product_id)
            .await?
            .filter(|p| p.is_active)
            .ok_or_else(|| CoreError::ProductNotFound(item.product_id.clone()))?;

        let wanted = requested.entry(item.product_id.as_str()).or_insert(0);
        *wanted += item.quantity;
        if !product.can_sell(*wanted) {
            return Err(CoreError::InsufficientStock {
                sku: product.sku.clone(),
                available: product.stock,
                requested: *wanted,
            }
            .into());
        }
        lines.push(CartLine::from_product(&product, item.quantity));
    }
    Ok(lines)
}

fn invoice_not_found(id: &str) -> DbError {
    CoreError::InvoiceNotFound(id.to_string()).into()
}

// =============================================================================
// Repository
// =============================================================================

#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Prices a cart against current stock, rate and tax without writing anything.
    ///
    /// With no tender the quote assumes exact payment.
    pub async fn quote(
        &self,
        items: &[SaleLineRequest],
        discount: DiscountRate,
        tender: Option<Tender>,
    ) -> DbResult<CheckoutSummary> {
        validate_cart_size(items.len())?;
        let mut conn = self.pool.acquire().await?;

        let rate = settings::exchange_rate(&mut conn).await?;
        let tax = settings::tax_rate(&mut conn).await?;
        let lines = cart_lines(&mut conn, items).await?;

        let totals = price_cart(&lines, discount, tax, rate)?;
        let tender = tender.unwrap_or_else(|| Tender::cash(totals.total_afn));
        Ok(settle(totals, &tender)?)
    }

    /// Turns a cart into an invoice in one transaction.
    ///
    /// ## Errors
    /// * `CoreError::ProductNotFound` / `InsufficientStock` - bad cart line
    /// * `CoreError::CustomerNotFound` - unknown customer id
    /// * `CheckoutError::*` - credit sale without customer / due date, credit limit
    pub async fn create_sale(&self, sale: NewSale) -> DbResult<SaleReceipt> {
        validate_cart_size(sale.items.len())?;
        validate_optional_text("notes", sale.notes.as_deref(), 1000)?;

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let rate = settings::exchange_rate(&mut tx).await?;
        let tax = settings::tax_rate(&mut tx).await?;

        let lines = cart_lines(&mut tx, &sale.items).await?;

        let customer: Option<Customer> = match sale.tender.customer_id.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => Some(
                customer::fetch(&mut tx, id)
                    .await?
                    .ok_or_else(|| CoreError::CustomerNotFound(id.to_string()))?,
            ),
            _ => None,
        };

        let summary = checkout(&lines, sale.discount, tax, rate, &sale.tender)?;

        if summary.requires_debt {
            if let (Some(due), Some(customer)) = (sale.tender.due_date, &customer) {
                validate_due_date(due, now.date_naive())?;
                check_credit_limit(
                    customer.balance(),
                    customer.credit_limit_usd,
                    summary.outstanding_usd,
                )?;
            }
        }

        let paid_from_credit =
            sale.method == PaymentMethod::Credit && summary.paid_afn.is_positive();
        if paid_from_credit {
            let Some(customer) = &customer else {
                return Err(CoreError::InvalidPaymentAmount {
                    reason: "store credit needs a customer".to_string(),
                }
                .into());
            };
            if summary.change_afn.is_positive() || summary.credit_afn.is_positive() {
                return Err(CoreError::InvalidPaymentAmount {
                    reason: "store credit cannot exceed the total".to_string(),
                }
                .into());
            }
            let available = -customer.balance().displayed_afn(rate);
            if (summary.paid_afn - available).exceeds_tolerance() {
                return Err(CoreError::InvalidPaymentAmount {
                    reason: format!("only {available} of store credit available"),
                }
                .into());
            }
        }

        // Invoice
        let totals = &summary.totals;
        let invoice = Invoice {
            id: Uuid::new_v4().to_string(),
            invoice_number: next_invoice_number(&mut tx, now).await?,
            customer_id: customer.as_ref().map(|c| c.id.clone()),
            user_id: sale.user_id.clone(),
            status: summary.status,
            subtotal_usd: totals.subtotal_usd,
            discount_rate: totals.discount_rate,
            discount_usd: totals.discount_usd,
            tax_usd: totals.tax_usd,
            total_usd: totals.total_usd,
            subtotal_afn: totals.subtotal_afn,
            discount_afn: totals.discount_afn,
            tax_afn: totals.tax_afn,
            total_afn: totals.total_afn,
            paid_usd: summary.paid_usd,
            paid_afn: summary.paid_afn,
            outstanding_usd: summary.outstanding_usd,
            outstanding_afn: summary.outstanding_afn,
            returned_usd: Money::zero(),
            returned_afn: Money::zero(),
            stored_credit_afn: summary.credit_afn,
            exchange_rate: rate,
            due_date: if summary.requires_debt { sale.tender.due_date } else { None },
            notes: sale.notes.clone(),
            created_at: now,
            updated_at: now,
        };

        debug!(
            invoice_number = %invoice.invoice_number,
            total_afn = %invoice.total_afn,
            "Inserting invoice"
        );

        sqlx::query(
            r#"
            INSERT INTO invoices (
                id, invoice_number, customer_id, user_id, status,
                subtotal_usd, discount_rate, discount_usd, tax_usd, total_usd,
                subtotal_afn, discount_afn, tax_afn, total_afn,
                paid_usd, paid_afn, outstanding_usd, outstanding_afn,
                returned_usd, returned_afn, stored_credit_afn,
                exchange_rate, due_date, notes, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13,
                ?14, ?15, ?16, ?17, ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25, ?26
            )
            "#,
        )
        .bind(&invoice.id)
        .bind(&invoice.invoice_number)
        .bind(&invoice.customer_id)
        .bind(&invoice.user_id)
        .bind(invoice.status)
        .bind(invoice.subtotal_usd)
        .bind(invoice.discount_rate)
        .bind(invoice.discount_usd)
        .bind(invoice.tax_usd)
        .bind(invoice.total_usd)
        .bind(invoice.subtotal_afn)
        .bind(invoice.discount_afn)
        .bind(invoice.tax_afn)
        .bind(invoice.total_afn)
        .bind(invoice.paid_usd)
        .bind(invoice.paid_afn)
        .bind(invoice.outstanding_usd)
        .bind(invoice.outstanding_afn)
        .bind(invoice.returned_usd)
        .bind(invoice.returned_afn)
        .bind(invoice.stored_credit_afn)
        .bind(invoice.exchange_rate)
        .bind(invoice.due_date)
        .bind(&invoice.notes)
        .bind(invoice.created_at)
        .bind(invoice.updated_at)
        .execute(&mut *tx)
        .await?;

        // Lines (snapshots) and stock
        let mut items = Vec::with_capacity(totals.lines.len());
        for line in &totals.lines {
            let item = InvoiceItem {
                id: Uuid::new_v4().to_string(),
                invoice_id: invoice.id.clone(),
                product_id: line.product_id.clone(),
                sku_snapshot: line.sku.clone(),
                name_snapshot: line.name.clone(),
                quantity: line.quantity,
                returned_quantity: 0,
                unit_price_usd: line.unit_price_usd,
                unit_price_afn: line.unit_price_afn,
                unit_cost_usd: line.unit_cost_usd,
                line_total_usd: line.line_total_usd,
                line_total_afn: line.line_total_afn,
                created_at: now,
            };

            sqlx::query(
                r#"
                INSERT INTO invoice_items (
                    id, invoice_id, product_id, sku_snapshot, name_snapshot,
                    quantity, returned_quantity,
                    unit_price_usd, unit_price_afn, unit_cost_usd,
                    line_total_usd, line_total_afn, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
            )
            .bind(&item.id)
            .bind(&item.invoice_id)
            .bind(&item.product_id)
            .bind(&item.sku_snapshot)
            .bind(&item.name_snapshot)
            .bind(item.quantity)
            .bind(item.returned_quantity)
            .bind(item.unit_price_usd)
            .bind(item.unit_price_afn)
            .bind(item.unit_cost_usd)
            .bind(item.line_total_usd)
            .bind(item.line_total_afn)
            .bind(item.created_at)
            .execute(&mut *tx)
            .await?;

            product::shift_stock(&mut tx, &item.product_id, -item.quantity).await?;
            items.push(item);
        }

        // Payment row: what was applied plus what was banked
        let payment_afn = summary.payment_afn();
        let payment = if payment_afn.is_positive() {
            let payment = Payment {
                id: Uuid::new_v4().to_string(),
                customer_id: invoice.customer_id.clone(),
                invoice_id: Some(invoice.id.clone()),
                kind: PaymentKind::Sale,
                method: sale.method,
                amount_afn: payment_afn,
                amount_usd: summary.paid_usd + rate.afn_to_usd(summary.credit_afn),
                exchange_rate: rate,
                note: None,
                user_id: sale.user_id.clone(),
                created_at: now,
            };
            insert_payment(&mut tx, &payment).await?;
            Some(payment)
        } else {
            None
        };

        // Debt for the shortfall
        let debt = match (&customer, invoice.due_date) {
            (Some(customer), Some(due_date)) if summary.requires_debt => {
                let debt = Debt {
                    id: Uuid::new_v4().to_string(),
                    invoice_id: invoice.id.clone(),
                    customer_id: customer.id.clone(),
                    original_amount_afn: summary.outstanding_afn,
                    paid_amount_afn: Money::zero(),
                    remaining_balance_afn: summary.outstanding_afn,
                    due_date,
                    notes: sale.notes.clone(),
                    created_at: now,
                    updated_at: now,
                    settled_at: None,
                };
                debt::insert(&mut tx, &debt).await?;
                Some(debt)
            }
            _ => None,
        };

        // Customer balance
        if let Some(customer) = &customer {
            let before = customer.balance();
            let mut balance = before;
            if debt.is_some() {
                balance = balance.apply_debt(summary.outstanding_afn, rate);
            }
            if summary.credit_afn.is_positive() {
                balance = balance.apply_payment(summary.credit_afn, rate);
            }
            if paid_from_credit {
                balance = balance.apply_debt(summary.paid_afn, rate);
            }
            if balance != before {
                customer::save_balance(&mut tx, &customer.id, balance).await?;
            }
        }

        audit::append(
            &mut tx,
            AuditEntry::new(AuditAction::SaleCreated, "invoice", &invoice.id)
                .details(json!({
                    "invoice_number": invoice.invoice_number,
                    "customer_id": invoice.customer_id,
                    "total_usd": invoice.total_usd,
                    "total_afn": invoice.total_afn,
                    "paid_afn": invoice.paid_afn,
                    "outstanding_afn": invoice.outstanding_afn,
                    "credit_afn": summary.credit_afn,
                    "status": invoice.status,
                    "exchange_rate": invoice.exchange_rate,
                }))
                .by(sale.user_id.as_deref()),
        )
        .await?;

        tx.commit().await?;

        info!(
            invoice_number = %invoice.invoice_number,
            status = invoice.status.as_str(),
            total_afn = %invoice.total_afn,
            outstanding_afn = %invoice.outstanding_afn,
            "Sale completed"
        );

        Ok(SaleReceipt {
            invoice,
            items,
            payment,
            debt,
            change_afn: summary.change_afn,
            credit_afn: summary.credit_afn,
        })
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Invoice>> {
        let mut conn = self.pool.acquire().await?;
        fetch_invoice(&mut conn, id).await
    }

    /// Fetches an invoice with its items, payments and debt.
    pub async fn get_detail(&self, id: &str) -> DbResult<Option<SaleDetail>> {
        let mut conn = self.pool.acquire().await?;
        let Some(invoice) = fetch_invoice(&mut conn, id).await? else {
            return Ok(None);
        };
        let items = fetch_items(&mut conn, id).await?;
        let payments = fetch_payments(&mut conn, id).await?;
        let debt = debt::for_invoice(&mut conn, id).await?;

        Ok(Some(SaleDetail {
            invoice,
            items,
            payments,
            debt,
        }))
    }

    pub async fn items(&self, invoice_id: &str) -> DbResult<Vec<InvoiceItem>> {
        let mut conn = self.pool.acquire().await?;
        fetch_items(&mut conn, invoice_id).await
    }

    /// Lists invoices newest first.
    pub async fn list(&self, filter: &SaleFilter) -> DbResult<Vec<Invoice>> {
        let limit = if filter.limit == 0 { 100 } else { filter.limit };

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE (?1 IS NULL OR created_at >= ?1)
              AND (?2 IS NULL OR created_at < ?2)
              AND (?3 IS NULL OR customer_id = ?3)
              AND (?4 IS NULL OR status = ?4)
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?5
            "#
        ))
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.customer_id.as_deref())
        .bind(filter.status)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(invoices)
    }

    /// Applies a return in one transaction.
    ///
    /// ## What Changes
    /// ```text
    /// invoice_items.returned_quantity += qty      products.stock += qty
    /// invoices.returned_*  += refund              outstanding -= debt part
    /// invoices.paid_*      -= cash part           status re-derived
    /// debts.remaining      -= debt part           customers.balance -= debt part
    /// payments  (refund row, negative, cash part) audit_logs (RETURN_APPLIED)
    /// ```
    pub async fn apply_return(
        &self,
        invoice_id: &str,
        requests: &[ReturnRequestLine],
        user_id: Option<&str>,
    ) -> DbResult<ReturnReceipt> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let invoice = fetch_invoice(&mut tx, invoice_id)
            .await?
            .ok_or_else(|| invoice_not_found(invoice_id))?;
        let items = fetch_items(&mut tx, invoice_id).await?;

        let returnable: Vec<ReturnableLine> = items.iter().map(ReturnableLine::from).collect();
        let plan = plan_return(&returnable, requests, &ReturnContext::from(&invoice))?;

        for line in &plan.lines {
            sqlx::query("UPDATE invoice_items SET returned_quantity = ?2 WHERE id = ?1")
                .bind(&line.item_id)
                .bind(line.returned_after)
                .execute(&mut *tx)
                .await?;
            product::shift_stock(&mut tx, &line.product_id, line.quantity).await?;
        }

        // Debt part first, the rest leaves the till as cash.
        let reduced = InvoiceAmounts::of(&invoice)
            .reduce_outstanding(plan.debt_reduction_afn, plan.debt_reduction_usd);
        let paid_afn = (reduced.paid_afn - plan.cash_refund_afn).non_negative();
        let paid_usd = (reduced.paid_usd - plan.cash_refund_usd).non_negative();
        let amounts = InvoiceAmounts {
            paid_afn,
            paid_usd,
            status: derive_invoice_status(paid_afn, reduced.outstanding_afn),
            ..reduced
        };
        save_amounts(&mut tx, invoice_id, &amounts).await?;

        sqlx::query(
            r#"
            UPDATE invoices
            SET returned_usd = returned_usd + ?2, returned_afn = returned_afn + ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(invoice_id)
        .bind(plan.refund_usd)
        .bind(plan.refund_afn)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if plan.debt_reduction_afn.is_positive() {
            if let Some(debt) = debt::for_invoice(&mut tx, invoice_id).await? {
                debt::write_off(&mut tx, &debt.id, plan.debt_reduction_afn).await?;
            }
            if let Some(customer_id) = &invoice.customer_id {
                if let Some(customer) = customer::fetch(&mut tx, customer_id).await? {
                    let balance = customer
                        .balance()
                        .apply_payment(plan.debt_reduction_afn, invoice.exchange_rate);
                    customer::save_balance(&mut tx, customer_id, balance).await?;
                }
            }
        }

        let payment = if plan.cash_refund_afn.is_positive() {
            let payment = Payment {
                id: Uuid::new_v4().to_string(),
                customer_id: invoice.customer_id.clone(),
                invoice_id: Some(invoice.id.clone()),
                kind: PaymentKind::Refund,
                method: PaymentMethod::Cash,
                amount_afn: -plan.cash_refund_afn,
                amount_usd: -plan.cash_refund_usd,
                exchange_rate: invoice.exchange_rate,
                note: Some("returned goods".to_string()),
                user_id: user_id.map(str::to_string),
                created_at: now,
            };
            insert_payment(&mut tx, &payment).await?;
            Some(payment)
        } else {
            None
        };

        audit::append(
            &mut tx,
            AuditEntry::new(AuditAction::ReturnApplied, "invoice", invoice_id)
                .details(json!({
                    "invoice_number": invoice.invoice_number,
                    "lines": plan.lines,
                    "refund_afn": plan.refund_afn,
                    "debt_reduction_afn": plan.debt_reduction_afn,
                    "cash_refund_afn": plan.cash_refund_afn,
                }))
                .by(user_id),
        )
        .await?;

        let invoice = fetch_invoice(&mut tx, invoice_id)
            .await?
            .ok_or_else(|| invoice_not_found(invoice_id))?;
        tx.commit().await?;

        info!(
            invoice_number = %invoice.invoice_number,
            refund_afn = %plan.refund_afn,
            cash_refund_afn = %plan.cash_refund_afn,
            "Return applied"
        );

        Ok(ReturnReceipt {
            invoice,
            refund: plan,
            payment,
        })
    }

    /// Deletes one invoice, reversing its effect on stock and the customer.
    pub async fn delete_sale(&self, id: &str, user_id: Option<&str>) -> DbResult<Invoice> {
        let mut tx = self.pool.begin().await?;
        let invoice = delete_in_tx(&mut tx, id, user_id).await?;
        tx.commit().await?;

        info!(invoice_number = %invoice.invoice_number, "Sale deleted");
        Ok(invoice)
    }

    /// Deletes several invoices atomically: all of them or none.
    pub async fn bulk_delete(
        &self,
        ids: &[String],
        user_id: Option<&str>,
    ) -> DbResult<Vec<Invoice>> {
        let mut tx = self.pool.begin().await?;
        let mut deleted = Vec::with_capacity(ids.len());
        for id in ids {
            deleted.push(delete_in_tx(&mut tx, id, user_id).await?);
        }
        tx.commit().await?;

        info!(count = deleted.len(), "Sales bulk deleted");
        Ok(deleted)
    }
}

/// Reverses and removes an invoice.
///
/// ```text
/// stock            += units not yet returned
/// customer balance -= what is still outstanding
///                  += credit banked at checkout
///                  -= store credit spent at checkout
/// items, debt and invoice-bound payments go with the invoice (cascade)
/// ```
async fn delete_in_tx(
    conn: &mut SqliteConnection,
    id: &str,
    user_id: Option<&str>,
) -> DbResult<Invoice> {
    let invoice = fetch_invoice(conn, id)
        .await?
        .ok_or_else(|| invoice_not_found(id))?;
    let items = fetch_items(conn, id).await?;

    for item in &items {
        let units = item.returnable_quantity();
        if units > 0 {
            product::shift_stock(conn, &item.product_id, units).await?;
        }
    }

    if let Some(customer_id) = &invoice.customer_id {
        if let Some(customer) = customer::fetch(conn, customer_id).await? {
            let rate = invoice.exchange_rate;
            let before = customer.balance();
            let mut balance = before;

            if invoice.outstanding_afn.is_positive() {
                balance = balance.apply_payment(invoice.outstanding_afn, rate);
            }
            if invoice.stored_credit_afn.is_positive() {
                balance = balance.apply_debt(invoice.stored_credit_afn, rate);
            }
            let spent_credit = sqlx::query_scalar::<_, Money>(
                r#"
                SELECT COALESCE(SUM(amount_afn), 0) FROM payments
                WHERE invoice_id = ?1 AND kind = ?2 AND method = ?3
                "#,
            )
            .bind(id)
            .bind(PaymentKind::Sale)
            .bind(PaymentMethod::Credit)
            .fetch_one(&mut *conn)
            .await?;
            if spent_credit.is_positive() {
                balance = balance.apply_payment(spent_credit, rate);
            }

            if balance != before {
                customer::save_balance(conn, customer_id, balance).await?;
            }
        }
    }

    sqlx::query("DELETE FROM invoices WHERE id = ?1")
        .bind(id)
        .execute(&mut *conn)
        .await?;

    audit::append(
        conn,
        AuditEntry::new(AuditAction::SaleDeleted, "invoice", id)
            .details(json!({
                "invoice_number": invoice.invoice_number,
                "customer_id": invoice.customer_id,
                "total_afn": invoice.total_afn,
                "outstanding_afn": invoice.outstanding_afn,
                "items": items.iter().map(|i| json!({
                    "sku": i.sku_snapshot,
                    "quantity": i.quantity,
                    "returned_quantity": i.returned_quantity,
                })).collect::<Vec<_>>(),
            }))
            .by(user_id),
    )
    .await?;

    Ok(invoice)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::customer::tests::new_customer;
    use crate::repository::product::tests::new_product;
    use crate::{Database, DbConfig};
    use chrono::{Duration, NaiveDate};
    use dukan_core::checkout::OverpaymentMode;
    use dukan_core::{CheckoutError, DebtStatus};

    async fn setup() -> (Database, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        // $60 oil and $20 tea at the default rate of 70
        let oil = db.products().insert(new_product("OIL-5L", 6_000, 10), None).await.unwrap();
        let tea = db.products().insert(new_product("TEA-500", 2_000, 10), None).await.unwrap();
        (db, oil.id, tea.id)
    }

    fn cart(oil: &str, tea: &str) -> Vec<SaleLineRequest> {
        vec![
            SaleLineRequest { product_id: oil.to_string(), quantity: 1 },
            SaleLineRequest { product_id: tea.to_string(), quantity: 2 },
        ]
    }

    fn sale(items: Vec<SaleLineRequest>, tender: Tender) -> NewSale {
        NewSale {
            items,
            discount: DiscountRate::from_bps(1000),
            tender,
            method: PaymentMethod::Cash,
            notes: None,
            user_id: None,
        }
    }

    fn due_in(days: i64) -> NaiveDate {
        (Utc::now() + Duration::days(days)).date_naive()
    }

    #[tokio::test]
    async fn test_cash_sale_paid_in_full() {
        let (db, oil, tea) = setup().await;

        let receipt = db
            .sales()
            .create_sale(sale(cart(&oil, &tea), Tender::cash(Money::from_cents(630_000))))
            .await
            .unwrap();

        let invoice = &receipt.invoice;
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.total_usd.cents(), 9_000);
        assert_eq!(invoice.total_afn.cents(), 630_000);
        assert_eq!(invoice.outstanding_afn, Money::zero());
        assert!(invoice.invoice_number.starts_with("INV-"));
        assert!(invoice.invoice_number.ends_with("-0001"));
        assert!(receipt.debt.is_none());
        assert_eq!(receipt.payment.as_ref().unwrap().amount_afn.cents(), 630_000);

        let oil = db.products().get_by_id(&oil).await.unwrap().unwrap();
        assert_eq!(oil.stock, 9);
        let tea = db.products().get_by_id(&tea).await.unwrap().unwrap();
        assert_eq!(tea.stock, 8);

        let logs = db.audit_logs().for_entity("invoice", &invoice.id).await.unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action, AuditAction::SaleCreated);
    }

    #[tokio::test]
    async fn test_quote_writes_nothing() {
        let (db, oil, tea) = setup().await;

        let exact = db
            .sales()
            .quote(&cart(&oil, &tea), DiscountRate::from_bps(1000), None)
            .await
            .unwrap();
        assert_eq!(exact.totals.total_afn.cents(), 630_000);
        assert_eq!(exact.status, InvoiceStatus::Paid);

        let change = db
            .sales()
            .quote(
                &cart(&oil, &tea),
                DiscountRate::from_bps(1000),
                Some(Tender::cash(Money::from_cents(700_000))),
            )
            .await
            .unwrap();
        assert_eq!(change.change_afn.cents(), 70_000);

        let oil = db.products().get_by_id(&oil).await.unwrap().unwrap();
        assert_eq!(oil.stock, 10);
        assert!(db.sales().list(&SaleFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invoice_numbers_increment() {
        let (db, oil, tea) = setup().await;
        let first = db
            .sales()
            .create_sale(sale(cart(&oil, &tea), Tender::cash(Money::from_cents(630_000))))
            .await
            .unwrap();
        let second = db
            .sales()
            .create_sale(sale(cart(&oil, &tea), Tender::cash(Money::from_cents(630_000))))
            .await
            .unwrap();
        assert!(second.invoice.invoice_number.ends_with("-0002"));
        assert_ne!(first.invoice.invoice_number, second.invoice.invoice_number);
    }

    #[tokio::test]
    async fn test_walk_in_shortfall_is_rejected_and_rolled_back() {
        let (db, oil, tea) = setup().await;

        let err = db
            .sales()
            .create_sale(sale(cart(&oil, &tea), Tender::cash(Money::from_cents(300_000))))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::Checkout(CheckoutError::CustomerRequiredForCredit))
        ));

        let oil = db.products().get_by_id(&oil).await.unwrap().unwrap();
        assert_eq!(oil.stock, 10);
        assert!(db.sales().list(&SaleFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_credit_sale_creates_debt_and_balance() {
        let (db, oil, tea) = setup().await;
        let customer = db.customers().insert(new_customer("Ahmad"), None).await.unwrap();

        let tender = Tender::cash(Money::from_cents(300_000))
            .for_customer(&customer.id)
            .due(due_in(30));
        let receipt = db.sales().create_sale(sale(cart(&oil, &tea), tender)).await.unwrap();

        assert_eq!(receipt.invoice.status, InvoiceStatus::Partial);
        assert_eq!(receipt.invoice.outstanding_afn.cents(), 330_000);
        assert_eq!(
            receipt.invoice.paid_afn + receipt.invoice.outstanding_afn,
            receipt.invoice.total_afn
        );

        let debt = receipt.debt.unwrap();
        assert_eq!(debt.remaining_balance_afn.cents(), 330_000);
        assert_eq!(debt.status(Utc::now()), DebtStatus::Active);

        let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(customer.outstanding_balance_afn, Some(Money::from_cents(330_000)));
        assert_eq!(customer.outstanding_balance_usd.cents(), 4_714);
    }

    #[tokio::test]
    async fn test_credit_limit_is_enforced() {
        let (db, oil, tea) = setup().await;
        let customer = db
            .customers()
            .insert(
                crate::repository::NewCustomer {
                    credit_limit_usd: Some(Money::from_cents(1_000)),
                    ..new_customer("Limited")
                },
                None,
            )
            .await
            .unwrap();

        let tender = Tender::cash(Money::zero()).for_customer(&customer.id).due(due_in(7));
        let err = db.sales().create_sale(sale(cart(&oil, &tea), tender)).await.unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::Checkout(CheckoutError::CreditLimitExceeded { .. }))
        ));
    }

    #[tokio::test]
    async fn test_overpayment_stored_as_credit() {
        let (db, oil, tea) = setup().await;
        let customer = db.customers().insert(new_customer("Bashir"), None).await.unwrap();

        let tender = Tender::cash(Money::from_cents(700_000))
            .for_customer(&customer.id)
            .overpayment(OverpaymentMode::StoreAsCredit);
        let receipt = db.sales().create_sale(sale(cart(&oil, &tea), tender)).await.unwrap();

        assert_eq!(receipt.credit_afn.cents(), 70_000);
        assert_eq!(receipt.invoice.stored_credit_afn.cents(), 70_000);
        assert_eq!(receipt.payment.unwrap().amount_afn.cents(), 700_000);

        let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(customer.outstanding_balance_afn, Some(Money::from_cents(-70_000)));

        // Spend the credit on a second sale
        let tea_only = vec![SaleLineRequest { product_id: tea.clone(), quantity: 1 }];
        let tender = Tender::cash(Money::from_cents(126_000)).for_customer(&customer.id);
        let mut spend = sale(tea_only, tender);
        spend.method = PaymentMethod::Credit;
        let err = db.sales().create_sale(spend.clone()).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvalidPaymentAmount { .. })));

        spend.discount = DiscountRate::from_bps(5000);
        spend.tender.amount_afn = Money::from_cents(70_000);
        db.sales().create_sale(spend).await.unwrap();
        let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(customer.outstanding_balance_afn, Some(Money::zero()));
    }

    #[tokio::test]
    async fn test_insufficient_stock_counts_repeated_lines() {
        let (db, oil, _) = setup().await;
        let items = vec![
            SaleLineRequest { product_id: oil.clone(), quantity: 6 },
            SaleLineRequest { product_id: oil.clone(), quantity: 6 },
        ];
        let err = db
            .sales()
            .create_sale(sale(items, Tender::cash(Money::from_cents(10_000_000))))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::Core(CoreError::InsufficientStock { requested: 12, .. })
        ));
    }

    #[tokio::test]
    async fn test_return_reduces_debt_first() {
        let (db, oil, tea) = setup().await;
        let customer = db.customers().insert(new_customer("Karim"), None).await.unwrap();

        let tender = Tender::cash(Money::from_cents(300_000))
            .for_customer(&customer.id)
            .due(due_in(30));
        let receipt = db.sales().create_sale(sale(cart(&oil, &tea), tender)).await.unwrap();
        let oil_item = receipt.items.iter().find(|i| i.product_id == oil).unwrap();

        // Oil is $60 at 70 = ؋4200; outstanding is ؋3300
        let returned = db
            .sales()
            .apply_return(
                &receipt.invoice.id,
                &[ReturnRequestLine { item_id: oil_item.id.clone(), quantity: 1 }],
                None,
            )
            .await
            .unwrap();

        assert_eq!(returned.refund.refund_afn.cents(), 420_000);
        assert_eq!(returned.refund.debt_reduction_afn.cents(), 330_000);
        assert_eq!(returned.refund.cash_refund_afn.cents(), 90_000);
        assert_eq!(returned.payment.unwrap().amount_afn.cents(), -90_000);

        let invoice = returned.invoice;
        assert_eq!(invoice.outstanding_afn, Money::zero());
        assert_eq!(invoice.status, InvoiceStatus::Paid);
        assert_eq!(invoice.returned_afn.cents(), 420_000);
        assert_eq!(invoice.paid_afn + invoice.outstanding_afn, invoice.effective_total_afn());

        let debt = db.debts().for_invoice(&invoice.id).await.unwrap().unwrap();
        assert_eq!(debt.remaining_balance_afn, Money::zero());
        assert!(debt.settled_at.is_some());

        let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(customer.outstanding_balance_afn, Some(Money::zero()));

        let oil = db.products().get_by_id(&oil).await.unwrap().unwrap();
        assert_eq!(oil.stock, 10);

        // The same unit cannot come back twice
        let again = db
            .sales()
            .apply_return(
                &invoice.id,
                &[ReturnRequestLine { item_id: oil_item.id.clone(), quantity: 1 }],
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(again, DbError::Core(CoreError::ReturnExceedsSold { .. })));
    }

    #[tokio::test]
    async fn test_delete_sale_restores_stock_and_balance() {
        let (db, oil, tea) = setup().await;
        let customer = db.customers().insert(new_customer("Nadia"), None).await.unwrap();

        let tender = Tender::cash(Money::from_cents(100_000))
            .for_customer(&customer.id)
            .due(due_in(10));
        let receipt = db.sales().create_sale(sale(cart(&oil, &tea), tender)).await.unwrap();

        let deleted = db.sales().delete_sale(&receipt.invoice.id, None).await.unwrap();
        assert_eq!(deleted.id, receipt.invoice.id);

        assert!(db.sales().get_by_id(&receipt.invoice.id).await.unwrap().is_none());
        assert!(db.debts().for_invoice(&receipt.invoice.id).await.unwrap().is_none());

        let oil = db.products().get_by_id(&oil).await.unwrap().unwrap();
        assert_eq!(oil.stock, 10);

        let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(customer.outstanding_balance_afn, Some(Money::zero()));

        let logs = db.audit_logs().for_entity("invoice", &receipt.invoice.id).await.unwrap();
        assert_eq!(logs.last().unwrap().action, AuditAction::SaleDeleted);
    }

    #[tokio::test]
    async fn test_bulk_delete_is_all_or_nothing() {
        let (db, oil, tea) = setup().await;
        let receipt = db
            .sales()
            .create_sale(sale(cart(&oil, &tea), Tender::cash(Money::from_cents(630_000))))
            .await
            .unwrap();

        let ids = vec![receipt.invoice.id.clone(), "missing".to_string()];
        let err = db.sales().bulk_delete(&ids, None).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::InvoiceNotFound(_))));
        assert!(db.sales().get_by_id(&receipt.invoice.id).await.unwrap().is_some());

        let deleted = db.sales().bulk_delete(&ids[..1], None).await.unwrap();
        assert_eq!(deleted.len(), 1);
    }

    #[tokio::test]
    async fn test_detail_and_list() {
        let (db, oil, tea) = setup().await;
        let receipt = db
            .sales()
            .create_sale(sale(cart(&oil, &tea), Tender::cash(Money::from_cents(650_000))))
            .await
            .unwrap();
        assert_eq!(receipt.change_afn.cents(), 20_000);

        let detail = db.sales().get_detail(&receipt.invoice.id).await.unwrap().unwrap();
        assert_eq!(detail.items.len(), 2);
        assert_eq!(detail.payments.len(), 1);
        assert_eq!(detail.payments[0].amount_afn.cents(), 630_000);

        let today = SaleFilter {
            from: Some(Utc::now() - Duration::hours(1)),
            to: Some(Utc::now() + Duration::hours(1)),
            ..Default::default()
        };
        assert_eq!(db.sales().list(&today).await.unwrap().len(), 1);

        let paid_only = SaleFilter {
            status: Some(InvoiceStatus::Unpaid),
            ..Default::default()
        };
        assert!(db.sales().list(&paid_only).await.unwrap().is_empty());
    }
}
