//! # Payment Repository
//!
//! Payments received against a customer's debts.
//!
//! A payment is spread over the customer's open debts, earliest due date
//! first. Each debt's invoice moves with it. Whatever is left after every
//! debt is settled stays on the customer's balance as store credit.
//!
//! ```text
//! ؋5,000 received
//!   ├── debt A (due 01-10)  ؋3,000 → settled     invoice A → PAID
//!   ├── debt B (due 15-10)  ؋4,000 → ؋2,000 left invoice B → PARTIAL
//!   └── unallocated ؋0
//! ```

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::SqlitePool;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::audit::{self, AuditEntry};
use crate::repository::sale::{fetch_invoice, insert_payment, save_amounts, PAYMENT_COLUMNS};
use crate::repository::{customer, debt, settings};
use dukan_core::ledger::{allocate_payment, InvoiceAmounts, PaymentAllocation};
use dukan_core::validation::{validate_optional_text, validate_payment_amount};
use dukan_core::{AuditAction, CoreError, Customer, Money, Payment, PaymentKind, PaymentMethod};

/// A payment handed over by a customer.
///
/// A negative amount is a refund of store credit to the customer.
#[derive(Debug, Clone, Deserialize)]
pub struct ReceivePayment {
    pub amount_afn: Money,
    #[serde(default)]
    pub method: PaymentMethod,
    pub note: Option<String>,
}

/// The recorded payment, where it went, and the customer afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub payment: Payment,
    pub allocation: PaymentAllocation,
    pub customer: Customer,
}

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    /// Records a payment from `customer_id` and settles debts oldest-due first.
    pub async fn receive_payment(
        &self,
        customer_id: &str,
        request: ReceivePayment,
        user_id: Option<&str>,
    ) -> DbResult<PaymentReceipt> {
        validate_payment_amount(request.amount_afn)?;
        validate_optional_text("note", request.note.as_deref(), 500)?;
        if request.method == PaymentMethod::Credit {
            return Err(CoreError::InvalidPaymentAmount {
                reason: "a debt cannot be paid with store credit".to_string(),
            }
            .into());
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let customer = customer::fetch(&mut tx, customer_id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?;
        let rate = settings::exchange_rate(&mut tx).await?;

        let open = debt::open_for_customer(&mut tx, customer_id).await?;
        let allocation = allocate_payment(request.amount_afn, &open);

        for part in &allocation.allocations {
            debug!(debt_id = %part.debt_id, amount_afn = %part.amount_afn, "Allocating payment");
            debt::apply_payment(&mut tx, &part.debt_id, part.amount_afn).await?;

            let invoice = fetch_invoice(&mut tx, &part.invoice_id)
                .await?
                .ok_or_else(|| DbError::Corrupt(format!("debt {} has no invoice", part.debt_id)))?;
            let amounts = InvoiceAmounts::of(&invoice).pay(part.amount_afn, invoice.exchange_rate);
            save_amounts(&mut tx, &invoice.id, &amounts).await?;
        }

        let kind = if request.amount_afn.is_negative() {
            PaymentKind::Refund
        } else {
            PaymentKind::DebtPayment
        };
        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            customer_id: Some(customer.id.clone()),
            invoice_id: None,
            kind,
            method: request.method,
            amount_afn: request.amount_afn,
            amount_usd: rate.afn_to_usd(request.amount_afn),
            exchange_rate: rate,
            note: request.note.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            user_id: user_id.map(str::to_string),
            created_at: now,
        };
        insert_payment(&mut tx, &payment).await?;

        let balance = customer.balance().apply_payment(request.amount_afn, rate);
        customer::save_balance(&mut tx, customer_id, balance).await?;

        audit::append(
            &mut tx,
            AuditEntry::new(AuditAction::PaymentReceived, "customer", customer_id)
                .details(json!({
                    "payment_id": payment.id,
                    "amount_afn": payment.amount_afn,
                    "method": payment.method,
                    "exchange_rate": rate,
                    "allocations": allocation.allocations,
                    "unallocated_afn": allocation.unallocated_afn,
                }))
                .by(user_id),
        )
        .await?;

        let customer = customer::fetch(&mut tx, customer_id)
            .await?
            .ok_or_else(|| CoreError::CustomerNotFound(customer_id.to_string()))?;
        tx.commit().await?;

        info!(
            customer_id = %customer_id,
            amount_afn = %payment.amount_afn,
            settled = allocation.allocations.iter().filter(|a| a.settles).count(),
            "Payment received"
        );

        Ok(PaymentReceipt {
            payment,
            allocation,
            customer,
        })
    }

    /// Every payment row touching a customer, newest first.
    pub async fn list_for_customer(&self, customer_id: &str, limit: u32) -> DbResult<Vec<Payment>> {
        let payments = sqlx::query_as::<_, Payment>(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS}
            FROM payments
            WHERE customer_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#
        ))
        .bind(customer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(payments)
    }
}
