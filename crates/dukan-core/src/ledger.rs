//! # Ledger Module
//!
//! Balance arithmetic for customers, debts and invoices.
//!
//! ## Events That Move a Balance
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Event               Customer balance        Debt            Invoice    │
//! │  ─────────────────   ─────────────────────   ─────────────   ────────── │
//! │  credit sale         + shortfall (AFN)       new record      PARTIAL /  │
//! │                                                              UNPAID     │
//! │  payment received    - amount (AFN, exact)   oldest due      paid +=    │
//! │                                              first           outst. -=  │
//! │  refund (A < 0)      + |amount|              untouched       untouched  │
//! │  overpay as credit   - excess                untouched       PAID       │
//! │  return              - refund applied        remaining -=    outst. -=  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! AFN is authoritative for every customer-facing amount. USD moves in step,
//! derived by dividing by an exchange rate.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CheckoutError;
use crate::money::{ExchangeRate, Money};
use crate::types::{Debt, DebtStatus, Invoice, InvoiceStatus};
use crate::DUE_SOON_WINDOW_HOURS;

// =============================================================================
// Status Derivation
// =============================================================================

/// Derives an invoice status from its paid and outstanding amounts.
///
/// ```rust
/// use dukan_core::ledger::derive_invoice_status;
/// use dukan_core::{InvoiceStatus, Money};
///
/// let s = derive_invoice_status(Money::from_cents(630_000), Money::from_cents(3));
/// assert_eq!(s, InvoiceStatus::Paid);
/// ```
pub fn derive_invoice_status(paid: Money, outstanding: Money) -> InvoiceStatus {
    if !outstanding.exceeds_tolerance() {
        InvoiceStatus::Paid
    } else if !paid.exceeds_tolerance() {
        InvoiceStatus::Unpaid
    } else {
        InvoiceStatus::Partial
    }
}

/// The instant a debt becomes overdue: the end of its due date (UTC).
pub fn due_deadline(due_date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&due_date.and_time(NaiveTime::MIN)) + Duration::days(1)
}

/// Derives a debt status.
///
/// ```text
/// remaining ≤ 0.05            → SETTLED
/// now ≥ end of due date        → OVERDUE
/// end of due date - now ≤ 24h → DUE_SOON
/// otherwise                   → ACTIVE
/// ```
pub fn derive_debt_status(remaining: Money, due_date: NaiveDate, now: DateTime<Utc>) -> DebtStatus {
    if !remaining.exceeds_tolerance() {
        return DebtStatus::Settled;
    }

    let deadline = due_deadline(due_date);
    if now >= deadline {
        DebtStatus::Overdue
    } else if deadline - now <= Duration::hours(DUE_SOON_WINDOW_HOURS) {
        DebtStatus::DueSoon
    } else {
        DebtStatus::Active
    }
}

// =============================================================================
// Customer Balance
// =============================================================================

/// A customer's outstanding balance in both currencies.
///
/// `afn_fixed`, when present, is the authoritative AFN amount. Without it the
/// AFN figure floats with the current exchange rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CustomerBalance {
    pub usd: Money,
    pub afn_fixed: Option<Money>,
}

impl CustomerBalance {
    pub fn new(usd: Money, afn_fixed: Option<Money>) -> Self {
        CustomerBalance { usd, afn_fixed }
    }

    pub fn zero() -> Self {
        CustomerBalance::new(Money::zero(), None)
    }

    /// The AFN balance shown to the operator.
    ///
    /// ```rust
    /// use dukan_core::ledger::CustomerBalance;
    /// use dukan_core::{ExchangeRate, Money};
    ///
    /// let rate = ExchangeRate::from_scaled(700_000);
    /// let floating = CustomerBalance::new(Money::from_cents(1000), None);
    /// assert_eq!(floating.displayed_afn(rate).cents(), 70_000);
    ///
    /// let fixed = CustomerBalance::new(Money::from_cents(1000), Some(Money::from_cents(68_000)));
    /// assert_eq!(fixed.displayed_afn(rate).cents(), 68_000);
    /// ```
    pub fn displayed_afn(&self, rate: ExchangeRate) -> Money {
        self.afn_fixed.unwrap_or_else(|| rate.usd_to_afn(self.usd))
    }

    /// Adds a debt of `afn`.
    ///
    /// Pins the AFN balance on first use so it stops floating with the rate.
    pub fn apply_debt(self, afn: Money, rate: ExchangeRate) -> Self {
        CustomerBalance {
            usd: self.usd + rate.afn_to_usd(afn),
            afn_fixed: Some(self.displayed_afn(rate) + afn),
        }
    }

    /// Records a payment of `afn` from the customer.
    ///
    /// The displayed AFN balance drops by exactly `afn`. A negative amount is
    /// a refund to the customer and raises the balance.
    pub fn apply_payment(self, afn: Money, rate: ExchangeRate) -> Self {
        CustomerBalance {
            usd: self.usd - rate.afn_to_usd(afn),
            afn_fixed: Some(self.displayed_afn(rate) - afn),
        }
    }

    /// True when the shop owes the customer (stored credit).
    pub fn is_credit(&self, rate: ExchangeRate) -> bool {
        (-self.displayed_afn(rate)).exceeds_tolerance()
    }
}

impl Default for CustomerBalance {
    fn default() -> Self {
        CustomerBalance::zero()
    }
}

/// Rejects a new debt that would push the USD balance past the credit limit.
pub fn check_credit_limit(
    balance: CustomerBalance,
    limit_usd: Option<Money>,
    new_debt_usd: Money,
) -> Result<(), CheckoutError> {
    let Some(limit) = limit_usd else {
        return Ok(());
    };

    let balance_after = balance.usd + new_debt_usd;
    if (balance_after - limit).exceeds_tolerance() {
        return Err(CheckoutError::CreditLimitExceeded {
            limit: limit.to_string(),
            balance_after: balance_after.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Invoice Settlement
// =============================================================================

/// Paid/outstanding figures of an invoice after a ledger event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceAmounts {
    pub paid_afn: Money,
    pub paid_usd: Money,
    pub outstanding_afn: Money,
    pub outstanding_usd: Money,
    pub status: InvoiceStatus,
}

impl InvoiceAmounts {
    pub fn of(invoice: &Invoice) -> Self {
        InvoiceAmounts {
            paid_afn: invoice.paid_afn,
            paid_usd: invoice.paid_usd,
            outstanding_afn: invoice.outstanding_afn,
            outstanding_usd: invoice.outstanding_usd,
            status: invoice.status,
        }
    }

    /// Applies a payment of `afn` (capped at what is outstanding).
    ///
    /// USD moves with the invoice's own rate so the USD columns keep adding
    /// up to the USD total.
    pub fn pay(self, afn: Money, invoice_rate: ExchangeRate) -> Self {
        let afn = afn.min(self.outstanding_afn).non_negative();
        let outstanding_afn = self.outstanding_afn - afn;
        let paid_afn = self.paid_afn + afn;

        let (paid_usd, outstanding_usd) = if outstanding_afn.exceeds_tolerance() {
            let usd = invoice_rate.afn_to_usd(afn).min(self.outstanding_usd);
            (self.paid_usd + usd, self.outstanding_usd - usd)
        } else {
            (self.paid_usd + self.outstanding_usd, Money::zero())
        };

        InvoiceAmounts {
            paid_afn,
            paid_usd,
            outstanding_afn,
            outstanding_usd,
            status: derive_invoice_status(paid_afn, outstanding_afn),
        }
    }

    /// Writes off `afn` of the outstanding amount without a payment (returns).
    pub fn reduce_outstanding(self, afn: Money, usd: Money) -> Self {
        let outstanding_afn = (self.outstanding_afn - afn).non_negative();
        let outstanding_usd = (self.outstanding_usd - usd).non_negative();
        let (outstanding_afn, outstanding_usd) = if outstanding_afn.exceeds_tolerance() {
            (outstanding_afn, outstanding_usd)
        } else {
            (Money::zero(), Money::zero())
        };

        InvoiceAmounts {
            outstanding_afn,
            outstanding_usd,
            status: derive_invoice_status(self.paid_afn, outstanding_afn),
            ..self
        }
    }
}

// =============================================================================
// Payment Allocation
// =============================================================================

/// An open debt as seen by [`allocate_payment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenDebt {
    pub debt_id: String,
    pub invoice_id: String,
    pub remaining_afn: Money,
    pub due_date: NaiveDate,
    pub created_at: DateTime<Utc>,
}

impl From<&Debt> for OpenDebt {
    fn from(debt: &Debt) -> Self {
        OpenDebt {
            debt_id: debt.id.clone(),
            invoice_id: debt.invoice_id.clone(),
            remaining_afn: debt.remaining_balance_afn,
            due_date: debt.due_date,
            created_at: debt.created_at,
        }
    }
}

/// The part of a payment that goes to one debt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DebtAllocation {
    pub debt_id: String,
    pub invoice_id: String,
    pub amount_afn: Money,
    pub remaining_after_afn: Money,
    pub settles: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentAllocation {
    pub allocations: Vec<DebtAllocation>,
    /// Left over after every debt is covered. Becomes customer credit.
    pub unallocated_afn: Money,
}

/// Spreads a payment over open debts, oldest due date first.
///
/// Non-positive amounts are not allocated: a refund raises the customer
/// balance but does not reopen settled debts.
///
/// ```text
/// payment ؋5000     debts (by due date): A ؋3000, B ؋4000
///                   → A gets ؋3000 (settled), B gets ؋2000, unallocated ؋0
/// ```
pub fn allocate_payment(amount_afn: Money, debts: &[OpenDebt]) -> PaymentAllocation {
    if !amount_afn.is_positive() {
        return PaymentAllocation {
            allocations: Vec::new(),
            unallocated_afn: Money::zero(),
        };
    }

    let mut ordered: Vec<&OpenDebt> = debts
        .iter()
        .filter(|d| d.remaining_afn.exceeds_tolerance())
        .collect();
    ordered.sort_by(|a, b| {
        a.due_date
            .cmp(&b.due_date)
            .then(a.created_at.cmp(&b.created_at))
    });

    let mut left = amount_afn;
    let mut allocations = Vec::new();
    for debt in ordered {
        if !left.is_positive() {
            break;
        }
        let amount = left.min(debt.remaining_afn);
        let remaining_after = debt.remaining_afn - amount;
        left -= amount;
        allocations.push(DebtAllocation {
            debt_id: debt.debt_id.clone(),
            invoice_id: debt.invoice_id.clone(),
            amount_afn: amount,
            remaining_after_afn: remaining_after,
            settles: !remaining_after.exceeds_tolerance(),
        });
    }

    PaymentAllocation {
        allocations,
        unallocated_afn: left,
    }
}

// =============================================================================
// Debt Summary
// =============================================================================

/// Count and AFN total of debts in one status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DebtBucket {
    pub count: i64,
    pub amount_afn: Money,
}

impl DebtBucket {
    fn add(&mut self, amount: Money) {
        self.count += 1;
        self.amount_afn += amount;
    }
}

/// Debts grouped by derived status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DebtSummary {
    pub total_outstanding_afn: Money,
    pub active: DebtBucket,
    pub due_soon: DebtBucket,
    pub overdue: DebtBucket,
    pub settled: DebtBucket,
}

impl DebtSummary {
    pub fn from_debts<'a>(debts: impl IntoIterator<Item = &'a Debt>, now: DateTime<Utc>) -> Self {
        let mut summary = DebtSummary::default();
        for debt in debts {
            let remaining = debt.remaining_balance_afn;
            match debt.status(now) {
                DebtStatus::Active => summary.active.add(remaining),
                DebtStatus::DueSoon => summary.due_soon.add(remaining),
                DebtStatus::Overdue => summary.overdue.add(remaining),
                DebtStatus::Settled => summary.settled.add(debt.original_amount_afn),
            }
            if remaining.exceeds_tolerance() {
                summary.total_outstanding_afn += remaining;
            }
        }
        summary
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
