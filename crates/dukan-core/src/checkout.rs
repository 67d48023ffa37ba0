//! # Checkout Module
//!
//! Turns a cart into invoice figures and decides what happens to the money
//! the customer hands over.
//!
//! ## Checkout Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CartLine[] ──► price_cart() ──► CartTotals ──► settle() ──► Summary    │
//! │                    │                               │                    │
//! │                    │ per line:                     │ tendered vs total: │
//! │                    │  fixed AFN price? use it      │  ≈ total  → PAID   │
//! │                    │  else USD × rate              │  < total  → debt   │
//! │                    │                               │  > total  → change │
//! │                    │ subtotal - discount + tax     │             or     │
//! │                    │ AFN total → whole afghani     │             credit │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Worked Example
//! ```text
//! subtotal $100, rate 70, discount 10%
//!   subtotal  $100.00   ؋7000
//!   discount   $10.00    ؋700
//!   total      $90.00   ؋6300
//! tendered ؋6300 → PAID, outstanding 0
//! tendered ؋3000, no customer → CustomerRequiredForCredit
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CheckoutError, CoreError, ValidationError};
use crate::ledger::derive_invoice_status;
use crate::money::{DiscountRate, ExchangeRate, Money, MAX_AMOUNT};
use crate::types::{InvoiceStatus, Product, TaxRate};
use crate::validation::{validate_discount_bps, validate_price};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Cart Line
// =============================================================================

/// One product in the cart, with the prices frozen at the time it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub unit_price_usd: Money,
    /// Fixed AFN unit price, used instead of converting the USD price.
    pub fixed_price_afn: Option<Money>,
    pub unit_cost_usd: Money,
    pub quantity: i64,
}

impl CartLine {
    pub fn new(product_id: &str, name: &str, unit_price_usd: Money, quantity: i64) -> Self {
        CartLine {
            product_id: product_id.to_string(),
            sku: product_id.to_string(),
            name: name.to_string(),
            unit_price_usd,
            fixed_price_afn: None,
            unit_cost_usd: Money::zero(),
            quantity,
        }
    }

    /// Snapshots a product into a cart line.
    pub fn from_product(product: &Product, quantity: i64) -> Self {
        CartLine {
            product_id: product.id.clone(),
            sku: product.sku.clone(),
            name: product.name.clone(),
            unit_price_usd: product.price_usd,
            fixed_price_afn: product.price_afn,
            unit_cost_usd: product.cost_usd,
            quantity,
        }
    }

    pub fn with_fixed_afn(mut self, price_afn: Money) -> Self {
        self.fixed_price_afn = Some(price_afn);
        self
    }

    pub fn with_cost(mut self, cost_usd: Money) -> Self {
        self.unit_cost_usd = cost_usd;
        self
    }

    pub fn unit_price_afn(&self, rate: ExchangeRate) -> Money {
        self.fixed_price_afn
            .unwrap_or_else(|| rate.usd_to_afn(self.unit_price_usd))
    }

    /// USD unit price actually charged. For fixed-AFN lines this is derived
    /// from the AFN price, not the catalogue USD price.
    pub fn effective_unit_price_usd(&self, rate: ExchangeRate) -> Money {
        match self.fixed_price_afn {
            Some(afn) => rate.afn_to_usd(afn),
            None => self.unit_price_usd,
        }
    }

    pub fn line_total_afn(&self, rate: ExchangeRate) -> Money {
        self.unit_price_afn(rate) * self.quantity
    }

    pub fn line_total_usd(&self, rate: ExchangeRate) -> Money {
        match self.fixed_price_afn {
            Some(_) => rate.afn_to_usd(self.line_total_afn(rate)),
            None => self.unit_price_usd * self.quantity,
        }
    }
}

/// A cart line with every price resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedLine {
    pub product_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price_usd: Money,
    pub unit_price_afn: Money,
    pub unit_cost_usd: Money,
    pub line_total_usd: Money,
    pub line_total_afn: Money,
}

// =============================================================================
// Cart Totals
// =============================================================================

/// Invoice totals before any money changes hands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartTotals {
    pub lines: Vec<PricedLine>,
    pub discount_rate: DiscountRate,
    pub tax_rate: TaxRate,
    #[ts(type = "number")]
    pub exchange_rate: ExchangeRate,
    pub subtotal_usd: Money,
    pub discount_usd: Money,
    pub tax_usd: Money,
    pub total_usd: Money,
    pub subtotal_afn: Money,
    pub discount_afn: Money,
    pub tax_afn: Money,
    /// Rounded to the whole afghani.
    pub total_afn: Money,
}

impl CartTotals {
    /// Cost of goods for the whole cart.
    pub fn cost_usd(&self) -> Money {
        self.lines
            .iter()
            .map(|l| l.unit_cost_usd * l.quantity)
            .sum()
    }
}

fn validate_lines(lines: &[CartLine], rate: ExchangeRate) -> Result<(), CoreError> {
    if lines.is_empty() {
        return Err(CheckoutError::EmptyCart.into());
    }
    if lines.len() > MAX_CART_ITEMS {
        return Err(CoreError::CartTooLarge { max: MAX_CART_ITEMS });
    }
    for line in lines {
        if line.quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }
        if line.quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: line.quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }
        validate_price("price_usd", line.unit_price_usd)?;
        validate_price("cost_usd", line.unit_cost_usd)?;
        if let Some(afn) = line.fixed_price_afn {
            validate_price("price_afn", afn)?;
        }
        let line_afn = line.unit_price_afn(rate).checked_mul(line.quantity);
        let line_usd = line.unit_price_usd.checked_mul(line.quantity);
        let fits = |total: Option<Money>| total.is_some_and(|t| t.is_within_max());
        if !fits(line_afn) || !fits(line_usd) {
            return Err(ValidationError::OutOfRange {
                field: "line_total".to_string(),
                min: 0,
                max: MAX_AMOUNT.major(),
            }
            .into());
        }
    }
    Ok(())
}

/// Prices a cart: subtotal, discount, tax and total in both currencies.
///
/// ## Rules
/// - AFN unit price is the fixed AFN price when set, else USD × rate
/// - `discount = subtotal × percent`, `total = subtotal - discount + tax`
/// - AFN total is rounded to the whole afghani
pub fn price_cart(
    lines: &[CartLine],
    discount: DiscountRate,
    tax: TaxRate,
    rate: ExchangeRate,
) -> Result<CartTotals, CoreError> {
    validate_lines(lines, rate)?;
    validate_discount_bps(discount.bps())?;

    let priced: Vec<PricedLine> = lines
        .iter()
        .map(|line| PricedLine {
            product_id: line.product_id.clone(),
            sku: line.sku.clone(),
            name: line.name.clone(),
            quantity: line.quantity,
            unit_price_usd: line.effective_unit_price_usd(rate),
            unit_price_afn: line.unit_price_afn(rate),
            unit_cost_usd: line.unit_cost_usd,
            line_total_usd: line.line_total_usd(rate),
            line_total_afn: line.line_total_afn(rate),
        })
        .collect();

    let subtotal_usd: Money = priced.iter().map(|l| l.line_total_usd).sum();
    let subtotal_afn: Money = priced.iter().map(|l| l.line_total_afn).sum();

    let discount_usd = subtotal_usd.percentage(discount);
    let discount_afn = subtotal_afn.percentage(discount);

    let taxable_usd = subtotal_usd - discount_usd;
    let taxable_afn = subtotal_afn - discount_afn;
    let tax_usd = taxable_usd.calculate_tax(tax);
    let tax_afn = taxable_afn.calculate_tax(tax);

    Ok(CartTotals {
        lines: priced,
        discount_rate: discount,
        tax_rate: tax,
        exchange_rate: rate,
        subtotal_usd,
        discount_usd,
        tax_usd,
        total_usd: taxable_usd + tax_usd,
        subtotal_afn,
        discount_afn,
        tax_afn,
        total_afn: (taxable_afn + tax_afn).round_to_major(),
    })
}

// =============================================================================
// Tender
// =============================================================================

/// What to do with money handed over beyond the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum OverpaymentMode {
    /// Give the excess back; the recorded payment is capped at the total.
    #[default]
    ReturnChange,
    /// Keep the excess as customer credit; the full tender is recorded.
    StoreAsCredit,
}

/// The money side of a checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Tender {
    pub amount_afn: Money,
    pub customer_id: Option<String>,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub overpayment: OverpaymentMode,
}

impl Tender {
    /// Exact cash for a walk-in customer.
    pub fn cash(amount_afn: Money) -> Self {
        Tender {
            amount_afn,
            customer_id: None,
            due_date: None,
            overpayment: OverpaymentMode::ReturnChange,
        }
    }

    pub fn for_customer(mut self, customer_id: &str) -> Self {
        self.customer_id = Some(customer_id.to_string());
        self
    }

    pub fn due(mut self, due_date: NaiveDate) -> Self {
        self.due_date = Some(due_date);
        self
    }

    pub fn overpayment(mut self, mode: OverpaymentMode) -> Self {
        self.overpayment = mode;
        self
    }

    fn has_customer(&self) -> bool {
        self.customer_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty())
    }
}

// =============================================================================
// Checkout Summary
// =============================================================================

/// Everything needed to write the invoice, payment and debt rows.
///
/// Invariant: `paid + outstanding == total` in both currencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CheckoutSummary {
    pub totals: CartTotals,
    pub tendered_afn: Money,
    /// Applied to the invoice. Never more than the total.
    pub paid_afn: Money,
    pub paid_usd: Money,
    pub outstanding_afn: Money,
    pub outstanding_usd: Money,
    /// Handed back to the customer.
    pub change_afn: Money,
    /// Banked on the customer's account.
    pub credit_afn: Money,
    pub status: InvoiceStatus,
    /// True when the shortfall becomes a debt record.
    pub requires_debt: bool,
}

impl CheckoutSummary {
    /// Amount to record on the sale's payment row.
    pub fn payment_afn(&self) -> Money {
        self.paid_afn + self.credit_afn
    }
}

/// Decides paid / outstanding / change / credit for a priced cart.
///
/// ## Rules
/// ```text
/// |tendered - total| ≤ 0.05  → PAID, paid snapped to total
/// tendered < total           → debt: needs customer + due date
/// tendered > total           → ReturnChange: change = excess
///                              StoreAsCredit: credit = excess (needs customer)
/// ```
pub fn settle(totals: CartTotals, tender: &Tender) -> Result<CheckoutSummary, CheckoutError> {
    let tendered = tender.amount_afn;
    if tendered.is_negative() {
        return Err(CheckoutError::NegativeTender);
    }
    if !tendered.is_within_max() {
        return Err(CheckoutError::TenderTooLarge);
    }

    let total_afn = totals.total_afn;
    let total_usd = totals.total_usd;
    let mut change_afn = Money::zero();
    let mut credit_afn = Money::zero();

    let paid_afn = if tendered.within_tolerance(total_afn) {
        total_afn
    } else if tendered < total_afn {
        if !tender.has_customer() {
            return Err(CheckoutError::CustomerRequiredForCredit);
        }
        if tender.due_date.is_none() {
            return Err(CheckoutError::DueDateRequired);
        }
        tendered
    } else {
        let excess = tendered - total_afn;
        match tender.overpayment {
            OverpaymentMode::ReturnChange => change_afn = excess,
            OverpaymentMode::StoreAsCredit => {
                if !tender.has_customer() {
                    return Err(CheckoutError::CustomerRequiredForStoredCredit);
                }
                credit_afn = excess;
            }
        }
        total_afn
    };

    let outstanding_afn = total_afn - paid_afn;
    let requires_debt = outstanding_afn.exceeds_tolerance();
    let (paid_usd, outstanding_usd) = if requires_debt {
        let paid_usd = totals.exchange_rate.afn_to_usd(paid_afn).min(total_usd);
        (paid_usd, total_usd - paid_usd)
    } else {
        (total_usd, Money::zero())
    };

    Ok(CheckoutSummary {
        totals,
        tendered_afn: tendered,
        paid_afn,
        paid_usd,
        outstanding_afn,
        outstanding_usd,
        change_afn,
        credit_afn,
        status: derive_invoice_status(paid_afn, outstanding_afn),
        requires_debt,
    })
}

/// Prices the cart and settles the tender in one call.
pub fn checkout(
    lines: &[CartLine],
    discount: DiscountRate,
    tax: TaxRate,
    rate: ExchangeRate,
    tender: &Tender,
) -> Result<CheckoutSummary, CoreError> {
    let totals = price_cart(lines, discount, tax, rate)?;
    Ok(settle(totals, tender)?)
}

// =============================================================================
// Unit Tests
// =============================================================================
