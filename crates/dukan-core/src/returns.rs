//! # Returns Module
//!
//! Refund calculation for goods brought back against an invoice.
//!
//! ## Refund Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  {item_id, qty}[]                                                       │
//! │        │                                                                │
//! │        ▼  check: 0 < qty ≤ sold - already returned                      │
//! │  refund_afn = Σ qty × unit price charged in AFN                         │
//! │  refund_usd = Σ qty × unit price (USD)                                  │
//! │        │                                                                │
//! │        ▼  both capped at what is left of the invoice total              │
//! │        │                                                                │
//! │        ├──► first: reduce the invoice's outstanding debt                │
//! │        └──► rest:  cash handed back                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, ValidationError};
use crate::money::{ExchangeRate, Money};
use crate::types::{Invoice, InvoiceItem};

/// A request to return `quantity` units of one invoice line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnRequestLine {
    pub item_id: String,
    pub quantity: i64,
}

/// An invoice line as far as returns are concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnableLine {
    pub item_id: String,
    pub product_id: String,
    pub sold: i64,
    pub returned: i64,
    pub unit_price_usd: Money,
    /// AFN charged per unit: the fixed AFN price, or the USD price at the invoice rate.
    pub unit_price_afn: Money,
    pub unit_cost_usd: Money,
}

impl From<&InvoiceItem> for ReturnableLine {
    fn from(item: &InvoiceItem) -> Self {
        ReturnableLine {
            item_id: item.id.clone(),
            product_id: item.product_id.clone(),
            sold: item.quantity,
            returned: item.returned_quantity,
            unit_price_usd: item.unit_price_usd,
            unit_price_afn: item.unit_price_afn,
            unit_cost_usd: item.unit_cost_usd,
        }
    }
}

/// The invoice figures a return needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnContext {
    pub invoice_id: String,
    pub exchange_rate: ExchangeRate,
    pub remaining_total_usd: Money,
    pub remaining_total_afn: Money,
    pub outstanding_usd: Money,
    pub outstanding_afn: Money,
}

impl From<&Invoice> for ReturnContext {
    fn from(invoice: &Invoice) -> Self {
        ReturnContext {
            invoice_id: invoice.id.clone(),
            exchange_rate: invoice.exchange_rate,
            remaining_total_usd: invoice.effective_total_usd(),
            remaining_total_afn: invoice.effective_total_afn(),
            outstanding_usd: invoice.outstanding_usd,
            outstanding_afn: invoice.outstanding_afn,
        }
    }
}

/// One line of an accepted return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ReturnedLine {
    pub item_id: String,
    pub product_id: String,
    pub quantity: i64,
    /// Cumulative returned quantity after this return.
    pub returned_after: i64,
    pub refund_usd: Money,
    pub refund_afn: Money,
    pub cost_usd: Money,
}

/// The result of a return: what to restock and where the money goes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RefundPlan {
    pub lines: Vec<ReturnedLine>,
    pub refund_usd: Money,
    pub refund_afn: Money,
    /// Part of the refund that cancels the invoice's outstanding debt.
    pub debt_reduction_afn: Money,
    pub debt_reduction_usd: Money,
    /// Part of the refund handed back in cash.
    pub cash_refund_afn: Money,
    pub cash_refund_usd: Money,
}

/// Validates a return request and computes the refund.
pub fn plan_return(
    lines: &[ReturnableLine],
    requests: &[ReturnRequestLine],
    ctx: &ReturnContext,
) -> Result<RefundPlan, CoreError> {
    if requests.is_empty() {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        }
        .into());
    }
    if !ctx.remaining_total_afn.is_positive() {
        return Err(CoreError::NothingToReturn(ctx.invoice_id.clone()));
    }

    let by_id: HashMap<&str, &ReturnableLine> =
        lines.iter().map(|l| (l.item_id.as_str(), l)).collect();
    let mut seen = HashSet::new();
    let mut returned = Vec::with_capacity(requests.len());

    for request in requests {
        if !seen.insert(request.item_id.as_str()) {
            return Err(CoreError::DuplicateReturnItem(request.item_id.clone()));
        }
        let line = by_id
            .get(request.item_id.as_str())
            .ok_or_else(|| CoreError::InvoiceItemNotFound(request.item_id.clone()))?;

        if request.quantity <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }
        let returnable = (line.sold - line.returned).max(0);
        if request.quantity > returnable {
            return Err(CoreError::ReturnExceedsSold {
                item_id: line.item_id.clone(),
                requested: request.quantity,
                returnable,
            });
        }

        returned.push(ReturnedLine {
            item_id: line.item_id.clone(),
            product_id: line.product_id.clone(),
            quantity: request.quantity,
            returned_after: line.returned + request.quantity,
            refund_usd: line.unit_price_usd * request.quantity,
            refund_afn: line.unit_price_afn * request.quantity,
            cost_usd: line.unit_cost_usd * request.quantity,
        });
    }

    let refund_usd = returned
        .iter()
        .map(|l| l.refund_usd)
        .sum::<Money>()
        .min(ctx.remaining_total_usd);
    // Fixed AFN prices are refunded as charged, never through USD.
    let refund_afn = returned
        .iter()
        .map(|l| l.refund_afn)
        .sum::<Money>()
        .min(ctx.remaining_total_afn);

    let outstanding_afn = ctx.outstanding_afn.non_negative();
    let debt_reduction_afn = refund_afn.min(outstanding_afn);
    let debt_reduction_usd = if debt_reduction_afn == outstanding_afn {
        ctx.outstanding_usd.non_negative()
    } else {
        ctx.exchange_rate
            .afn_to_usd(debt_reduction_afn)
            .min(ctx.outstanding_usd)
    };

    Ok(RefundPlan {
        lines: returned,
        refund_usd,
        refund_afn,
        debt_reduction_afn,
        debt_reduction_usd,
        cash_refund_afn: refund_afn - debt_reduction_afn,
        cash_refund_usd: (refund_usd - debt_reduction_usd).non_negative(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: &str, sold: i64, returned: i64, price: i64) -> ReturnableLine {
        ReturnableLine {
            item_id: id.to_string(),
            product_id: format!("p-{id}"),
            sold,
            returned,
            unit_price_usd: Money::from_cents(price),
            unit_price_afn: Money::from_cents(price * 70),
            unit_cost_usd: Money::from_cents(price / 2),
        }
    }

    fn req(id: &str, quantity: i64) -> ReturnRequestLine {
        ReturnRequestLine {
            item_id: id.to_string(),
            quantity,
        }
    }

    fn ctx(outstanding_afn: i64, outstanding_usd: i64) -> ReturnContext {
        ReturnContext {
            invoice_id: "inv-1".into(),
            exchange_rate: ExchangeRate::from_scaled(700_000),
            remaining_total_usd: Money::from_cents(10_000),
            remaining_total_afn: Money::from_cents(700_000),
            outstanding_usd: Money::from_cents(outstanding_usd),
            outstanding_afn: Money::from_cents(outstanding_afn),
        }
    }

    #[test]
    fn test_cash_refund_uses_invoice_rate() {
        let lines = vec![line("a", 4, 0, 2_000), line("b", 1, 0, 2_000)];
        let plan = plan_return(&lines, &[req("a", 2)], &ctx(0, 0)).unwrap();

        assert_eq!(plan.refund_usd.cents(), 4_000);
        assert_eq!(plan.refund_afn.cents(), 280_000);
        assert_eq!(plan.cash_refund_afn.cents(), 280_000);
        assert_eq!(plan.debt_reduction_afn, Money::zero());
        assert_eq!(plan.lines[0].returned_after, 2);
        assert_eq!(plan.lines[0].cost_usd.cents(), 2_000);
    }

    #[test]
    fn test_refund_reduces_debt_first() {
        let lines = vec![line("a", 5, 0, 2_000)];
        let plan = plan_return(&lines, &[req("a", 3)], &ctx(330_000, 4_714)).unwrap();

        // $60 = ؋4200: ؋3300 cancels the debt, ؋900 in cash
        assert_eq!(plan.debt_reduction_afn.cents(), 330_000);
        assert_eq!(plan.debt_reduction_usd.cents(), 4_714);
        assert_eq!(plan.cash_refund_afn.cents(), 90_000);
        assert_eq!(plan.cash_refund_usd.cents(), 1_286);
    }

    #[test]
    fn test_partial_debt_reduction() {
        let lines = vec![line("a", 5, 0, 1_000)];
        let plan = plan_return(&lines, &[req("a", 1)], &ctx(330_000, 4_714)).unwrap();

        assert_eq!(plan.debt_reduction_afn.cents(), 70_000);
        assert_eq!(plan.debt_reduction_usd.cents(), 1_000);
        assert_eq!(plan.cash_refund_afn, Money::zero());
    }

    #[test]
    fn test_fixed_afn_line_refunds_what_was_charged() {
        // ؋65 a unit, sold at 70: $0.93 a unit would round-trip to ؋65.10
        let mut tea = line("a", 100, 0, 93);
        tea.unit_price_afn = Money::from_cents(6_500);
        let mut c = ctx(0, 0);
        c.remaining_total_afn = Money::from_cents(650_000);

        let plan = plan_return(&[tea], &[req("a", 50)], &c).unwrap();
        assert_eq!(plan.refund_afn.cents(), 325_000);
        assert_eq!(plan.lines[0].refund_afn.cents(), 325_000);
        assert_eq!(plan.cash_refund_afn.cents(), 325_000);
    }

    #[test]
    fn test_return_bounded_by_remaining_quantity() {
        let lines = vec![line("a", 5, 3, 1_000)];

        assert!(plan_return(&lines, &[req("a", 2)], &ctx(0, 0)).is_ok());
        let err = plan_return(&lines, &[req("a", 3)], &ctx(0, 0)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::ReturnExceedsSold {
                requested: 3,
                returnable: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_refund_capped_at_remaining_total() {
        // Sold at a 10% discount: lines add up to $100 but only $90 was charged.
        let lines = vec![line("a", 5, 0, 2_000)];
        let mut c = ctx(0, 0);
        c.remaining_total_usd = Money::from_cents(9_000);
        c.remaining_total_afn = Money::from_cents(630_000);

        let plan = plan_return(&lines, &[req("a", 5)], &c).unwrap();
        assert_eq!(plan.refund_usd.cents(), 9_000);
        assert_eq!(plan.refund_afn.cents(), 630_000);
    }

    #[test]
    fn test_invalid_requests() {
        let lines = vec![line("a", 5, 0, 1_000)];

        assert!(matches!(
            plan_return(&lines, &[], &ctx(0, 0)),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            plan_return(&lines, &[req("zzz", 1)], &ctx(0, 0)),
            Err(CoreError::InvoiceItemNotFound(_))
        ));
        assert!(matches!(
            plan_return(&lines, &[req("a", 1), req("a", 1)], &ctx(0, 0)),
            Err(CoreError::DuplicateReturnItem(_))
        ));
        assert!(matches!(
            plan_return(&lines, &[req("a", 0)], &ctx(0, 0)),
            Err(CoreError::Validation(_))
        ));

        let mut spent = ctx(0, 0);
        spent.remaining_total_afn = Money::zero();
        assert!(matches!(
            plan_return(&lines, &[req("a", 1)], &spent),
            Err(CoreError::NothingToReturn(_))
        ));
    }
}
