//! # Money Module
//!
//! Provides the `Money` type plus the two rates every amount in Dukan POS
//! flows through: the USD→AFN [`ExchangeRate`] and the [`DiscountRate`].
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  With two currencies it gets worse:                                     │
//! │    $90.00 × 70.15 = ؋6313.4999999  → "6313" or "6314"?                 │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units + fixed-point rates                  │
//! │    9000 cents × 701500 / 10000 = 631350 pul = ؋6313.50                 │
//! │    Rounding happens in ONE place, half away from zero                   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use dukan_core::money::{ExchangeRate, Money};
//!
//! let price = Money::from_cents(9000);           // $90.00
//! let rate = ExchangeRate::from_scaled(700_000); // 70.0000 AFN per USD
//!
//! assert_eq!(rate.usd_to_afn(price), Money::from_major_minor(6300, 0));
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::TaxRate;

/// Minor units per major unit (cents per dollar, pul per afghani).
pub const MINOR_PER_MAJOR: i64 = 100;

/// Difference below which two amounts are considered equal.
///
/// 0.05 currency units. Absorbs the rounding between the USD ledger and the
/// whole-afghani display totals, so a customer who hands over exactly the
/// displayed total is never left with a phantom 0.01 debt.
pub const SETTLEMENT_TOLERANCE: Money = Money::from_cents(5);

/// Largest amount accepted from the outside, in either direction.
///
/// 10 000 000 000 major units. Keeps every ledger sum far from `i64` limits.
pub const MAX_AMOUNT: Money = Money::from_cents(1_000_000_000_000);

/// Divides with rounding half away from zero.
///
/// `den` must be positive.
fn div_round(num: i128, den: i128) -> i128 {
    let half = den / 2;
    if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// The type does not carry its currency: the field name does
/// (`total_usd`, `total_afn`). Mixing them is a logic error the compiler
/// cannot catch, so conversions only happen through [`ExchangeRate`].
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price_usd ──┬──► CartLine.unit_price_usd ──► Invoice.total_usd │
/// │                      │                                                  │
/// │  Product.price_afn ──┴──► CartLine.unit_price_afn ──► Invoice.total_afn │
/// │  (fixed, optional)                                     (totalLocal)     │
/// │                                                                         │
/// │  Tendered AFN ──► Payment.amount_afn ──► Debt.remaining_balance_afn     │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use dukan_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // 10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from major and minor units.
    ///
    /// For negative amounts only the major unit should be negative:
    /// `from_major_minor(-5, 50)` is -5.50.
    ///
    /// ```rust
    /// use dukan_core::money::Money;
    ///
    /// assert_eq!(Money::from_major_minor(10, 99).cents(), 1099);
    /// assert_eq!(Money::from_major_minor(-5, 50).cents(), -550);
    /// ```
    #[inline]
    pub const fn from_major_minor(major: i64, minor: i64) -> Self {
        if major < 0 {
            Money(major * MINOR_PER_MAJOR - minor)
        } else {
            Money(major * MINOR_PER_MAJOR + minor)
        }
    }

    /// Converts a user-typed decimal amount (e.g. `6300.5`) to Money.
    ///
    /// Only used at the HTTP boundary. Returns `None` for NaN/infinite input
    /// and for anything beyond [`MAX_AMOUNT`].
    pub fn from_major_f64(amount: f64) -> Option<Self> {
        if !amount.is_finite() {
            return None;
        }
        let cents = (amount * MINOR_PER_MAJOR as f64).round();
        if cents.abs() > MAX_AMOUNT.0 as f64 {
            return None;
        }
        Some(Money(cents as i64))
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit portion (truncated toward zero).
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / MINOR_PER_MAJOR
    }

    /// Returns the minor unit portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % MINOR_PER_MAJOR).abs()
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    #[inline]
    pub const fn abs(&self) -> Self {
        Money(self.0.abs())
    }

    /// Clamps negative values to zero.
    #[inline]
    pub const fn non_negative(&self) -> Self {
        if self.0 < 0 {
            Money(0)
        } else {
            *self
        }
    }

    /// Returns true if `self` and `other` differ by at most
    /// [`SETTLEMENT_TOLERANCE`].
    ///
    /// ```rust
    /// use dukan_core::money::Money;
    ///
    /// assert!(Money::from_cents(630_000).within_tolerance(Money::from_cents(629_996)));
    /// assert!(!Money::from_cents(630_000).within_tolerance(Money::from_cents(629_990)));
    /// ```
    #[inline]
    pub fn within_tolerance(&self, other: Money) -> bool {
        (*self - other).abs() <= SETTLEMENT_TOLERANCE
    }

    /// Returns true if the amount is larger than the settlement tolerance.
    ///
    /// Used for "is there really anything outstanding" checks.
    #[inline]
    pub fn exceeds_tolerance(&self) -> bool {
        self.0 > SETTLEMENT_TOLERANCE.0
    }

    /// Rounds to the nearest whole currency unit (half away from zero).
    ///
    /// Mirrors the display rounding of AFN totals.
    ///
    /// ```rust
    /// use dukan_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(631_350).round_to_major().cents(), 631_400);
    /// assert_eq!(Money::from_cents(631_349).round_to_major().cents(), 631_300);
    /// ```
    pub fn round_to_major(&self) -> Money {
        let major = div_round(self.0 as i128, MINOR_PER_MAJOR as i128);
        Money((major * MINOR_PER_MAJOR as i128) as i64)
    }

    /// Calculates tax at the given rate.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`, i128 to avoid overflow.
    ///
    /// ```rust
    /// use dukan_core::money::Money;
    /// use dukan_core::types::TaxRate;
    ///
    /// let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
    /// assert_eq!(tax.cents(), 83);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        Money(div_round(self.0 as i128 * rate.bps() as i128, 10_000) as i64)
    }

    /// Returns `rate` percent of this amount.
    pub fn percentage(&self, rate: DiscountRate) -> Money {
        Money(div_round(self.0 as i128 * rate.bps() as i128, 10_000) as i64)
    }

    /// Applies a percentage discount and returns the discounted amount.
    ///
    /// ```rust
    /// use dukan_core::money::{DiscountRate, Money};
    ///
    /// let subtotal = Money::from_cents(10000);
    /// let discounted = subtotal.apply_percentage_discount(DiscountRate::from_bps(1000));
    /// assert_eq!(discounted.cents(), 9000);
    /// ```
    pub fn apply_percentage_discount(&self, rate: DiscountRate) -> Money {
        *self - self.percentage(rate)
    }

    /// `self × qty`, or `None` when the product does not fit.
    pub const fn checked_mul(&self, qty: i64) -> Option<Money> {
        match self.0.checked_mul(qty) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// True when `|self| <= MAX_AMOUNT`.
    pub const fn is_within_max(&self) -> bool {
        self.0.unsigned_abs() <= MAX_AMOUNT.0 as u64
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}.{:02}", sign, self.major().abs(), self.minor_part())
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Neg for Money {
    type Output = Self;

    #[inline]
    fn neg(self) -> Self {
        Money(-self.0)
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Currency
// =============================================================================

/// The two currencies the shop works in.
///
/// USD is the ledger currency (product prices, invoice totals, COGS).
/// AFN is the display and tender currency (what the customer pays and owes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "UPPERCASE")]
#[ts(export)]
pub enum Currency {
    Usd,
    Afn,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Afn => "AFN",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Afn => "؋",
        }
    }

    /// Formats an amount with the currency symbol, e.g. `؋6300.00`.
    pub fn format(&self, amount: Money) -> String {
        if amount.is_negative() {
            format!("-{}{}", self.symbol(), amount.abs())
        } else {
            format!("{}{}", self.symbol(), amount)
        }
    }
}

// =============================================================================
// Exchange Rate
// =============================================================================

/// Scale factor of [`ExchangeRate`]: four decimal places.
pub const RATE_SCALE: i64 = 10_000;

/// AFN per 1 USD, fixed-point with four decimals.
///
/// `ExchangeRate::from_scaled(701_500)` is 70.15 AFN per USD. Every invoice
/// snapshots the rate it was sold at; returns convert with that snapshot,
/// never with the current rate.
///
/// Serialized as a plain decimal number (`70.15`) and always strictly
/// positive once constructed through [`ExchangeRate::try_from_scaled`] or
/// deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[serde(try_from = "f64", into = "f64")]
pub struct ExchangeRate(i64);

impl ExchangeRate {
    /// Creates a rate from its scaled representation.
    ///
    /// The value must be positive; use [`ExchangeRate::try_from_scaled`] for
    /// untrusted input.
    #[inline]
    pub const fn from_scaled(scaled: i64) -> Self {
        ExchangeRate(scaled)
    }

    /// Creates a rate from its scaled representation, rejecting non-positive values.
    pub fn try_from_scaled(scaled: i64) -> Result<Self, ValidationError> {
        if scaled <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "exchange_rate".to_string(),
            });
        }
        Ok(ExchangeRate(scaled))
    }

    /// Creates a rate from a decimal value such as `70.15`.
    pub fn from_f64(rate: f64) -> Result<Self, ValidationError> {
        if !rate.is_finite() {
            return Err(ValidationError::InvalidFormat {
                field: "exchange_rate".to_string(),
                reason: "must be a finite number".to_string(),
            });
        }
        Self::try_from_scaled((rate * RATE_SCALE as f64).round() as i64)
    }

    #[inline]
    pub const fn scaled(&self) -> i64 {
        self.0
    }

    /// Returns the rate as a decimal number (display only).
    #[inline]
    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / RATE_SCALE as f64
    }

    /// Converts a USD amount to AFN.
    ///
    /// ```rust
    /// use dukan_core::money::{ExchangeRate, Money};
    ///
    /// let rate = ExchangeRate::from_scaled(701_500); // 70.15
    /// assert_eq!(rate.usd_to_afn(Money::from_cents(9000)).cents(), 631_350);
    /// ```
    pub fn usd_to_afn(&self, usd: Money) -> Money {
        let afn = div_round(usd.cents() as i128 * self.0 as i128, RATE_SCALE as i128);
        Money::from_cents(afn as i64)
    }

    /// Converts an AFN amount to USD.
    ///
    /// Used for secondary USD bookkeeping when AFN is authoritative
    /// (payments, fixed AFN prices, fixed balances).
    pub fn afn_to_usd(&self, afn: Money) -> Money {
        if self.0 <= 0 {
            return Money::zero();
        }
        let usd = div_round(afn.cents() as i128 * RATE_SCALE as i128, self.0 as i128);
        Money::from_cents(usd as i64)
    }
}

impl TryFrom<f64> for ExchangeRate {
    type Error = ValidationError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        ExchangeRate::from_f64(value)
    }
}

impl From<ExchangeRate> for f64 {
    fn from(rate: ExchangeRate) -> f64 {
        rate.as_f64()
    }
}

impl fmt::Display for ExchangeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:04}", self.0 / RATE_SCALE, self.0 % RATE_SCALE)
    }
}

// =============================================================================
// Discount Rate
// =============================================================================

/// Percentage discount in basis points (1000 = 10%).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct DiscountRate(u32);

impl DiscountRate {
    /// Largest allowed discount: 100%.
    pub const MAX_BPS: u32 = 10_000;

    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        DiscountRate(bps)
    }

    /// Creates a discount from a percentage as typed by the operator (`10` or `12.5`).
    pub fn from_percentage(pct: f64) -> Result<Self, ValidationError> {
        if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
            return Err(ValidationError::OutOfRange {
                field: "discount_percent".to_string(),
                min: 0,
                max: 100,
            });
        }
        Ok(DiscountRate((pct * 100.0).round() as u32))
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        DiscountRate(0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.major(), 10);
        assert_eq!(money.minor_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "10.99");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-5.50");
        assert_eq!(Currency::Afn.format(Money::from_cents(630_000)), "؋6300.00");
        assert_eq!(Currency::Usd.format(Money::from_cents(-550)), "-$5.50");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        assert_eq!((-a).cents(), -1000);
        assert_eq!(vec![a, b, b].into_iter().sum::<Money>().cents(), 2000);
    }

    #[test]
    fn test_from_major_f64() {
        assert_eq!(Money::from_major_f64(6300.0), Some(Money::from_cents(630_000)));
        assert_eq!(Money::from_major_f64(0.1 + 0.2), Some(Money::from_cents(30)));
        assert_eq!(Money::from_major_f64(-12.5), Some(Money::from_cents(-1250)));
        assert_eq!(Money::from_major_f64(f64::NAN), None);
        assert_eq!(Money::from_major_f64(10_000_000_000.0), Some(MAX_AMOUNT));
        assert_eq!(Money::from_major_f64(5.0e16), None);
        assert_eq!(Money::from_major_f64(-5.0e16), None);
    }

    #[test]
    fn test_amount_bounds() {
        assert!(MAX_AMOUNT.is_within_max());
        assert!((-MAX_AMOUNT).is_within_max());
        assert!(!(MAX_AMOUNT + Money::from_cents(1)).is_within_max());
        assert!(!Money::from_cents(i64::MIN).is_within_max());
        assert_eq!(Money::from_cents(250).checked_mul(4), Some(Money::from_cents(1000)));
        assert_eq!(Money::from_cents(i64::MAX / 2).checked_mul(3), None);
    }

    #[test]
    fn test_round_to_major_negative() {
        assert_eq!(Money::from_cents(-150).round_to_major().cents(), -200);
        assert_eq!(Money::from_cents(-149).round_to_major().cents(), -100);
    }

    #[test]
    fn test_tax_calculation_with_rounding() {
        let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
        assert_eq!(tax.cents(), 83);
    }

    #[test]
    fn test_percentage_discount() {
        let subtotal = Money::from_cents(10000);
        let discounted = subtotal.apply_percentage_discount(DiscountRate::from_bps(1000));
        assert_eq!(discounted.cents(), 9000);
    }

    #[test]
    fn test_tolerance() {
        let total = Money::from_cents(630_000);
        assert!(total.within_tolerance(Money::from_cents(630_005)));
        assert!(!total.within_tolerance(Money::from_cents(630_006)));
        assert!(!Money::from_cents(5).exceeds_tolerance());
        assert!(Money::from_cents(6).exceeds_tolerance());
    }

    #[test]
    fn test_exchange_rate_conversions() {
        let rate = ExchangeRate::from_scaled(700_000);
        assert_eq!(rate.usd_to_afn(Money::from_cents(9000)).cents(), 630_000);
        assert_eq!(rate.afn_to_usd(Money::from_cents(630_000)).cents(), 9000);
        // ؋100 at 70 = $1.428571… → $1.43
        assert_eq!(rate.afn_to_usd(Money::from_cents(10_000)).cents(), 143);
        assert_eq!(rate.afn_to_usd(Money::from_cents(-10_000)).cents(), -143);
    }

    #[test]
    fn test_exchange_rate_validation() {
        assert!(ExchangeRate::from_f64(70.15).is_ok());
        assert_eq!(ExchangeRate::from_f64(70.15).unwrap().scaled(), 701_500);
        assert!(ExchangeRate::from_f64(0.0).is_err());
        assert!(ExchangeRate::from_f64(-1.0).is_err());
        assert!(ExchangeRate::from_f64(f64::INFINITY).is_err());
    }

    #[test]
    fn test_exchange_rate_serde_as_decimal() {
        let rate: ExchangeRate = serde_json::from_str("70.15").unwrap();
        assert_eq!(rate.scaled(), 701_500);
        assert_eq!(serde_json::to_string(&rate).unwrap(), "70.15");
        assert!(serde_json::from_str::<ExchangeRate>("0").is_err());
        assert_eq!(rate.to_string(), "70.1500");
    }

    #[test]
    fn test_discount_from_percentage() {
        assert_eq!(DiscountRate::from_percentage(10.0).unwrap().bps(), 1000);
        assert_eq!(DiscountRate::from_percentage(12.5).unwrap().bps(), 1250);
        assert!(DiscountRate::from_percentage(101.0).is_err());
        assert!(DiscountRate::from_percentage(-1.0).is_err());
    }
}
