//! # Validation Module
//!
//! Input validation utilities for Dukan POS.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Frontend                                                      │
//! │  └── Basic format checks, immediate feedback                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: HTTP handler (Rust)                                           │
//! │  ├── Type validation (JSON deserialization)                             │
//! │  └── THIS MODULE: Business rule validation → 422 + fields[]             │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── NOT NULL / CHECK constraints                                       │
//! │  └── UNIQUE and foreign key constraints                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use dukan_core::validation::{validate_sku, validate_quantity};
//!
//! validate_sku("RICE-25KG").unwrap();
//! validate_quantity(5).unwrap();
//! ```

use chrono::NaiveDate;

use crate::error::ValidationError;
use crate::money::{Money, MAX_AMOUNT};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU (Stock Keeping Unit).
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use dukan_core::validation::validate_sku;
///
/// assert!(validate_sku("RICE-25KG").is_ok());
/// assert!(validate_sku("").is_err());
/// assert!(validate_sku("A".repeat(100).as_str()).is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a required free-text field (product name, customer name, ...).
///
/// Length is counted in characters so Dari/Pashto names are not penalised
/// for multi-byte encoding.
///
/// ```rust
/// use dukan_core::validation::validate_name;
///
/// assert!(validate_name("name", "Basmati Rice 25kg", 200).is_ok());
/// assert!(validate_name("name", "برنج", 200).is_ok());
/// assert!(validate_name("name", "  ", 200).is_err());
/// ```
pub fn validate_name(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates an optional free-text field: may be absent, but bounded.
pub fn validate_optional_text(
    field: &str,
    value: Option<&str>,
    max: usize,
) -> ValidationResult<()> {
    match value {
        Some(v) if v.chars().count() > max => Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        }),
        _ => Ok(()),
    }
}

/// Validates a search query.
///
/// ## Returns
/// The trimmed query string.
pub fn validate_search_query(query: &str) -> ValidationResult<String> {
    let query = query.trim();

    if query.len() > 100 {
        return Err(ValidationError::TooLong {
            field: "query".to_string(),
            max: 100,
        });
    }

    Ok(query.to_string())
}

/// Validates a phone number: digits with an optional leading `+`, spaces and
/// dashes allowed as separators.
pub fn validate_phone(phone: &str) -> ValidationResult<()> {
    let phone = phone.trim();
    let digits = phone.chars().filter(|c| c.is_ascii_digit()).count();
    let well_formed = phone
        .char_indices()
        .all(|(i, c)| c.is_ascii_digit() || c == ' ' || c == '-' || (c == '+' && i == 0));

    if !well_formed || !(7..=15).contains(&digits) {
        return Err(ValidationError::InvalidFormat {
            field: "phone".to_string(),
            reason: "must be 7-15 digits".to_string(),
        });
    }

    Ok(())
}

pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    };
    if !valid {
        return Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must be a valid email address".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// ## User Workflow
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Cart: Add Item                                                         │
/// │                                                                         │
/// │  User enters quantity: 5                                                │
/// │       │                                                                 │
/// │       ▼                                                                 │
/// │  validate_quantity(5) ← THIS FUNCTION                                   │
/// │       │                                                                 │
/// │       ├── qty <= 0? → Error: "quantity must be positive"                │
/// │       │                                                                 │
/// │       ├── qty > 999? → Error: "quantity must be between 1 and 999"      │
/// │       │                                                                 │
/// │       └── OK → Proceed with checkout                                    │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price.
///
/// ## Rules
/// - Must be non-negative (>= 0)
/// - Zero is allowed (free items)
/// - At most [`MAX_AMOUNT`]
///
/// ## Example
/// ```rust
/// use dukan_core::validation::validate_price;
/// use dukan_core::Money;
///
/// assert!(validate_price("price_usd", Money::from_cents(1099)).is_ok());
/// assert!(validate_price("price_usd", Money::zero()).is_ok());
/// assert!(validate_price("price_usd", Money::from_cents(-100)).is_err());
/// ```
pub fn validate_price(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() || !amount.is_within_max() {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_AMOUNT.major(),
        });
    }

    Ok(())
}

/// Validates a customer payment.
///
/// Negative amounts are refunds and allowed; zero is not a payment.
pub fn validate_payment_amount(amount: Money) -> ValidationResult<()> {
    if amount.is_zero() {
        return Err(ValidationError::InvalidFormat {
            field: "amount".to_string(),
            reason: "must not be zero".to_string(),
        });
    }
    if !amount.is_within_max() {
        return Err(ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: -MAX_AMOUNT.major(),
            max: MAX_AMOUNT.major(),
        });
    }

    Ok(())
}

/// Validates an expense amount. Expenses are always money going out.
pub fn validate_expense_amount(amount: Money) -> ValidationResult<()> {
    if !amount.is_positive() {
        return Err(ValidationError::MustBePositive {
            field: "amount".to_string(),
        });
    }
    if !amount.is_within_max() {
        return Err(ValidationError::OutOfRange {
            field: "amount".to_string(),
            min: 0,
            max: MAX_AMOUNT.major(),
        });
    }

    Ok(())
}

/// Validates a credit limit: absent means unlimited, present must be >= 0.
pub fn validate_credit_limit(limit: Option<Money>) -> ValidationResult<()> {
    match limit {
        Some(limit) => validate_price("credit_limit", limit),
        None => Ok(()),
    }
}

/// Validates a discount in basis points (0% - 100%).
pub fn validate_discount_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10_000 {
        return Err(ValidationError::OutOfRange {
            field: "discount_percent".to_string(),
            min: 0,
            max: 100,
        });
    }

    Ok(())
}

/// Validates a tax rate in basis points.
pub fn validate_tax_rate_bps(bps: u32) -> ValidationResult<()> {
    if bps > 10000 {
        return Err(ValidationError::OutOfRange {
            field: "tax_rate".to_string(),
            min: 0,
            max: 10000,
        });
    }

    Ok(())
}

/// Validates an exchange rate as typed by the operator.
///
/// ## Rules
/// - Finite and strictly positive
/// - At most 100000 AFN per USD (catches typos like an extra zero digit run)
pub fn validate_exchange_rate(rate: f64) -> ValidationResult<()> {
    if !rate.is_finite() || rate <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: "exchange_rate".to_string(),
        });
    }
    if rate > 100_000.0 {
        return Err(ValidationError::OutOfRange {
            field: "exchange_rate".to_string(),
            min: 0,
            max: 100_000,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates cart size (number of lines).
pub fn validate_cart_size(lines: usize) -> ValidationResult<()> {
    if lines == 0 {
        return Err(ValidationError::Required {
            field: "items".to_string(),
        });
    }

    if lines > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        });
    }

    Ok(())
}

// =============================================================================
// Date Validators
// =============================================================================

/// A debt due date cannot already be in the past.
pub fn validate_due_date(due: NaiveDate, today: NaiveDate) -> ValidationResult<()> {
    if due < today {
        return Err(ValidationError::InvalidFormat {
            field: "due_date".to_string(),
            reason: "must not be in the past".to_string(),
        });
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use dukan_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_sku() {
        assert!(validate_sku("RICE-25KG").is_ok());
        assert!(validate_sku("ABC123").is_ok());
        assert!(validate_sku("product_1").is_ok());

        assert!(validate_sku("").is_err());
        assert!(validate_sku("   ").is_err());
        assert!(validate_sku("has space").is_err());
        assert!(validate_sku(&"A".repeat(100)).is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("name", "Green Tea 500g", 200).is_ok());
        assert!(validate_name("name", "", 200).is_err());
        assert!(validate_name("name", &"A".repeat(300), 200).is_err());
        // 150 Persian characters are 300 bytes but still within limit
        assert!(validate_name("name", &"ب".repeat(150), 200).is_ok());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("+93 70 123 4567").is_ok());
        assert!(validate_phone("0701234567").is_ok());
        assert!(validate_phone("12-34").is_err());
        assert!(validate_phone("07x1234567").is_err());
        assert!(validate_phone("93+701234567").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("shop@example.af").is_ok());
        assert!(validate_email("shop.example.af").is_err());
        assert!(validate_email("@example.af").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(999).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(1000).is_err());
    }

    #[test]
    fn test_validate_amounts() {
        assert!(validate_payment_amount(Money::from_cents(-500)).is_ok());
        assert!(validate_payment_amount(Money::zero()).is_err());
        assert!(validate_expense_amount(Money::from_cents(1)).is_ok());
        assert!(validate_expense_amount(Money::zero()).is_err());
        assert!(validate_credit_limit(None).is_ok());
        assert!(validate_credit_limit(Some(Money::from_cents(-1))).is_err());
    }

    #[test]
    fn test_validate_amounts_upper_bound() {
        let too_big = MAX_AMOUNT + Money::from_cents(1);
        assert!(validate_price("price_usd", MAX_AMOUNT).is_ok());
        assert!(matches!(
            validate_price("price_usd", too_big),
            Err(ValidationError::OutOfRange { ref field, .. }) if field == "price_usd"
        ));
        assert!(validate_payment_amount(too_big).is_err());
        assert!(validate_payment_amount(-too_big).is_err());
        assert!(validate_payment_amount(Money::from_cents(i64::MIN)).is_err());
        assert!(validate_expense_amount(too_big).is_err());
        assert!(validate_credit_limit(Some(too_big)).is_err());
    }

    #[test]
    fn test_validate_rates() {
        assert!(validate_discount_bps(10_000).is_ok());
        assert!(validate_discount_bps(10_001).is_err());
        assert!(validate_tax_rate_bps(825).is_ok());
        assert!(validate_exchange_rate(70.15).is_ok());
        assert!(validate_exchange_rate(0.0).is_err());
        assert!(validate_exchange_rate(f64::NAN).is_err());
        assert!(validate_exchange_rate(1_000_000.0).is_err());
    }

    #[test]
    fn test_validate_cart_size() {
        assert!(validate_cart_size(1).is_ok());
        assert!(validate_cart_size(MAX_CART_ITEMS).is_ok());
        assert!(validate_cart_size(0).is_err());
        assert!(validate_cart_size(MAX_CART_ITEMS + 1).is_err());
    }

    #[test]
    fn test_validate_due_date() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        assert!(validate_due_date(today, today).is_ok());
        assert!(validate_due_date(today.succ_opt().unwrap(), today).is_ok());
        assert!(validate_due_date(today.pred_opt().unwrap(), today).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("not-a-uuid").is_err());
    }
}
