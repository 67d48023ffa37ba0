//! # Error Types
//!
//! Domain-specific error types for dukan-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  dukan-core errors (this file)                                          │
//! │  ├── CoreError        - General domain errors                           │
//! │  ├── CheckoutError    - Cart → invoice rule violations                  │
//! │  └── ValidationError  - Input validation failures                       │
//! │                                                                         │
//! │  dukan-db errors (separate crate)                                       │
//! │  └── DbError          - Database operation failures                     │
//! │                                                                         │
//! │  HTTP API errors (apps/api)                                             │
//! │  └── ApiError         - What the frontend sees (JSON)                   │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Frontend      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (SKU, ID, etc.)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// They should be caught and translated to user-friendly messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product cannot be found (unknown ID or deactivated).
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Invoice not found: {0}")]
    InvoiceNotFound(String),

    /// Insufficient stock to complete sale.
    ///
    /// ## User Workflow
    /// ```text
    /// Add to Cart (qty: 5)
    ///      │
    ///      ▼
    /// Check stock: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "RICE-25KG", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// UI shows: "Only 3 RICE-25KG in stock"
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Cart has exceeded maximum allowed items.
    #[error("Cart cannot have more than {max} items")]
    CartTooLarge { max: usize },

    /// Item quantity exceeds maximum allowed.
    #[error("Quantity {requested} exceeds maximum allowed ({max})")]
    QuantityTooLarge { requested: i64, max: i64 },

    /// Payment amount is invalid.
    #[error("Invalid payment amount: {reason}")]
    InvalidPaymentAmount { reason: String },

    /// A return references a line that is not on the invoice.
    #[error("Invoice item not found: {0}")]
    InvoiceItemNotFound(String),

    /// A return lists the same invoice line twice.
    #[error("Invoice item {0} appears more than once in the return")]
    DuplicateReturnItem(String),

    /// Requested return quantity is larger than what is still returnable.
    ///
    /// ```text
    /// sold: 5, already returned: 3  →  returnable: 2
    /// request: 3                    →  ReturnExceedsSold
    /// ```
    #[error("Cannot return {requested} of item {item_id}: only {returnable} returnable")]
    ReturnExceedsSold {
        item_id: String,
        requested: i64,
        returnable: i64,
    },

    /// Nothing left to return on the invoice.
    #[error("Invoice {0} has nothing left to return")]
    NothingToReturn(String),

    /// Checkout rule violation.
    #[error(transparent)]
    Checkout(#[from] CheckoutError),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

// =============================================================================
// Checkout Error
// =============================================================================

/// Errors raised while turning a cart into an invoice.
///
/// ## Credit Sale Rules
/// ```text
/// tendered < total (beyond 0.05)
///      │
///      ├── no customer?  → CustomerRequiredForCredit
///      ├── no due date?  → DueDateRequired
///      ├── over limit?   → CreditLimitExceeded
///      └── OK → shortfall becomes a Debt
/// ```
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Amount tendered cannot be negative")]
    NegativeTender,

    #[error("Amount tendered is larger than any accepted amount")]
    TenderTooLarge,

    /// Walk-in sales cannot carry debt.
    #[error("A customer must be selected for a credit sale")]
    CustomerRequiredForCredit,

    #[error("A due date is required for a credit sale")]
    DueDateRequired,

    /// Banking an overpayment as credit needs someone to credit.
    #[error("A customer must be selected to store change as credit")]
    CustomerRequiredForStoredCredit,

    /// The new outstanding balance would exceed the customer's credit limit.
    #[error("Credit limit exceeded: limit {limit}, balance after sale {balance_after}")]
    CreditLimitExceeded {
        limit: String,
        balance_after: String,
    },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Used for early validation before business logic runs.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too short.
    #[error("{field} must be at least {min} characters")]
    TooShort { field: String, min: usize },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., invalid UUID, invalid date).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Duplicate value (e.g., duplicate SKU).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },
}

impl ValidationError {
    /// Name of the offending field, surfaced in API `fields` arrays.
    pub fn field(&self) -> &str {
        match self {
            ValidationError::Required { field }
            | ValidationError::TooShort { field, .. }
            | ValidationError::TooLong { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::MustBePositive { field }
            | ValidationError::InvalidFormat { field, .. }
            | ValidationError::NotAllowed { field, .. }
            | ValidationError::Duplicate { field, .. } => field,
        }
    }
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
