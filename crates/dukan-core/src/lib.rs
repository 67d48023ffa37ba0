//! # dukan-core: Pure Business Logic for Dukan POS
//!
//! This crate is the **heart** of Dukan POS. It contains all business logic
//! as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Dukan POS Architecture                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Web Frontend                                 │   │
//! │  │    Cart UI ──► Checkout UI ──► Debts UI ──► Reports UI          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ REST + bearer token                    │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    apps/api (axum)                              │   │
//! │  │    /sales, /customers/{id}/payments, /reports/period, ...       │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ dukan-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────┐           │   │
//! │  │   │  money   │ │ checkout │ │  ledger  │ │ returns  │           │   │
//! │  │   │ USD/AFN  │ │ totals,  │ │ balances,│ │ refunds  │           │   │
//! │  │   │  rates   │ │ debt/chg │ │ debt st. │ │          │           │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────┘           │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    dukan-db (Database Layer)                    │   │
//! │  │              SQLite queries, migrations, repositories           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Customer, Invoice, Debt, etc.)
//! - [`money`] - Money, exchange rate and discount rate (integer math)
//! - [`checkout`] - Cart → invoice totals, payment/debt/change determination
//! - [`ledger`] - Customer balances, debt status, payment allocation
//! - [`returns`] - Refund calculation for returned invoice lines
//! - [`report`] - Report periods and profit math
//! - [`error`] - Domain error types
//! - [`validation`] - Business rule validation
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output.
//!    Even "now" is a parameter.
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in minor units (i64)
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use dukan_core::money::{DiscountRate, ExchangeRate, Money};
//! use dukan_core::checkout::{price_cart, CartLine};
//! use dukan_core::types::TaxRate;
//!
//! let lines = vec![CartLine::new("p-1", "Rice 25kg", Money::from_cents(10_000), 1)];
//! let totals = price_cart(
//!     &lines,
//!     DiscountRate::from_bps(1000),
//!     TaxRate::zero(),
//!     ExchangeRate::from_scaled(700_000),
//! )
//! .unwrap();
//!
//! // $100 - 10% = $90 = ؋6300
//! assert_eq!(totals.total_usd.cents(), 9_000);
//! assert_eq!(totals.total_afn.cents(), 630_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod error;
pub mod ledger;
pub mod money;
pub mod report;
pub mod returns;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use dukan_core::Money` instead of
// `use dukan_core::money::Money`

pub use error::{CheckoutError, CoreError, ValidationError};
pub use money::{Currency, DiscountRate, ExchangeRate, Money, MAX_AMOUNT, SETTLEMENT_TOLERANCE};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum lines allowed in a single cart
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single item in cart
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10)
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// A debt becomes DUE_SOON this many hours before its due date passes.
pub const DUE_SOON_WINDOW_HOURS: i64 = 24;

/// Exchange rate used when the store has never configured one (70 AFN per USD).
pub const DEFAULT_EXCHANGE_RATE: ExchangeRate = ExchangeRate::from_scaled(700_000);
