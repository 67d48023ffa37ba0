//! # Domain Types
//!
//! Core domain types used throughout Dukan POS.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │    Invoice      │   │     Debt        │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  sku (business) │   │  invoice_number │   │  invoice_id     │       │
//! │  │  price_usd      │   │  total_usd      │   │  original_afn   │       │
//! │  │  price_afn?     │   │  total_afn      │   │  remaining_afn  │       │
//! │  │  stock          │   │  exchange_rate  │   │  due_date       │       │
//! │  └─────────────────┘   └────────┬────────┘   └─────────────────┘       │
//! │                                 │ 1..n                                  │
//! │  ┌─────────────────┐   ┌────────▼────────┐   ┌─────────────────┐       │
//! │  │    Customer     │   │  InvoiceItem    │   │    Payment      │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  balance_usd    │   │  quantity       │   │  amount_afn     │       │
//! │  │  balance_afn?   │   │  returned_qty   │   │  method, kind   │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  Expense • AuditLog (append-only) • User • StoreSettings               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, invoice_number, etc.) - human-readable

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::ledger::{derive_debt_status, CustomerBalance};
use crate::money::{DiscountRate, ExchangeRate, Money};

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 500 bps = 5%. Most shops run with zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate((pct * 100.0).round() as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::zero()
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product available for sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Barcode (EAN-13, UPC-A, etc.).
    pub barcode: Option<String>,

    /// Display name shown to cashier and on the invoice.
    pub name: String,

    pub description: Option<String>,

    /// Selling price in USD cents.
    pub price_usd: Money,

    /// Fixed selling price in AFN (pul).
    ///
    /// When set it is used as-is and the exchange rate is ignored for this
    /// product's AFN price.
    pub price_afn: Option<Money>,

    /// Purchase cost in USD cents (COGS basis).
    pub cost_usd: Money,

    /// Units on hand.
    pub stock: i64,

    /// Stock at or below this level shows up on the dashboard.
    pub reorder_level: i64,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// AFN unit price at the given rate: the fixed price if set, else converted.
    ///
    /// ```rust
    /// # use dukan_core::money::{ExchangeRate, Money};
    /// # let mut product = dukan_core::types::Product::sample("RICE", Money::from_cents(2500));
    /// let rate = ExchangeRate::from_scaled(700_000);
    /// assert_eq!(product.unit_price_afn(rate).cents(), 175_000);
    ///
    /// product.price_afn = Some(Money::from_cents(180_000));
    /// assert_eq!(product.unit_price_afn(rate).cents(), 180_000);
    /// ```
    pub fn unit_price_afn(&self, rate: ExchangeRate) -> Money {
        match self.price_afn {
            Some(fixed) => fixed,
            None => rate.usd_to_afn(self.price_usd),
        }
    }

    /// Checks if enough units are on hand to sell `quantity`.
    pub fn can_sell(&self, quantity: i64) -> bool {
        self.is_active && self.stock >= quantity
    }

    pub fn is_low_stock(&self) -> bool {
        self.stock <= self.reorder_level
    }

    /// Builds an in-memory product for examples and tests.
    #[doc(hidden)]
    pub fn sample(sku: &str, price_usd: Money) -> Self {
        let now = Utc::now();
        Product {
            id: uuid::Uuid::new_v4().to_string(),
            sku: sku.to_string(),
            barcode: None,
            name: sku.to_string(),
            description: None,
            price_usd,
            price_afn: None,
            cost_usd: Money::zero(),
            stock: 100,
            reorder_level: 5,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

// =============================================================================
// Customer
// =============================================================================

/// A customer who can buy on credit.
///
/// ## Two Balances
/// ```text
/// outstanding_balance_usd   ledger estimate, always maintained
/// outstanding_balance_afn   fixed AFN balance; authoritative when present
///
/// displayed = balance_afn ?? balance_usd × current rate
/// ```
/// A negative balance is store credit held for the customer.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    /// Maximum USD balance allowed on credit. `None` means no limit.
    pub credit_limit_usd: Option<Money>,
    pub outstanding_balance_usd: Money,
    pub outstanding_balance_afn: Option<Money>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    #[inline]
    pub fn balance(&self) -> CustomerBalance {
        CustomerBalance::new(self.outstanding_balance_usd, self.outstanding_balance_afn)
    }
}

// =============================================================================
// Invoice Status
// =============================================================================

/// Payment status of an invoice, derived from paid/outstanding amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Paid,
    Partial,
    Unpaid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Partial => "PARTIAL",
            InvoiceStatus::Unpaid => "UNPAID",
        }
    }
}

// =============================================================================
// Payment Method / Kind
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Card,
    BankTransfer,
    /// Settled from the customer's stored credit.
    Credit,
}

impl Default for PaymentMethod {
    fn default() -> Self {
        PaymentMethod::Cash
    }
}

/// What a payment row records.
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    /// Tendered at checkout.
    Sale,
    /// Received later against the customer's balance (negative = refund to customer).
    DebtPayment,
    /// Cash handed back for returned goods.
    Refund,
}

// =============================================================================
// Invoice
// =============================================================================

/// A sale. Created at checkout; afterwards only payments and returns change it.
///
/// ## Amount Columns
/// ```text
/// USD (ledger)                AFN (display / tender)
/// ────────────                ──────────────────────
/// subtotal_usd                subtotal_afn
/// discount_usd                discount_afn
/// tax_usd                     tax_afn
/// total_usd                   total_afn      (whole afghani)
/// paid_usd                    paid_afn
/// outstanding_usd             outstanding_afn
/// returned_usd                returned_afn
///
/// paid + outstanding == total - returned   (within 0.05)
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    /// Human-readable number, e.g. `INV-20261018-0007`.
    pub invoice_number: String,
    pub customer_id: Option<String>,
    pub user_id: Option<String>,
    pub status: InvoiceStatus,
    pub subtotal_usd: Money,
    pub discount_rate: DiscountRate,
    pub discount_usd: Money,
    pub tax_usd: Money,
    pub total_usd: Money,
    pub subtotal_afn: Money,
    pub discount_afn: Money,
    pub tax_afn: Money,
    pub total_afn: Money,
    pub paid_usd: Money,
    pub paid_afn: Money,
    pub outstanding_usd: Money,
    pub outstanding_afn: Money,
    pub returned_usd: Money,
    pub returned_afn: Money,
    /// Overpayment banked on the customer's account at checkout.
    pub stored_credit_afn: Money,
    /// AFN per USD at the time of sale.
    #[ts(type = "number")]
    pub exchange_rate: ExchangeRate,
    #[ts(as = "Option<String>")]
    pub due_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Invoice {
    /// AFN total after returns.
    #[inline]
    pub fn effective_total_afn(&self) -> Money {
        self.total_afn - self.returned_afn
    }

    #[inline]
    pub fn effective_total_usd(&self) -> Money {
        self.total_usd - self.returned_usd
    }

    /// True when the invoice still carries debt beyond the tolerance.
    #[inline]
    pub fn is_credit_sale(&self) -> bool {
        self.outstanding_afn.exceeds_tolerance()
    }
}

// =============================================================================
// Invoice Item
// =============================================================================

/// A line on an invoice.
/// Uses snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InvoiceItem {
    pub id: String,
    pub invoice_id: String,
    pub product_id: String,
    /// SKU at time of sale (frozen).
    pub sku_snapshot: String,
    /// Product name at time of sale (frozen).
    pub name_snapshot: String,
    pub quantity: i64,
    /// Units already returned. Never exceeds `quantity`.
    pub returned_quantity: i64,
    pub unit_price_usd: Money,
    pub unit_price_afn: Money,
    /// Cost at time of sale (frozen), for COGS.
    pub unit_cost_usd: Money,
    pub line_total_usd: Money,
    pub line_total_afn: Money,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl InvoiceItem {
    #[inline]
    pub fn returnable_quantity(&self) -> i64 {
        (self.quantity - self.returned_quantity).max(0)
    }

    /// Cost of the units that were kept.
    pub fn net_cost_usd(&self) -> Money {
        self.unit_cost_usd * self.returnable_quantity()
    }
}

// =============================================================================
// Debt
// =============================================================================

/// Status of a debt, derived from its balance and due date. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DebtStatus {
    Active,
    DueSoon,
    Overdue,
    Settled,
}

impl DebtStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DebtStatus::Active => "ACTIVE",
            DebtStatus::DueSoon => "DUE_SOON",
            DebtStatus::Overdue => "OVERDUE",
            DebtStatus::Settled => "SETTLED",
        }
    }
}

impl std::str::FromStr for DebtStatus {
    type Err = crate::error::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ACTIVE" => Ok(DebtStatus::Active),
            "DUE_SOON" => Ok(DebtStatus::DueSoon),
            "OVERDUE" => Ok(DebtStatus::Overdue),
            "SETTLED" => Ok(DebtStatus::Settled),
            _ => Err(crate::error::ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: vec![
                    "ACTIVE".to_string(),
                    "DUE_SOON".to_string(),
                    "OVERDUE".to_string(),
                    "SETTLED".to_string(),
                ],
            }),
        }
    }
}

/// The unpaid part of a credit sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Debt {
    pub id: String,
    pub invoice_id: String,
    pub customer_id: String,
    pub original_amount_afn: Money,
    pub paid_amount_afn: Money,
    pub remaining_balance_afn: Money,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub settled_at: Option<DateTime<Utc>>,
}

impl Debt {
    pub fn status(&self, now: DateTime<Utc>) -> DebtStatus {
        derive_debt_status(self.remaining_balance_afn, self.due_date, now)
    }
}

// =============================================================================
// Payment
// =============================================================================

/// Money moving between the shop and a customer.
///
/// `amount_afn` is authoritative; `amount_usd` is secondary bookkeeping
/// derived with `exchange_rate`.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Payment {
    pub id: String,
    pub customer_id: Option<String>,
    pub invoice_id: Option<String>,
    pub kind: PaymentKind,
    pub method: PaymentMethod,
    pub amount_afn: Money,
    pub amount_usd: Money,
    #[ts(type = "number")]
    pub exchange_rate: ExchangeRate,
    pub note: Option<String>,
    pub user_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Expense
// =============================================================================

/// A shop expense (rent, electricity, wages...). Recorded in AFN.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Expense {
    pub id: String,
    pub description: String,
    pub category: String,
    pub amount_afn: Money,
    /// USD equivalent at the rate current when the expense was recorded.
    pub amount_usd: Money,
    #[ts(type = "number")]
    pub exchange_rate: ExchangeRate,
    #[ts(as = "String")]
    pub expense_date: NaiveDate,
    pub user_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Audit Log
// =============================================================================

/// Things worth an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "SCREAMING_SNAKE_CASE"))]
#[ts(export)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    SaleCreated,
    SaleDeleted,
    ReturnApplied,
    PaymentReceived,
    ProductCreated,
    ProductUpdated,
    StockAdjusted,
    CustomerCreated,
    CustomerUpdated,
    ExpenseCreated,
    ExpenseDeleted,
    ExchangeRateChanged,
    AdminKeyRotated,
}

/// An append-only audit entry. There is no update or delete path.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct AuditLog {
    pub id: String,
    pub action: AuditAction,
    /// Entity kind: "invoice", "customer", "expense", ...
    pub entity: String,
    pub entity_id: String,
    /// JSON document with action-specific details.
    pub details: String,
    pub user_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// User
// =============================================================================

#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Admin,
    Cashier,
}

/// A person who can log in.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct User {
    pub id: String,
    pub username: String,
    pub display_name: String,
    /// Argon2 PHC string. Never leaves the server.
    #[serde(skip_serializing, default)]
    #[ts(skip)]
    pub password_hash: String,
    pub role: UserRole,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Configuration Types
// =============================================================================

/// Store-wide settings kept in the database.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StoreSettings {
    pub store_name: String,
    #[ts(type = "number")]
    pub exchange_rate: ExchangeRate,
    pub tax_rate: TaxRate,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tax_rate_from_bps() {
        let rate = TaxRate::from_bps(825);
        assert_eq!(rate.bps(), 825);
        assert!((rate.percentage() - 8.25).abs() < 0.001);
    }

    #[test]
    fn test_tax_rate_from_percentage() {
        let rate = TaxRate::from_percentage(8.25);
        assert_eq!(rate.bps(), 825);
    }

    #[test]
    fn test_product_low_stock_and_can_sell() {
        let mut product = Product::sample("SUGAR-1KG", Money::from_cents(150));
        product.stock = 5;
        assert!(product.is_low_stock());
        assert!(product.can_sell(5));
        assert!(!product.can_sell(6));

        product.is_active = false;
        assert!(!product.can_sell(1));
    }

    #[test]
    fn test_invoice_item_returnable_quantity() {
        let item = InvoiceItem {
            id: "i".into(),
            invoice_id: "inv".into(),
            product_id: "p".into(),
            sku_snapshot: "SKU".into(),
            name_snapshot: "Name".into(),
            quantity: 5,
            returned_quantity: 3,
            unit_price_usd: Money::from_cents(100),
            unit_price_afn: Money::from_cents(7000),
            unit_cost_usd: Money::from_cents(60),
            line_total_usd: Money::from_cents(500),
            line_total_afn: Money::from_cents(35_000),
            created_at: Utc::now(),
        };
        assert_eq!(item.returnable_quantity(), 2);
        assert_eq!(item.net_cost_usd().cents(), 120);
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&InvoiceStatus::Partial).unwrap(), "\"PARTIAL\"");
        assert_eq!(serde_json::to_string(&DebtStatus::DueSoon).unwrap(), "\"DUE_SOON\"");
        assert_eq!(
            serde_json::to_string(&PaymentMethod::BankTransfer).unwrap(),
            "\"bank_transfer\""
        );
        assert_eq!("due_soon".parse::<DebtStatus>().unwrap(), DebtStatus::DueSoon);
        assert!("late".parse::<DebtStatus>().is_err());
    }

    #[test]
    fn test_user_hash_is_not_serialized() {
        let user = User {
            id: "u".into(),
            username: "admin".into(),
            display_name: "Admin".into(),
            password_hash: "$argon2id$secret".into(),
            role: UserRole::Admin,
            is_active: true,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
    }
}
