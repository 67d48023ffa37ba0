//! # Repository Module
//!
//! Database repository implementations for Dukan POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  HTTP Handler                                                           │
//! │       │                                                                 │
//! │       │  db.sales().create_sale(new_sale)                               │
//! │       ▼                                                                 │
//! │  SaleRepository                                                         │
//! │  ├── BEGIN                                                              │
//! │  ├── load products, customer, settings                                  │
//! │  ├── dukan_core::checkout::checkout(...)   ← pure math                  │
//! │  ├── INSERT invoice, items, payment, debt                               │
//! │  ├── UPDATE stock, customer balance                                     │
//! │  ├── INSERT audit_logs                                                  │
//! │  └── COMMIT                                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every ledger mutation runs inside one SQL transaction. The money math is
//! done by `dukan-core`; repositories only load inputs and persist outputs.
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`] - Catalogue, search, stock adjustments
//! - [`CustomerRepository`] - Customers and their balances
//! - [`SaleRepository`] - Checkout, returns, deletion
//! - [`PaymentRepository`] - Debt payments and refunds
//! - [`DebtRepository`] - Debt listing and status summary
//! - [`ExpenseRepository`] - Shop expenses
//! - [`AuditRepository`] - Append-only audit trail
//! - [`UserRepository`] - Login accounts
//! - [`SettingsRepository`] - Exchange rate, tax rate, admin key
//! - [`ReportRepository`] - Dashboard and period reports

pub mod audit;
pub mod customer;
pub mod debt;
pub mod expense;
pub mod payment;
pub mod product;
pub mod report;
pub mod sale;
pub mod settings;
pub mod user;

pub use audit::{AuditEntry, AuditRepository};
pub use customer::{CustomerRepository, CustomerUpdate, NewCustomer};
pub use debt::{DebtFilter, DebtRecord, DebtRepository};
pub use expense::{ExpenseFilter, ExpenseRepository, NewExpense};
pub use payment::{PaymentReceipt, PaymentRepository, ReceivePayment};
pub use product::{NewProduct, ProductRepository, ProductUpdate};
pub use report::ReportRepository;
pub use sale::{
    NewSale, ReturnReceipt, SaleDetail, SaleFilter, SaleLineRequest, SaleReceipt, SaleRepository,
};
pub use settings::SettingsRepository;
pub use user::UserRepository;
