//! # Dukan API
//!
//! REST JSON server for Dukan POS.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Dukan API                                      │
//! │                                                                         │
//! │  Browser ──► CorsLayer ──► TraceLayer ──► Router                        │
//! │                                             │                           │
//! │                 ┌───────────────────────────┴──────────────┐            │
//! │                 ▼                                          ▼            │
//! │        public: /health, /auth/login          require_auth (bearer JWT)  │
//! │                                                            │            │
//! │                                                            ▼            │
//! │                                  handlers::* ──► dukan-db ──► SQLite    │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! See [`config::ApiConfig`]: defaults, then `dukan.toml`, then `DUKAN_*`
//! environment variables.

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{
    audit, checkout, customers, debts, expenses, health, products, reports, sales, settings,
};

// Re-exports
pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use state::AppState;

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    let protected = Router::new()
        .route("/auth/me", get(handlers::auth::me))
        // Catalogue
        .route("/products", get(products::list_products).post(products::create_product))
        .route("/products/{id}", get(products::get_product).put(products::update_product))
        .route("/products/{id}/stock", post(products::adjust_stock))
        // Customers
        .route("/customers", get(customers::list_customers).post(customers::create_customer))
        .route("/customers/{id}", get(customers::get_customer).put(customers::update_customer))
        .route("/customers/{id}/ledger", get(customers::customer_ledger))
        .route("/customers/{id}/payments", post(customers::receive_payment))
        // Sales
        .route("/checkout/quote", post(checkout::quote))
        .route("/sales", get(sales::list_sales).post(sales::create_sale))
        .route("/sales/bulk-delete", post(sales::bulk_delete_sales))
        .route("/sales/{id}", get(sales::get_sale).delete(sales::delete_sale))
        .route("/sales/{id}/returns", post(sales::apply_return))
        // Debts
        .route("/debts", get(debts::list_debts))
        .route("/debts/summary", get(debts::debt_summary))
        // Expenses
        .route("/expenses", get(expenses::list_expenses).post(expenses::create_expense))
        .route("/expenses/{id}", axum::routing::delete(expenses::delete_expense))
        // Reports
        .route("/reports/dashboard", get(reports::dashboard))
        .route("/reports/period", get(reports::period_report))
        // Settings
        .route("/settings", get(settings::store_settings))
        .route(
            "/settings/exchange-rate",
            get(settings::get_exchange_rate).put(settings::set_exchange_rate),
        )
        .route("/settings/admin-key", put(settings::rotate_admin_key))
        .route("/audit-logs", get(audit::list_audit_logs))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    let cors = if state.config.cors_permissive {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health::health))
        .route("/auth/login", post(handlers::auth::login))
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
