//! # Customer Handlers
//!
//! Customers, their debt ledger and debt payments.
//!
//! ## Displayed Balance
//! ```text
//! outstanding_balance_afn set?  ──yes──► show it as is (Fixed)
//!            │
//!            no
//!            ▼
//! outstanding_balance_usd × current exchange rate
//! ```
//! A negative balance is store credit owed to the customer.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Extension;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Query};
use crate::handlers::{double_option, money, optional_money, page_limit};
use crate::state::AppState;
use dukan_core::{Customer, ExchangeRate, Money, Payment, PaymentMethod};
use dukan_db::repository::{CustomerUpdate, DebtRecord, NewCustomer, PaymentReceipt, ReceivePayment};

/// A customer with the balance as the till shows it.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerView {
    #[serde(flatten)]
    pub customer: Customer,
    pub balance_afn: Money,
    /// True when the store owes the customer.
    pub has_credit: bool,
}

impl CustomerView {
    pub fn at(customer: Customer, rate: ExchangeRate) -> Self {
        let balance = customer.balance();
        CustomerView {
            balance_afn: balance.displayed_afn(rate),
            has_credit: balance.is_credit(rate),
            customer,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CustomerLedger {
    pub customer: CustomerView,
    pub debts: Vec<DebtRecord>,
    pub payments: Vec<Payment>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CustomerQuery {
    pub q: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCustomerRequest {
    pub name: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub credit_limit_usd: Option<f64>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateCustomerRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub credit_limit_usd: Option<Option<f64>>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReceivePaymentRequest {
    /// AFN. Negative refunds store credit.
    pub amount_afn: f64,
    #[serde(default)]
    pub method: PaymentMethod,
    pub note: Option<String>,
}

async fn fetch_customer(state: &AppState, id: &str) -> ApiResult<Customer> {
    state
        .db
        .customers()
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("Customer", id))
}

/// `GET /customers`
pub async fn list_customers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CustomerQuery>,
) -> ApiResult<Json<Vec<CustomerView>>> {
    let rate = state.db.settings().exchange_rate().await?;
    let customers = state
        .db
        .customers()
        .list(query.q.as_deref(), page_limit(query.limit, 100, 500))
        .await?;
    Ok(Json(customers.into_iter().map(|c| CustomerView::at(c, rate)).collect()))
}

/// `POST /customers`
pub async fn create_customer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateCustomerRequest>,
) -> ApiResult<(StatusCode, Json<CustomerView>)> {
    let new = NewCustomer {
        name: req.name,
        phone: req.phone,
        email: req.email,
        address: req.address,
        credit_limit_usd: optional_money("credit_limit_usd", req.credit_limit_usd)?,
        notes: req.notes,
    };
    let customer = state.db.customers().insert(new, Some(&user.id)).await?;
    let rate = state.db.settings().exchange_rate().await?;
    Ok((StatusCode::CREATED, Json(CustomerView::at(customer, rate))))
}

/// `GET /customers/{id}`
pub async fn get_customer(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<CustomerView>> {
    let customer = fetch_customer(&state, &id).await?;
    let rate = state.db.settings().exchange_rate().await?;
    Ok(Json(CustomerView::at(customer, rate)))
}

/// `PUT /customers/{id}`
pub async fn update_customer(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateCustomerRequest>,
) -> ApiResult<Json<CustomerView>> {
    let credit_limit_usd = match req.credit_limit_usd {
        Some(limit) => Some(optional_money("credit_limit_usd", limit)?),
        None => None,
    };
    let changes = CustomerUpdate {
        name: req.name,
        phone: req.phone,
        email: req.email,
        address: req.address,
        credit_limit_usd,
        notes: req.notes,
    };
    let customer = state.db.customers().update(&id, changes, Some(&user.id)).await?;
    let rate = state.db.settings().exchange_rate().await?;
    Ok(Json(CustomerView::at(customer, rate)))
}

/// `GET /customers/{id}/ledger`
pub async fn customer_ledger(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<CustomerLedger>> {
    let customer = fetch_customer(&state, &id).await?;
    let rate = state.db.settings().exchange_rate().await?;
    let debts = state.db.debts().for_customer(&id, Utc::now()).await?;
    let payments = state.db.payments().list_for_customer(&id, 200).await?;

    Ok(Json(CustomerLedger {
        customer: CustomerView::at(customer, rate),
        debts,
        payments,
    }))
}

/// `POST /customers/{id}/payments`
pub async fn receive_payment(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<ReceivePaymentRequest>,
) -> ApiResult<(StatusCode, Json<PaymentReceipt>)> {
    let payment = ReceivePayment {
        amount_afn: money("amount_afn", req.amount_afn)?,
        method: req.method,
        note: req.note,
    };
    let receipt = state
        .db
        .payments()
        .receive_payment(&id, payment, Some(&user.id))
        .await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}
