//! # Sale Handlers
//!
//! Checkout, sale history, returns and admin deletes.
//!
//! ## Checkout Request
//! ```text
//! {
//!   "items": [{ "product_id": "...", "quantity": 2 }],
//!   "discount_percent": 10,
//!   "amount_paid_afn": 5000,          ◄── less than total → debt
//!   "customer_id": "...",             ◄── required for debt / stored credit
//!   "due_date": "2026-11-01",         ◄── required for debt
//!   "overpayment": "store_as_credit", ◄── or "return_change" (default)
//!   "method": "cash"
//! }
//! ```
//!
//! Deleting a sale and applying a return are admin-gated: the body must
//! carry the store's admin key.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Extension;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::auth::{verify_admin_key, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Query};
use crate::handlers::{date_range, money, page_limit, AdminKeyRequest};
use crate::state::AppState;
use dukan_core::checkout::{OverpaymentMode, Tender};
use dukan_core::returns::ReturnRequestLine;
use dukan_core::{DiscountRate, Invoice, InvoiceStatus, PaymentMethod};
use dukan_db::repository::{
    NewSale, ReturnReceipt, SaleDetail, SaleFilter, SaleLineRequest, SaleReceipt,
};

/// Largest batch accepted by bulk delete.
const MAX_BULK_DELETE: usize = 200;

#[derive(Debug, Default, Deserialize)]
pub struct SaleQuery {
    /// Inclusive calendar dates.
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub customer_id: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSaleRequest {
    pub items: Vec<SaleLineRequest>,
    #[serde(default)]
    pub discount_percent: f64,
    pub amount_paid_afn: f64,
    pub customer_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub overpayment: OverpaymentMode,
    #[serde(default)]
    pub method: PaymentMethod,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReturnRequest {
    pub items: Vec<ReturnRequestLine>,
    #[serde(alias = "adminPassword")]
    pub admin_password: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<String>,
    #[serde(alias = "adminPassword")]
    pub admin_password: String,
}

#[derive(Debug, Serialize)]
pub struct BulkDeleteResponse {
    pub deleted: usize,
    pub invoices: Vec<Invoice>,
}

/// `GET /sales`
pub async fn list_sales(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SaleQuery>,
) -> ApiResult<Json<Vec<Invoice>>> {
    let (from, to) = date_range(query.from, query.to)?;
    let filter = SaleFilter {
        from,
        to,
        customer_id: query.customer_id,
        status: query.status,
        limit: page_limit(query.limit, 100, 1000),
    };
    let invoices = state.db.sales().list(&filter).await?;
    Ok(Json(invoices))
}

/// `POST /sales`
pub async fn create_sale(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateSaleRequest>,
) -> ApiResult<(StatusCode, Json<SaleReceipt>)> {
    let sale = NewSale {
        items: req.items,
        discount: DiscountRate::from_percentage(req.discount_percent)?,
        tender: Tender {
            amount_afn: money("amount_paid_afn", req.amount_paid_afn)?,
            customer_id: req.customer_id,
            due_date: req.due_date,
            overpayment: req.overpayment,
        },
        method: req.method,
        notes: req.notes,
        user_id: Some(user.id),
    };

    let receipt = state.db.sales().create_sale(sale).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// `GET /sales/{id}`
pub async fn get_sale(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SaleDetail>> {
    state
        .db
        .sales()
        .get_detail(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Invoice", &id))
}

/// `DELETE /sales/{id}`
pub async fn delete_sale(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<AdminKeyRequest>,
) -> ApiResult<Json<Invoice>> {
    verify_admin_key(&state, &req.admin_password, &user).await?;

    let invoice = state.db.sales().delete_sale(&id, Some(&user.id)).await?;
    info!(invoice = %invoice.invoice_number, user = %user.username, "Sale deleted");
    Ok(Json(invoice))
}

/// `POST /sales/bulk-delete`. All or nothing.
pub async fn bulk_delete_sales(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<BulkDeleteRequest>,
) -> ApiResult<Json<BulkDeleteResponse>> {
    if req.ids.is_empty() {
        return Err(ApiError::field("ids", "select at least one sale"));
    }
    if req.ids.len() > MAX_BULK_DELETE {
        return Err(ApiError::field(
            "ids",
            format!("at most {MAX_BULK_DELETE} sales can be deleted at once"),
        ));
    }
    verify_admin_key(&state, &req.admin_password, &user).await?;

    let invoices = state.db.sales().bulk_delete(&req.ids, Some(&user.id)).await?;
    info!(count = invoices.len(), user = %user.username, "Sales bulk deleted");
    Ok(Json(BulkDeleteResponse {
        deleted: invoices.len(),
        invoices,
    }))
}

/// `POST /sales/{id}/returns`
pub async fn apply_return(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<ReturnRequest>,
) -> ApiResult<Json<ReturnReceipt>> {
    if req.items.is_empty() {
        return Err(ApiError::field("items", "select at least one item to return"));
    }
    verify_admin_key(&state, &req.admin_password, &user).await?;

    let receipt = state
        .db
        .sales()
        .apply_return(&id, &req.items, Some(&user.id))
        .await?;
    Ok(Json(receipt))
}
