//! # Product Handlers
//!
//! Catalogue listing, search and maintenance.
//!
//! ## Search
//! ```text
//! GET /products?q=rice        ──► SKU / barcode exact match first, then name LIKE
//! GET /products               ──► active products by name
//! GET /products?include_inactive=true
//! ```
//!
//! Prices are entered in USD; `price_afn` pins a fixed AFN price that
//! ignores the exchange rate. Sending `"price_afn": null` on update
//! removes the pin.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Extension;
use serde::Deserialize;
use tracing::debug;

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Query};
use crate::handlers::{double_option, money, optional_money, page_limit};
use crate::state::AppState;
use dukan_core::Product;
use dukan_db::repository::{NewProduct, ProductUpdate};

#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub q: Option<String>,
    #[serde(default)]
    pub include_inactive: bool,
    pub limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub sku: String,
    pub barcode: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub price_usd: f64,
    pub price_afn: Option<f64>,
    #[serde(default)]
    pub cost_usd: f64,
    #[serde(default)]
    pub stock: i64,
    #[serde(default = "default_reorder_level")]
    pub reorder_level: i64,
}

fn default_reorder_level() -> i64 {
    5
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub sku: Option<String>,
    pub barcode: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_usd: Option<f64>,
    #[serde(default, deserialize_with = "double_option")]
    pub price_afn: Option<Option<f64>>,
    pub cost_usd: Option<f64>,
    pub reorder_level: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct StockAdjustmentRequest {
    /// Positive when receiving goods, negative for shrinkage.
    pub delta: i64,
    pub reason: Option<String>,
}

/// `GET /products`
pub async fn list_products(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ProductQuery>,
) -> ApiResult<Json<Vec<Product>>> {
    let limit = page_limit(query.limit, 50, 500);
    let products = match query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => state.db.products().search(q, limit).await?,
        None => state.db.products().list(query.include_inactive, limit).await?,
    };
    debug!(count = products.len(), "Listed products");
    Ok(Json(products))
}

/// `POST /products`
pub async fn create_product(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateProductRequest>,
) -> ApiResult<(StatusCode, Json<Product>)> {
    let new = NewProduct {
        sku: req.sku,
        barcode: req.barcode,
        name: req.name,
        description: req.description,
        price_usd: money("price_usd", req.price_usd)?,
        price_afn: optional_money("price_afn", req.price_afn)?,
        cost_usd: money("cost_usd", req.cost_usd)?,
        stock: req.stock,
        reorder_level: req.reorder_level,
    };
    if new.stock < 0 {
        return Err(ApiError::field("stock", "stock cannot be negative"));
    }

    let product = state.db.products().insert(new, Some(&user.id)).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// `GET /products/{id}`
pub async fn get_product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<Product>> {
    state
        .db
        .products()
        .get_by_id(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Product", &id))
}

/// `PUT /products/{id}`
pub async fn update_product(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<UpdateProductRequest>,
) -> ApiResult<Json<Product>> {
    let price_afn = match req.price_afn {
        Some(value) => Some(optional_money("price_afn", value)?),
        None => None,
    };
    let changes = ProductUpdate {
        sku: req.sku,
        barcode: req.barcode,
        name: req.name,
        description: req.description,
        price_usd: optional_money("price_usd", req.price_usd)?,
        price_afn,
        cost_usd: optional_money("cost_usd", req.cost_usd)?,
        reorder_level: req.reorder_level,
        is_active: req.is_active,
    };

    let product = state.db.products().update(&id, changes, Some(&user.id)).await?;
    Ok(Json(product))
}

/// `POST /products/{id}/stock`
pub async fn adjust_stock(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<StockAdjustmentRequest>,
) -> ApiResult<Json<Product>> {
    if req.delta == 0 {
        return Err(ApiError::field("delta", "delta must not be zero"));
    }

    let product = state
        .db
        .products()
        .adjust_stock(&id, req.delta, req.reason.as_deref(), Some(&user.id))
        .await?;
    Ok(Json(product))
}
