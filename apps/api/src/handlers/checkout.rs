//! Checkout quote: the till's live totals while the cart is being built.

use std::sync::Arc;

use axum::extract::State;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extract::Json;
use crate::handlers::money;
use crate::state::AppState;
use dukan_core::checkout::{CheckoutSummary, OverpaymentMode, Tender};
use dukan_core::DiscountRate;
use dukan_db::repository::SaleLineRequest;

#[derive(Debug, Deserialize)]
pub struct QuoteRequest {
    pub items: Vec<SaleLineRequest>,
    #[serde(default)]
    pub discount_percent: f64,
    /// AFN handed over. Absent means exact payment.
    pub amount_paid_afn: Option<f64>,
    pub customer_id: Option<String>,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub overpayment: OverpaymentMode,
}

/// `POST /checkout/quote`
pub async fn quote(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QuoteRequest>,
) -> ApiResult<Json<CheckoutSummary>> {
    let discount = DiscountRate::from_percentage(req.discount_percent)?;
    let tender = match req.amount_paid_afn {
        Some(amount) => Some(Tender {
            amount_afn: money("amount_paid_afn", amount)?,
            customer_id: req.customer_id,
            due_date: req.due_date,
            overpayment: req.overpayment,
        }),
        None => None,
    };

    let summary = state.db.sales().quote(&req.items, discount, tender).await?;
    Ok(Json(summary))
}
