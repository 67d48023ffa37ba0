//! Debt listing. Status is derived at request time, never stored.

use std::sync::Arc;

use axum::extract::State;
use chrono::Utc;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::extract::{Json, Query};
use crate::state::AppState;
use dukan_core::ledger::DebtSummary;
use dukan_core::DebtStatus;
use dukan_db::repository::{DebtFilter, DebtRecord};

#[derive(Debug, Default, Deserialize)]
pub struct DebtQuery {
    pub customer_id: Option<String>,
    /// ACTIVE, DUE_SOON, OVERDUE or SETTLED (case-insensitive).
    pub status: Option<String>,
    #[serde(default)]
    pub include_settled: bool,
}

/// `GET /debts`
pub async fn list_debts(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DebtQuery>,
) -> ApiResult<Json<Vec<DebtRecord>>> {
    let status = query
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::parse::<DebtStatus>)
        .transpose()?;

    let filter = DebtFilter {
        customer_id: query.customer_id,
        status,
        include_settled: query.include_settled,
    };
    let debts = state.db.debts().list(&filter, Utc::now()).await?;
    Ok(Json(debts))
}

/// `GET /debts/summary`
pub async fn debt_summary(State(state): State<Arc<AppState>>) -> ApiResult<Json<DebtSummary>> {
    Ok(Json(state.db.debts().summary(Utc::now()).await?))
}
