//! Shop expenses (rent, electricity, wages...), recorded in AFN.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Extension;
use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use crate::auth::{verify_admin_key, CurrentUser};
use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Query};
use crate::handlers::{money, AdminKeyRequest};
use crate::state::AppState;
use dukan_core::Expense;
use dukan_db::repository::{ExpenseFilter, NewExpense};

#[derive(Debug, Default, Deserialize)]
pub struct ExpenseQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateExpenseRequest {
    pub description: String,
    pub category: String,
    pub amount_afn: f64,
    /// Defaults to today.
    pub expense_date: Option<NaiveDate>,
}

/// `GET /expenses`
pub async fn list_expenses(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExpenseQuery>,
) -> ApiResult<Json<Vec<Expense>>> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(ApiError::field("from", "from must not be after to"));
        }
    }
    let filter = ExpenseFilter {
        from: query.from,
        to: query.to,
        category: query.category,
    };
    Ok(Json(state.db.expenses().list(&filter).await?))
}

/// `POST /expenses`
pub async fn create_expense(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<CreateExpenseRequest>,
) -> ApiResult<(StatusCode, Json<Expense>)> {
    let new = NewExpense {
        description: req.description,
        category: req.category,
        amount_afn: money("amount_afn", req.amount_afn)?,
        expense_date: req.expense_date,
    };
    let expense = state.db.expenses().create(new, Some(&user.id)).await?;
    Ok((StatusCode::CREATED, Json(expense)))
}

/// `DELETE /expenses/{id}`
pub async fn delete_expense(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(req): Json<AdminKeyRequest>,
) -> ApiResult<Json<Expense>> {
    verify_admin_key(&state, &req.admin_password, &user).await?;

    let expense = state.db.expenses().delete(&id, Some(&user.id)).await?;
    info!(expense = %expense.id, user = %user.username, "Expense deleted");
    Ok(Json(expense))
}
