//! # Settings Handlers
//!
//! ```text
//! GET /settings                  store name, exchange rate, tax rate
//! GET /settings/exchange-rate    { "exchange_rate": 70.0 }
//! PUT /settings/exchange-rate    admin role; new invoices use it, old keep their snapshot
//! PUT /settings/admin-key        admin role + current key
//! ```

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use serde::{Deserialize, Serialize};

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::extract::Json;
use crate::state::AppState;
use dukan_core::validation::validate_exchange_rate;
use dukan_core::{ExchangeRate, StoreSettings, ValidationError};

const MIN_ADMIN_KEY_LEN: usize = 6;

#[derive(Debug, Serialize, Deserialize)]
pub struct ExchangeRateBody {
    /// AFN per USD.
    pub exchange_rate: f64,
}

#[derive(Debug, Deserialize)]
pub struct RotateAdminKeyRequest {
    #[serde(alias = "oldKey")]
    pub old_key: String,
    #[serde(alias = "newKey")]
    pub new_key: String,
}

/// `GET /settings`
pub async fn store_settings(State(state): State<Arc<AppState>>) -> ApiResult<Json<StoreSettings>> {
    Ok(Json(state.db.settings().store_settings().await?))
}

/// `GET /settings/exchange-rate`
pub async fn get_exchange_rate(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ExchangeRateBody>> {
    let rate = state.db.settings().exchange_rate().await?;
    Ok(Json(ExchangeRateBody {
        exchange_rate: rate.as_f64(),
    }))
}

/// `PUT /settings/exchange-rate`
pub async fn set_exchange_rate(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<ExchangeRateBody>,
) -> ApiResult<Json<ExchangeRateBody>> {
    user.require_admin()?;
    validate_exchange_rate(req.exchange_rate)?;
    let rate = ExchangeRate::from_f64(req.exchange_rate)?;

    let rate = state.db.settings().set_exchange_rate(rate, Some(&user.id)).await?;
    Ok(Json(ExchangeRateBody {
        exchange_rate: rate.as_f64(),
    }))
}

/// `PUT /settings/admin-key`
pub async fn rotate_admin_key(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<CurrentUser>,
    Json(req): Json<RotateAdminKeyRequest>,
) -> ApiResult<StatusCode> {
    user.require_admin()?;
    if req.new_key.chars().count() < MIN_ADMIN_KEY_LEN {
        return Err(ValidationError::TooShort {
            field: "new_key".to_string(),
            min: MIN_ADMIN_KEY_LEN,
        }
        .into());
    }

    if !state
        .db
        .settings()
        .rotate_admin_key(&req.old_key, &req.new_key, Some(&user.id))
        .await?
    {
        return Err(ApiError::admin_key_invalid());
    }
    Ok(StatusCode::NO_CONTENT)
}
