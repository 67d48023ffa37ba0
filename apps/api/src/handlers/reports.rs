//! # Report Handlers
//!
//! ```text
//! GET /reports/dashboard
//! GET /reports/period?kind=monthly&year=2026&month=10
//! GET /reports/period?kind=yearly&year=2026
//! GET /reports/period?kind=range&from=2026-10-01&to=2026-10-15   (inclusive)
//! ```

use std::sync::Arc;

use axum::extract::State;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::extract::{Json, Query};
use crate::state::AppState;
use dukan_core::report::{Dashboard, PeriodReport, ReportPeriod};

#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    pub kind: String,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl TryFrom<PeriodQuery> for ReportPeriod {
    type Error = ApiError;

    fn try_from(query: PeriodQuery) -> Result<Self, Self::Error> {
        let required = |field: &str| ApiError::field(field, format!("{field} is required"));
        match query.kind.trim().to_ascii_lowercase().as_str() {
            "monthly" => Ok(ReportPeriod::Monthly {
                year: query.year.ok_or_else(|| required("year"))?,
                month: query.month.ok_or_else(|| required("month"))?,
            }),
            "yearly" => Ok(ReportPeriod::Yearly {
                year: query.year.ok_or_else(|| required("year"))?,
            }),
            "range" => Ok(ReportPeriod::Range {
                from: query.from.ok_or_else(|| required("from"))?,
                to: query.to.ok_or_else(|| required("to"))?,
            }),
            other => Err(ApiError::field(
                "kind",
                format!("unknown report kind '{other}': expected monthly, yearly or range"),
            )),
        }
    }
}

/// `GET /reports/dashboard`
pub async fn dashboard(State(state): State<Arc<AppState>>) -> ApiResult<Json<Dashboard>> {
    Ok(Json(state.db.reports().dashboard(Utc::now()).await?))
}

/// `GET /reports/period`
pub async fn period_report(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PeriodQuery>,
) -> ApiResult<Json<PeriodReport>> {
    let period = ReportPeriod::try_from(query)?;
    Ok(Json(state.db.reports().period(period).await?))
}
