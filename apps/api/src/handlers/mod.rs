//! # HTTP Handlers
//!
//! Every route of the JSON API.
//!
//! ## Handler Organization
//! ```text
//! handlers/
//! ├── mod.rs        ◄─── You are here (shared request helpers)
//! ├── health.rs     ◄─── Liveness + database check
//! ├── auth.rs       ◄─── Login, current user
//! ├── products.rs   ◄─── Catalogue CRUD, stock adjustments
//! ├── customers.rs  ◄─── Customers, ledger, debt payments
//! ├── checkout.rs   ◄─── Quote (no writes)
//! ├── sales.rs      ◄─── Sales, returns, admin deletes
//! ├── debts.rs      ◄─── Debt listing and summary
//! ├── expenses.rs   ◄─── Shop expenses
//! ├── reports.rs    ◄─── Dashboard, period reports
//! ├── settings.rs   ◄─── Exchange rate, admin key
//! └── audit.rs      ◄─── Audit trail
//! ```
//!
//! ## How Handlers Work
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Request Flow                                         │
//! │                                                                         │
//! │  POST /sales  { "items": [...], "amount_paid_afn": 6300 }               │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  require_auth ──► Extension<CurrentUser>                                │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  handler: decimal amounts ──► Money (minor units)                       │
//! │           state.db.sales().create_sale(..)                              │
//! │         │                                                               │
//! │         ▼                                                               │
//! │  Json<SaleReceipt>   or   ApiError { code, message, fields }            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Request bodies carry amounts as decimal major units (`6300.5` AFN,
//! `12.99` USD). Responses carry the core types, which serialize money in
//! minor units.

pub mod audit;
pub mod auth;
pub mod checkout;
pub mod customers;
pub mod debts;
pub mod expenses;
pub mod health;
pub mod products;
pub mod reports;
pub mod sales;
pub mod settings;

use chrono::{DateTime, Days, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer};

use crate::error::{ApiError, ApiResult};
use dukan_core::{Money, ValidationError, MAX_AMOUNT};

/// Body of admin-gated actions.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminKeyRequest {
    #[serde(alias = "adminPassword")]
    pub admin_password: String,
}

/// Converts a decimal amount from a request body into minor units.
///
/// Non-finite values and anything beyond [`MAX_AMOUNT`] either way are rejected.
pub(crate) fn money(field: &str, amount: f64) -> ApiResult<Money> {
    Money::from_major_f64(amount).ok_or_else(|| {
        ValidationError::OutOfRange {
            field: field.to_string(),
            min: -MAX_AMOUNT.major(),
            max: MAX_AMOUNT.major(),
        }
        .into()
    })
}

pub(crate) fn optional_money(field: &str, amount: Option<f64>) -> ApiResult<Option<Money>> {
    amount.map(|a| money(field, a)).transpose()
}

/// Distinguishes "absent" (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Clamps a requested page size.
pub(crate) fn page_limit(requested: Option<u32>, default: u32, max: u32) -> u32 {
    requested.unwrap_or(default).clamp(1, max)
}

/// Turns inclusive calendar dates into a half-open UTC range.
pub(crate) fn date_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> ApiResult<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> {
    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            return Err(ApiError::field("from", "from must not be after to"));
        }
    }
    let start = from.map(|d| Utc.from_utc_datetime(&d.and_time(NaiveTime::MIN)));
    let end = to
        .map(|d| {
            d.checked_add_days(Days::new(1))
                .map(|next| Utc.from_utc_datetime(&next.and_time(NaiveTime::MIN)))
                .ok_or_else(|| ApiError::field("to", "date out of range"))
        })
        .transpose()?;
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Patch {
        #[serde(default, deserialize_with = "double_option")]
        limit: Option<Option<f64>>,
    }

    #[test]
    fn test_double_option() {
        let absent: Patch = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.limit, None);

        let cleared: Patch = serde_json::from_str(r#"{"limit": null}"#).unwrap();
        assert_eq!(cleared.limit, Some(None));

        let set: Patch = serde_json::from_str(r#"{"limit": 50.5}"#).unwrap();
        assert_eq!(set.limit, Some(Some(50.5)));
    }

    #[test]
    fn test_money_conversion() {
        assert_eq!(money("amount_afn", 6300.5).unwrap().cents(), 630_050);
        assert!(money("amount_afn", f64::NAN).is_err());

        let err = money("amount_afn", 5.0e16).unwrap_err();
        assert_eq!(err.fields[0].field, "amount_afn");
        assert!(money("amount_afn", -1.0e10).is_ok());
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let day = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let (start, end) = date_range(Some(day), Some(day)).unwrap();
        assert_eq!(start.unwrap().to_rfc3339(), "2026-03-15T00:00:00+00:00");
        assert_eq!(end.unwrap().to_rfc3339(), "2026-03-16T00:00:00+00:00");

        let later = NaiveDate::from_ymd_opt(2026, 3, 16).unwrap();
        assert!(date_range(Some(later), Some(day)).is_err());
    }

    #[test]
    fn test_admin_key_alias() {
        let body: AdminKeyRequest = serde_json::from_str(r#"{"adminPassword": "k"}"#).unwrap();
        assert_eq!(body.admin_password, "k");
    }
}
