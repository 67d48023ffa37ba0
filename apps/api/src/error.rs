//! # API Error Type
//!
//! Unified error type for HTTP handlers.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in Dukan POS                              │
//! │                                                                         │
//! │  ValidationError ─┐                                                     │
//! │  CheckoutError ───┼──► CoreError ──► DbError ──► ApiError ──► JSON      │
//! │                   │                                 │                   │
//! │                   │                                 ▼                   │
//! │                   │                         HTTP status per code        │
//! │                                                                         │
//! │  {                                                                      │
//! │    "code": "VALIDATION_ERROR",                                          │
//! │    "message": "phone has invalid format: ...",                          │
//! │    "fields": [{ "field": "phone", "message": "..." }]                   │
//! │  }                                                                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use dukan_core::{CheckoutError, CoreError, ValidationError};
use dukan_db::DbError;

/// Error body returned by every failing request.
#[derive(Debug, Clone, Serialize)]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,

    /// Per-field messages for form validation
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<FieldError>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Resource not found (404)
    NotFound,

    /// Input validation failed (400)
    ValidationError,

    /// Missing or bad bearer token, wrong credentials (401)
    AuthFailed,

    /// Authenticated but not allowed (403)
    Forbidden,

    /// Admin key verification failed (403)
    AdminKeyInvalid,

    /// Duplicate SKU, username... (409)
    Conflict,

    /// Insufficient stock (409)
    InsufficientStock,

    /// Credit sale rules: customer, due date, credit limit (422)
    CheckoutRejected,

    /// Payment or return amounts that do not add up (422)
    PaymentError,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,

    /// Database unreachable (503)
    Unavailable,
}

impl ErrorCode {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::AuthFailed => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden | ErrorCode::AdminKeyInvalid => StatusCode::FORBIDDEN,
            ErrorCode::Conflict | ErrorCode::InsufficientStock => StatusCode::CONFLICT,
            ErrorCode::CheckoutRejected | ErrorCode::PaymentError => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ErrorCode::DatabaseError | ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{resource} not found: {id}"))
    }

    /// Creates a validation error for one field.
    pub fn field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        ApiError {
            code: ErrorCode::ValidationError,
            message: message.clone(),
            fields: vec![FieldError {
                field: field.to_string(),
                message,
            }],
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::AuthFailed, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Forbidden, message)
    }

    /// The "Admin Key" verification failure shown on destructive actions.
    pub fn admin_key_invalid() -> Self {
        ApiError::new(ErrorCode::AdminKeyInvalid, "Admin Key verification failed")
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::field(err.field(), err.to_string())
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::EmptyCart => ApiError::field("items", err.to_string()),
            CheckoutError::NegativeTender | CheckoutError::TenderTooLarge => {
                ApiError::field("amount_afn", err.to_string())
            }
            CheckoutError::DueDateRequired => ApiError::field("due_date", err.to_string()),
            CheckoutError::CustomerRequiredForCredit
            | CheckoutError::CustomerRequiredForStoredCredit => {
                ApiError::new(ErrorCode::CheckoutRejected, err.to_string())
            }
            CheckoutError::CreditLimitExceeded { .. } => {
                ApiError::new(ErrorCode::CheckoutRejected, err.to_string())
            }
        }
    }
}

/// Malformed request bodies answer with the same JSON shape as every
/// other validation failure.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        let message = rejection.body_text();
        let field = missing_field(&message).unwrap_or("body").to_string();
        ApiError::field(&field, message)
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        let message = rejection.body_text();
        let field = missing_field(&message).unwrap_or("query").to_string();
        ApiError::field(&field, message)
    }
}

/// Pulls `amount_paid_afn` out of serde's "missing field `amount_paid_afn`".
fn missing_field(message: &str) -> Option<&str> {
    let rest = &message[message.find("missing field `")? + "missing field `".len()..];
    rest.split('`').next().filter(|f| !f.is_empty())
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::CustomerNotFound(id) => ApiError::not_found("Customer", &id),
            CoreError::InvoiceNotFound(id) => ApiError::not_found("Invoice", &id),
            CoreError::InvoiceItemNotFound(id) => ApiError::not_found("Invoice item", &id),
            CoreError::InsufficientStock { .. } => {
                ApiError::new(ErrorCode::InsufficientStock, err.to_string())
            }
            CoreError::CartTooLarge { .. } => ApiError::field("items", err.to_string()),
            CoreError::QuantityTooLarge { .. } => ApiError::field("quantity", err.to_string()),
            CoreError::InvalidPaymentAmount { .. }
            | CoreError::DuplicateReturnItem(_)
            | CoreError::ReturnExceedsSold { .. }
            | CoreError::NothingToReturn(_) => {
                ApiError::new(ErrorCode::PaymentError, err.to_string())
            }
            CoreError::Checkout(e) => e.into(),
            CoreError::Validation(e) => e.into(),
        }
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::Core(e) => e.into(),
            DbError::UniqueViolation { field, value } => ApiError {
                code: ErrorCode::Conflict,
                message: format!("{field} '{value}' already exists"),
                fields: vec![FieldError {
                    field: field.clone(),
                    message: "already exists".to_string(),
                }],
            },
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::CheckViolation(message) => {
                tracing::error!("Check constraint violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Rejected by a data constraint")
            }
            DbError::ConnectionFailed(_) | DbError::PoolExhausted => {
                ApiError::new(ErrorCode::Unavailable, "Database unavailable")
            }
            DbError::MigrationFailed(_) => {
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) | DbError::Corrupt(e) | DbError::Internal(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database operation failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for handlers.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_carries_field() {
        let err: ApiError = ValidationError::Required {
            field: "name".to_string(),
        }
        .into();
        assert_eq!(err.code, ErrorCode::ValidationError);
        assert_eq!(err.fields.len(), 1);
        assert_eq!(err.fields[0].field, "name");
        assert_eq!(err.code.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_nested_core_errors_map_through() {
        let err = DbError::Core(CoreError::Checkout(CheckoutError::DueDateRequired));
        let err: ApiError = err.into();
        assert_eq!(err.fields[0].field, "due_date");

        let err: ApiError = DbError::Core(CoreError::CustomerNotFound("c1".into())).into();
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.code.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_missing_field_from_serde_message() {
        let message = "Failed to deserialize the JSON body into the target type: \
                       missing field `amount_paid_afn` at line 1 column 13";
        assert_eq!(missing_field(message), Some("amount_paid_afn"));
        assert_eq!(missing_field("invalid type: integer `5`, expected a string"), None);
    }

    #[test]
    fn test_serialized_shape() {
        let json = serde_json::to_value(ApiError::admin_key_invalid()).unwrap();
        assert_eq!(json["code"], "ADMIN_KEY_INVALID");
        assert!(json.get("fields").is_none());
        assert_eq!(ErrorCode::AdminKeyInvalid.status(), StatusCode::FORBIDDEN);
    }
}
