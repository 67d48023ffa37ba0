//! JWT authentication module.
//!
//! Login hands out a signed access token; every other route (except
//! `/health` and `/auth/login`) goes through [`require_auth`].
//!
//! ```text
//! Authorization: Bearer <jwt>
//!        │
//!        ▼
//! require_auth ──► JwtManager::validate_access_token ──► CurrentUser
//!        │                                              (request extension)
//!        ▼
//! handler(Extension(user): Extension<CurrentUser>, ...)
//! ```
//!
//! Destructive actions additionally check the store's admin key with
//! [`verify_admin_key`].

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use dukan_core::{User, UserRole};

const ACCESS_TOKEN: &str = "access";

/// JWT claims structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: String,

    pub username: String,

    pub role: UserRole,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration (Unix timestamp)
    pub exp: i64,

    /// JWT ID (unique identifier for this token)
    pub jti: String,

    pub token_type: String,
}

/// JWT token manager.
#[derive(Clone)]
pub struct JwtManager {
    secret: String,
    access_lifetime_secs: i64,
}

impl JwtManager {
    pub fn new(secret: String, access_lifetime_secs: i64) -> Self {
        JwtManager {
            secret,
            access_lifetime_secs,
        }
    }

    pub fn access_lifetime_secs(&self) -> i64 {
        self.access_lifetime_secs
    }

    /// Generate an access token for `user`.
    pub fn generate_access_token(&self, user: &User) -> ApiResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.access_lifetime_secs);

        let claims = Claims {
            sub: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            iat: now.timestamp(),
            exp: exp.timestamp(),
            jti: Uuid::new_v4().to_string(),
            token_type: ACCESS_TOKEN.to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .map_err(|e| ApiError::internal(format!("Failed to generate token: {e}")))
    }

    /// Validate and decode an access token.
    pub fn validate_access_token(&self, token: &str) -> ApiResult<Claims> {
        let token_data: TokenData<Claims> = decode(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|e| ApiError::unauthorized(format!("Invalid token: {e}")))?;

        if token_data.claims.token_type != ACCESS_TOKEN {
            return Err(ApiError::unauthorized("Expected access token"));
        }
        Ok(token_data.claims)
    }
}

/// Extract bearer token from authorization header.
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// The authenticated caller, inserted into request extensions.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub id: String,
    pub username: String,
    pub role: UserRole,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }

    /// Rejects non-admin callers with `403 FORBIDDEN`.
    pub fn require_admin(&self) -> ApiResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(ApiError::forbidden("Administrator role required"))
        }
    }
}

impl From<Claims> for CurrentUser {
    fn from(claims: Claims) -> Self {
        CurrentUser {
            id: claims.sub,
            username: claims.username,
            role: claims.role,
        }
    }
}

/// Middleware: rejects requests without a valid bearer token.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

    let token = extract_bearer_token(header)
        .ok_or_else(|| ApiError::unauthorized("Expected a Bearer token"))?;

    let claims = state.jwt.validate_access_token(token)?;
    debug!(user = %claims.username, path = %request.uri().path(), "Authenticated request");

    request.extensions_mut().insert(CurrentUser::from(claims));
    Ok(next.run(request).await)
}

/// Checks the store's admin key for a destructive action.
pub async fn verify_admin_key(state: &AppState, key: &str, user: &CurrentUser) -> ApiResult<()> {
    if key.is_empty() || !state.db.settings().verify_admin_key(key).await? {
        warn!(user = %user.username, "Admin key rejected");
        return Err(ApiError::admin_key_invalid());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn user(role: UserRole) -> User {
        User {
            id: "user-001".to_string(),
            username: "karim".to_string(),
            display_name: "Karim".to_string(),
            password_hash: String::new(),
            role,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test-secret-0123456789".to_string(), 3600);

        let token = manager.generate_access_token(&user(UserRole::Cashier)).unwrap();
        let claims = manager.validate_access_token(&token).unwrap();

        assert_eq!(claims.sub, "user-001");
        assert_eq!(claims.username, "karim");
        assert_eq!(claims.role, UserRole::Cashier);
        assert_eq!(claims.token_type, "access");
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let issuer = JwtManager::new("test-secret-0123456789".to_string(), 3600);
        let other = JwtManager::new("another-secret-987654".to_string(), 3600);

        let token = issuer.generate_access_token(&user(UserRole::Admin)).unwrap();
        let err = other.validate_access_token(&token).unwrap_err();
        assert_eq!(err.code, ErrorCode::AuthFailed);
    }

    #[test]
    fn test_expired_token_rejected() {
        let manager = JwtManager::new("test-secret-0123456789".to_string(), -3600);
        let token = manager.generate_access_token(&user(UserRole::Admin)).unwrap();
        assert!(manager.validate_access_token(&token).is_err());
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Basic abc"), None);
    }

    #[test]
    fn test_require_admin() {
        let cashier = CurrentUser {
            id: "u".into(),
            username: "c".into(),
            role: UserRole::Cashier,
        };
        assert_eq!(cashier.require_admin().unwrap_err().code, ErrorCode::Forbidden);
    }
}
