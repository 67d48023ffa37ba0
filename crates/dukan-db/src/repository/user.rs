//! # User Repository
//!
//! Login accounts. Passwords are stored as argon2 hashes.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::credentials::{hash_secret, verify_secret};
use crate::error::DbResult;
use dukan_core::{User, UserRole};

#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserRepository { pool }
    }

    /// Creates a user with a freshly hashed password.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - username already taken
    pub async fn create(
        &self,
        username: &str,
        display_name: &str,
        password: &str,
        role: UserRole,
    ) -> DbResult<User> {
        debug!(username = %username, role = ?role, "Creating user");

        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.trim().to_lowercase(),
            display_name: display_name.trim().to_string(),
            password_hash: hash_secret(password)?,
            role,
            is_active: true,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO users
                (id, username, display_name, password_hash, role, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&user.id)
        .bind(&user.username)
        .bind(&user.display_name)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await?;

        Ok(user)
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, display_name, password_hash, role, is_active, created_at
            FROM users WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    pub async fn get_by_username(&self, username: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, username, display_name, password_hash, role, is_active, created_at
            FROM users WHERE username = ?1
            "#,
        )
        .bind(username.trim().to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    /// Returns the user when the credentials match an active account.
    pub async fn authenticate(&self, username: &str, password: &str) -> DbResult<Option<User>> {
        let Some(user) = self.get_by_username(username).await? else {
            return Ok(None);
        };
        if !user.is_active || !verify_secret(password, &user.password_hash) {
            debug!(username = %username, "Rejected login");
            return Ok(None);
        }
        Ok(Some(user))
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
