//! Shared application state.
//!
//! ```text
//! Arc<AppState>
//! ├── db      Database (SQLite pool, cheap to clone, thread-safe)
//! ├── config  ApiConfig (read-only after start-up)
//! └── jwt     JwtManager (signing key + token lifetime)
//! ```

use crate::auth::JwtManager;
use crate::config::ApiConfig;
use dukan_db::Database;

pub struct AppState {
    pub db: Database,
    pub config: ApiConfig,
    pub jwt: JwtManager,
}

impl AppState {
    pub fn new(db: Database, config: ApiConfig) -> Self {
        let jwt = JwtManager::new(config.jwt_secret.clone(), config.jwt_access_lifetime_secs);
        AppState { db, config, jwt }
    }
}
