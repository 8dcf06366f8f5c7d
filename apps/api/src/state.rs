//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use tally_db::Database;

use crate::auth::JwtManager;
use crate::config::ApiConfig;

/// Handed to every handler. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: Arc<JwtManager>,
    pub checkout_timeout: Duration,
}

impl AppState {
    pub fn new(db: Database, config: &ApiConfig) -> Self {
        AppState {
            db,
            jwt: Arc::new(JwtManager::new(&config.jwt_secret)),
            checkout_timeout: config.checkout_timeout(),
        }
    }
}
