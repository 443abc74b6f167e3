pub mod auth;
pub mod connections;
pub mod dashboard;
pub mod dev;
pub mod health;

use std::sync::Arc;

use crate::auth::jwt::JwtManager;
use crate::config::WorkerConfig;

/// Shared application state available to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub jwt: Arc<JwtManager>,
    pub worker: WorkerConfig,
    pub encryption_key: String,
}
