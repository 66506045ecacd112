// Core modules
pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod documents;
pub mod error;
pub mod types;
mod utils;

// Re-export key types and functions
pub use api::{AppState, create_router};
pub use auth::{AuthConfig, AuthService, Identity, PasswordScheme, SessionGrant};
pub use config::ServiceConfig;
pub use db::{DatabaseConfig, Db, create_connection, ensure_schema};
pub use documents::{Document, DocumentContent, DocumentQuery, DocumentService, UploadRequest};
pub use error::{ServiceError, ServiceResult};

use anyhow::Result;

/// Connect to the configured database, make sure the schema exists, and
/// build the shared handler state.
pub async fn create_app_state(config: &ServiceConfig) -> Result<AppState> {
    let db = create_connection(config.database.clone()).await?;
    ensure_schema(&db).await?;
    Ok(AppState::new(config, db))
}
