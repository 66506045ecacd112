// HTTP surface: auth endpoints, gated document and account endpoints, health check.

mod auth;
mod documents;
mod gate;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    response::Json,
    routing::{delete, get, post},
};
use serde::Serialize;
use serde_json::Value;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::AuthService;
use crate::config::ServiceConfig;
use crate::db::Db;
use crate::documents::{DocumentCache, DocumentService};

/// Shared handler state. Every field is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub auth: AuthService,
    pub documents: DocumentService,
    pub max_upload_bytes: usize,
}

impl AppState {
    pub fn new(config: &ServiceConfig, db: Db) -> Self {
        Self {
            auth: AuthService::new(config.auth_config(), db.clone()),
            documents: DocumentService::new(
                db,
                DocumentCache::new(&config.cache),
                config.operation_timeout(),
            ),
            max_upload_bytes: config.max_upload_bytes,
        }
    }
}

/// `{"response": ...}` envelope used by auth and delete endpoints.
#[derive(Debug, Serialize)]
pub struct ResponseEnvelope<T> {
    pub response: T,
}

/// `{"data": ...}` envelope used by document reads and uploads.
#[derive(Debug, Serialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

pub fn create_router(state: AppState) -> Router {
    let gated = Router::new()
        .route(
            "/api/docs",
            get(documents::list_documents).post(documents::upload_document),
        )
        .route(
            "/api/docs/{id}",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/api/users/me", get(auth::current_user))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            gate::token_gate,
        ));

    Router::new()
        .route("/health", get(health_check))
        .route("/api/register", post(auth::register))
        .route("/api/auth", post(auth::authenticate))
        .route("/api/auth/{token}", delete(auth::logout))
        .route("/api/auth/{token}/renew", post(auth::renew))
        .merge(gated)
        .layer(DefaultBodyLimit::max(state.max_upload_bytes))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn health_check() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
