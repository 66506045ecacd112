//! Registration and session endpoints.

use axum::{
    Extension, Json,
    extract::{Path, State, rejection::JsonRejection},
};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{AppState, ResponseEnvelope};
use crate::auth::{Identity, SessionGrant, UserInfo};
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    /// Admin token
    pub token: String,
    pub login: String,
    pub pswd: String,
}

#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    pub login: String,
    pub pswd: String,
}

fn invalid_format(rejection: JsonRejection) -> ServiceError {
    ServiceError::invalid(format!("Invalid request format: {}", rejection.body_text()))
}

pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ServiceResult<Json<ResponseEnvelope<Value>>> {
    let Json(req) = payload.map_err(invalid_format)?;
    let login = state.auth.register(&req.token, &req.login, &req.pswd).await?;

    Ok(Json(ResponseEnvelope {
        response: json!({ "login": login }),
    }))
}

pub async fn authenticate(
    State(state): State<AppState>,
    payload: Result<Json<AuthRequest>, JsonRejection>,
) -> ServiceResult<Json<ResponseEnvelope<Value>>> {
    let Json(req) = payload.map_err(invalid_format)?;
    let token = state.auth.authenticate(&req.login, &req.pswd).await?;

    Ok(Json(ResponseEnvelope {
        response: json!({ "token": token }),
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ServiceResult<Json<ResponseEnvelope<Map<String, Value>>>> {
    state.auth.logout(&token).await?;

    let mut response = Map::new();
    response.insert(token, Value::Bool(true));
    Ok(Json(ResponseEnvelope { response }))
}

pub async fn renew(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ServiceResult<Json<ResponseEnvelope<SessionGrant>>> {
    let grant = state.auth.renew(&token).await?;
    Ok(Json(ResponseEnvelope { response: grant }))
}

/// The caller's own account, behind the token gate.
pub async fn current_user(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
) -> ServiceResult<Json<ResponseEnvelope<UserInfo>>> {
    let user = state.auth.user(identity.user_id()).await?;
    Ok(Json(ResponseEnvelope { response: user }))
}
