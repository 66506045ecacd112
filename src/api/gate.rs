//! Token gate in front of the document routes.
//!
//! Buffers the request body, collects token candidates from the query
//! string, a JSON or form body, and the `meta` form field, resolves them in
//! precedence order, and attaches the caller's `Identity` to the request.

use axum::{
    body::{Body, Bytes},
    extract::{FromRequest, Multipart, Request, State},
    middleware::Next,
    response::Response,
};
use http::{HeaderMap, header::CONTENT_TYPE, request::Parts};
use serde_json::Value;
use tracing::{debug, warn};

use super::AppState;
use crate::auth::{TokenCandidates, TokenSource};
use crate::documents::DocumentMetadata;
use crate::error::{ServiceError, ServiceResult};

const TOKEN_FIELD: &str = "token";
const META_FIELD: &str = "meta";

pub async fn token_gate(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ServiceError> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, state.max_upload_bytes)
        .await
        .map_err(|_| ServiceError::invalid("Request body is too large or unreadable"))?;

    let candidates = collect_candidates(&parts, &bytes).await;
    let Some((token, source)) = candidates.resolve() else {
        warn!("request to {} without a token", parts.uri.path());
        return Err(ServiceError::unauthorized("Authorization token required"));
    };

    let identity = state.auth.resolve(token.as_str()).await?.ok_or_else(|| {
        warn!("request to {} with an invalid token", parts.uri.path());
        ServiceError::unauthorized("Invalid token")
    })?;
    debug!(
        "token from {} resolved to {}",
        source_name(source),
        identity.login()
    );

    let mut request = Request::from_parts(parts, Body::from(bytes));
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

async fn collect_candidates(parts: &Parts, body: &Bytes) -> TokenCandidates {
    let mut candidates = TokenCandidates {
        query: parts.uri.query().and_then(|q| form_value(q.as_bytes(), TOKEN_FIELD)),
        ..Default::default()
    };

    match body_kind(&parts.headers) {
        BodyKind::Json => {
            if let Ok(value) = serde_json::from_slice::<Value>(body) {
                candidates.body = value
                    .get(TOKEN_FIELD)
                    .and_then(Value::as_str)
                    .map(str::to_string);
                candidates.metadata = value
                    .get(META_FIELD)
                    .and_then(Value::as_str)
                    .and_then(DocumentMetadata::embedded_token);
            }
        }
        BodyKind::UrlEncoded => {
            candidates.body = form_value(body, TOKEN_FIELD);
            candidates.metadata =
                form_value(body, META_FIELD).and_then(|m| DocumentMetadata::embedded_token(&m));
        }
        BodyKind::Multipart => {
            candidates.metadata = multipart_meta(parts, body)
                .await
                .ok()
                .flatten()
                .and_then(|m| DocumentMetadata::embedded_token(&m));
        }
        BodyKind::Other => {}
    }

    candidates
}

enum BodyKind {
    Json,
    UrlEncoded,
    Multipart,
    Other,
}

fn body_kind(headers: &HeaderMap) -> BodyKind {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("application/json") {
        BodyKind::Json
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        BodyKind::UrlEncoded
    } else if content_type.starts_with("multipart/form-data") {
        BodyKind::Multipart
    } else {
        BodyKind::Other
    }
}

fn form_value(raw: &[u8], name: &str) -> Option<String> {
    url::form_urlencoded::parse(raw)
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Text of the `meta` field of a buffered multipart body.
async fn multipart_meta(parts: &Parts, body: &Bytes) -> ServiceResult<Option<String>> {
    // Headers and extensions carry the boundary and the configured body limit.
    let mut probe = Request::new(Body::from(body.clone()));
    *probe.headers_mut() = parts.headers.clone();
    *probe.extensions_mut() = parts.extensions.clone();

    let mut multipart = Multipart::from_request(probe, &())
        .await
        .map_err(|e| ServiceError::invalid(e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServiceError::invalid(e.body_text()))?
    {
        if field.name() == Some(META_FIELD) {
            let text = field
                .text()
                .await
                .map_err(|e| ServiceError::invalid(e.body_text()))?;
            return Ok(Some(text));
        }
    }

    Ok(None)
}

fn source_name(source: TokenSource) -> &'static str {
    match source {
        TokenSource::QueryParam => "query",
        TokenSource::RequestBody => "body",
        TokenSource::MetadataBlob => "meta",
    }
}
