//! Document endpoints. Every route here sits behind the token gate.

use axum::{
    Extension, Json,
    extract::{Multipart, Path, Query, State, multipart::MultipartError},
    http::{Method, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use serde_json::{Map, Value, json};

use super::{AppState, DataEnvelope, ResponseEnvelope};
use crate::auth::Identity;
use crate::documents::{Document, DocumentContent, DocumentQuery, FileUpload, UploadRequest};
use crate::error::{ServiceError, ServiceResult};

/// Raw list parameters. Everything is optional and `limit` is parsed
/// leniently.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub login: Option<String>,
    pub key: Option<String>,
    pub value: Option<String>,
    pub limit: Option<String>,
}

impl From<ListParams> for DocumentQuery {
    fn from(params: ListParams) -> Self {
        Self {
            limit: DocumentQuery::parse_limit(params.limit.as_deref()),
            login: params.login,
            key: params.key,
            value: params.value,
        }
    }
}

fn bad_multipart(err: MultipartError) -> ServiceError {
    ServiceError::invalid(format!("Invalid multipart body: {}", err.body_text()))
}

pub async fn upload_document(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    mut multipart: Multipart,
) -> ServiceResult<Json<DataEnvelope<Document>>> {
    let mut request = UploadRequest::default();

    while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
        match field.name() {
            Some("meta") => request.meta = field.text().await.map_err(bad_multipart)?,
            Some("json") => request.json = field.text().await.map_err(bad_multipart)?,
            Some("file") => {
                let mime = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(bad_multipart)?;
                request.file = Some(FileUpload {
                    mime,
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let document = state.documents.upload(&identity, request).await?;
    Ok(Json(DataEnvelope { data: document }))
}

pub async fn list_documents(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    method: Method,
    Query(params): Query<ListParams>,
) -> ServiceResult<Response> {
    let query = DocumentQuery::from(params);
    let docs = state.documents.get_all(&identity, &query).await?;

    if method == Method::HEAD {
        return Ok(StatusCode::OK.into_response());
    }
    Ok(Json(DataEnvelope {
        data: json!({ "docs": docs.as_slice() }),
    })
    .into_response())
}

/// File documents come back as raw bytes with their MIME type; JSON
/// documents as `{"data": "<json text>"}`.
pub async fn get_document(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    method: Method,
    Path(id): Path<String>,
) -> ServiceResult<Response> {
    let stored = state.documents.get_by_id(&identity, &id).await?;

    if method == Method::HEAD {
        return Ok(StatusCode::OK.into_response());
    }
    let response = match &stored.content {
        DocumentContent::File { mime, bytes } => {
            ([(CONTENT_TYPE, mime.clone())], bytes.clone()).into_response()
        }
        DocumentContent::Structured { json } => Json(DataEnvelope { data: json.clone() }).into_response(),
    };
    Ok(response)
}

pub async fn delete_document(
    State(state): State<AppState>,
    Extension(identity): Extension<Identity>,
    Path(id): Path<String>,
) -> ServiceResult<Json<ResponseEnvelope<Map<String, Value>>>> {
    state.documents.delete(&identity, &id).await?;

    let mut response = Map::new();
    response.insert(id, Value::Bool(true));
    Ok(Json(ResponseEnvelope { response }))
}
