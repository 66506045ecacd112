//! Document types, metadata form parsing and list queries.

use std::collections::BTreeMap;

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::db::schema::{DocumentContentRecord, DocumentRecord};
use crate::error::{ServiceError, ServiceResult};
use crate::types::{DocumentId, Login};

/// Fallback MIME type when an uploaded file carries none.
pub const DEFAULT_FILE_MIME: &str = "application/octet-stream";

/// Metadata form keys that never reach the stored document.
const RESERVED_META_KEYS: [&str; 4] = ["token", "login", "mime", "file"];

/// What kind of payload a document holds, as reported in listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentKind {
    File { mime: String },
    Json,
}

/// Document payload. Exactly one of the two kinds, never both or neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentContent {
    /// Uploaded file bytes and their MIME type.
    File { mime: String, bytes: Vec<u8> },
    /// JSON text stored verbatim as submitted.
    Structured { json: String },
}

impl DocumentContent {
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::File { mime, .. } => ContentKind::File { mime: mime.clone() },
            Self::Structured { .. } => ContentKind::Json,
        }
    }

    /// Raw content bytes exactly as submitted.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::File { bytes, .. } => bytes,
            Self::Structured { json } => json.as_bytes(),
        }
    }

    /// Column value for the store: base64 for files, the JSON text otherwise.
    pub(crate) fn to_column(&self) -> String {
        match self {
            Self::File { bytes, .. } => base64::engine::general_purpose::STANDARD.encode(bytes),
            Self::Structured { json } => json.clone(),
        }
    }

    pub(crate) fn from_record(record: DocumentContentRecord) -> ServiceResult<Self> {
        if record.has_file {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(record.content.as_bytes())
                .map_err(|e| ServiceError::Internal(format!("corrupt file content: {e}")))?;
            Ok(Self::File {
                mime: record.mime.unwrap_or_else(|| DEFAULT_FILE_MIME.to_string()),
                bytes,
            })
        } else {
            Ok(Self::Structured {
                json: record.content,
            })
        }
    }
}

/// Document metadata as returned to callers. Content is fetched separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub owner: Login,
    pub name: Option<String>,
    #[serde(flatten)]
    pub kind: ContentKind,
    /// Shared documents are visible to every authenticated caller.
    pub public: bool,
    pub attributes: BTreeMap<String, String>,
    pub extra: Map<String, Value>,
    pub created_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Whether `caller` may see this document: owner, or shared.
    pub fn visible_to(&self, caller: &Login) -> bool {
        self.public || self.owner == *caller
    }

    pub(crate) fn from_record(record: DocumentRecord) -> Self {
        let kind = if record.has_file {
            ContentKind::File {
                mime: record.mime.unwrap_or_else(|| DEFAULT_FILE_MIME.to_string()),
            }
        } else {
            ContentKind::Json
        };

        Self {
            id: DocumentId::new(record.doc_id),
            owner: Login::new(record.owner),
            name: record.name,
            kind,
            public: record.is_public,
            attributes: record.attributes,
            extra: record.extra,
            created_at: DateTime::from_timestamp_millis(record.created_at),
        }
    }
}

/// A file part of an upload.
#[derive(Debug, Clone)]
pub struct FileUpload {
    /// MIME type from the part header, if any.
    pub mime: Option<String>,
    pub bytes: Vec<u8>,
}

/// Raw upload input as collected by the transport layer.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    /// Contents of the `meta` form field (a JSON object, possibly empty).
    pub meta: String,
    /// Contents of the `json` form field, used when no file is present.
    pub json: String,
    pub file: Option<FileUpload>,
}

impl UploadRequest {
    /// Pick the payload: the file when present, otherwise the JSON text.
    pub fn content(&self) -> ServiceResult<DocumentContent> {
        if let Some(file) = &self.file {
            let mime = file
                .mime
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_FILE_MIME.to_string());
            return Ok(DocumentContent::File {
                mime,
                bytes: file.bytes.clone(),
            });
        }

        if self.json.trim().is_empty() {
            return Err(ServiceError::invalid(
                "Either a file or a JSON payload is required",
            ));
        }
        serde_json::from_str::<Value>(&self.json)
            .map_err(|e| ServiceError::invalid(format!("Invalid JSON payload: {e}")))?;

        Ok(DocumentContent::Structured {
            json: self.json.clone(),
        })
    }
}

/// The metadata form after parsing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetadata {
    pub name: Option<String>,
    pub public: bool,
    pub attributes: BTreeMap<String, String>,
    pub extra: Map<String, Value>,
}

impl DocumentMetadata {
    /// Parse the `meta` form field.
    ///
    /// `token`, `login`, `mime` and `file` are dropped: the owner is always
    /// the authenticated caller and the kind comes from the actual upload.
    /// String values become filterable attributes; everything else lands in
    /// `extra`.
    pub fn parse(raw: &str) -> ServiceResult<Self> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }

        let value: Value = serde_json::from_str(raw)
            .map_err(|e| ServiceError::invalid(format!("Invalid metadata: {e}")))?;
        let Value::Object(map) = value else {
            return Err(ServiceError::invalid("Metadata must be a JSON object"));
        };

        let mut meta = Self::default();
        for (key, value) in map {
            if RESERVED_META_KEYS.contains(&key.as_str()) {
                continue;
            }
            match (key.as_str(), value) {
                ("public", Value::Bool(public)) => meta.public = public,
                ("public", _) => {
                    return Err(ServiceError::invalid("Metadata field `public` must be a boolean"));
                }
                ("name", Value::String(name)) => meta.name = Some(name),
                ("name", Value::Null) => {}
                ("name", _) => {
                    return Err(ServiceError::invalid("Metadata field `name` must be a string"));
                }
                (_, Value::String(s)) => {
                    meta.attributes.insert(key, s);
                }
                (_, other) => {
                    meta.extra.insert(key, other);
                }
            }
        }

        Ok(meta)
    }

    /// Token embedded in a metadata blob, if the blob parses and carries one.
    pub fn embedded_token(raw: &str) -> Option<String> {
        let value: Value = serde_json::from_str(raw).ok()?;
        value.get("token")?.as_str().map(str::to_string)
    }
}

/// Filters for listing documents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentQuery {
    /// Restrict to one owner's documents (among those visible).
    pub login: Option<String>,
    /// Metadata attribute key; only used together with `value`.
    pub key: Option<String>,
    /// Metadata attribute value; only used together with `key`.
    pub value: Option<String>,
    /// Maximum result count; `None` or `0` means unlimited.
    pub limit: Option<usize>,
}

impl DocumentQuery {
    /// Parse a raw `limit` parameter. Anything unparseable means "no limit".
    pub fn parse_limit(raw: Option<&str>) -> Option<usize> {
        raw.and_then(|s| s.trim().parse::<usize>().ok())
            .filter(|n| *n > 0)
    }

    pub fn login_filter(&self) -> Option<&str> {
        self.login.as_deref().filter(|l| !l.is_empty())
    }

    /// The attribute filter, only when both key and value are non-empty.
    /// A lone key or lone value is ignored.
    pub fn meta_filter(&self) -> Option<(&str, &str)> {
        match (self.key.as_deref(), self.value.as_deref()) {
            (Some(k), Some(v)) if !k.is_empty() && !v.is_empty() => Some((k, v)),
            _ => None,
        }
    }

    pub fn effective_limit(&self) -> Option<usize> {
        self.limit.filter(|n| *n > 0)
    }

    /// Deterministic cache fingerprint of (caller, effective filters).
    ///
    /// Queries that differ only in ignored parameters share a fingerprint.
    pub fn fingerprint(&self, caller: &Login) -> String {
        let (key, value) = match self.meta_filter() {
            Some((k, v)) => (Some(k), Some(v)),
            None => (None, None),
        };
        let shape = serde_json::json!([
            "documents",
            caller.as_str(),
            self.login_filter(),
            key,
            value,
            self.effective_limit(),
        ]);

        let mut hasher = Sha256::new();
        hasher.update(shape.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }
}
